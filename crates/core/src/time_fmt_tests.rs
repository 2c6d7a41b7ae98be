// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;
use yare::parameterized;

#[parameterized(
    seconds = { 5, "5s" },
    just_under_minute = { 59, "59s" },
    minutes = { 150, "2m" },
    hours_exact = { 7200, "2h" },
    hours_and_minutes = { 5400, "1h30m" },
    days = { 259200, "3d" },
)]
fn formats_elapsed(secs: u64, expected: &str) {
    assert_eq!(format_elapsed(secs), expected);
}

#[test]
fn age_in_the_past() {
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 1, 0).unwrap();
    let ts = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(format_age(ts, now), "1m ago");
}

#[test]
fn future_timestamp_is_now() {
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let ts = Utc.with_ymd_and_hms(2026, 1, 1, 0, 5, 0).unwrap();
    assert_eq!(format_age(ts, now), "now");
}

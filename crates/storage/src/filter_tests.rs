// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hcom_core::test_support::{fixed_ts, message_event};
use hcom_core::{InstanceStatus, LifeAction, LifeData, StatusData};
use yare::parameterized;

fn status_event(id: i64, instance: &str, status: InstanceStatus, context: &str) -> Event {
    Event {
        id,
        ts: fixed_ts(),
        instance: instance.to_string(),
        data: EventData::Status(StatusData::new(status, context)),
    }
}

fn mention_event(id: i64, from: &str, to: &[&str]) -> Event {
    let mut event = message_event(id, from, "hi");
    if let EventData::Message(m) = &mut event.data {
        m.scope = hcom_core::Scope::Mentions;
        m.delivered_to = to.iter().map(|s| s.to_string()).collect();
        m.mentions = to.iter().map(|s| s.to_string()).collect();
    }
    event
}

#[parameterized(
    type_eq = { "type = 'message'", true },
    type_eq_bareword = { "type = message", true },
    type_ne = { "type != 'message'", false },
    id_gt = { "id > 2", true },
    id_le = { "id <= 2", false },
    from_like = { "from LIKE 'big%'", false },
)]
fn message_predicates(expr: &str, expected: bool) {
    let event = message_event(3, "luna", "hello");
    let predicate = parse_predicate(expr).unwrap();
    assert_eq!(predicate.matches(&event), expected, "{expr}");
}

#[test]
fn like_on_delivered_to_array() {
    let event = mention_event(1, "bigboss", &["api-luna", "api-nova"]);
    let predicate = parse_predicate("delivered_to LIKE '%luna%'").unwrap();
    assert!(predicate.matches(&event));

    let predicate = parse_predicate("delivered_to LIKE '%beta%'").unwrap();
    assert!(!predicate.matches(&event));
}

#[test]
fn and_or_not_with_parens() {
    let event = status_event(5, "luna", InstanceStatus::Listening, "ready");
    let predicate =
        parse_predicate("type = 'status' AND (status = 'listening' OR status = 'active')")
            .unwrap();
    assert!(predicate.matches(&event));

    let predicate = parse_predicate("NOT status = 'listening'").unwrap();
    assert!(!predicate.matches(&event));
}

#[test]
fn null_comparisons() {
    let event = message_event(1, "luna", "hi");
    // No thread set
    assert!(parse_predicate("thread = null").unwrap().matches(&event));
    assert!(!parse_predicate("thread != null").unwrap().matches(&event));
}

#[test]
fn cross_kind_fields_are_null() {
    // A status event has no `from`; equality against a string misses
    let event = status_event(1, "luna", InstanceStatus::Active, "start");
    assert!(!parse_predicate("from = 'luna'").unwrap().matches(&event));
}

#[test]
fn life_fields() {
    let mut data = LifeData::new(LifeAction::Stopped, "bigboss");
    data.reason = Some("parent_stopped".into());
    let event = Event {
        id: 9,
        ts: fixed_ts(),
        instance: "luna_task_1".into(),
        data: EventData::Life(data),
    };
    let predicate =
        parse_predicate("action = 'stopped' AND reason LIKE '%parent%'").unwrap();
    assert!(predicate.matches(&event));
}

#[test]
fn equality_on_array_fields_is_flagged() {
    let predicate = parse_predicate("delivered_to = 'luna' AND type = 'message'").unwrap();
    assert_eq!(predicate.equality_on_array_fields(), vec!["delivered_to"]);

    let predicate = parse_predicate("delivered_to LIKE '%luna%'").unwrap();
    assert!(predicate.equality_on_array_fields().is_empty());
}

#[test]
fn unknown_field_is_an_error() {
    assert!(matches!(
        parse_predicate("payload = 'x'"),
        Err(FilterError::UnknownField(_))
    ));
}

#[parameterized(
    unterminated = { "text = 'oops" },
    dangling_op = { "id >" },
    trailing = { "id > 1 garbage = 2" },
    empty = { "" },
)]
fn parse_errors(expr: &str) {
    assert!(parse_predicate(expr).is_err(), "{expr}");
}

#[test]
fn quote_escape_inside_literal() {
    let mut event = message_event(1, "luna", "it's done");
    if let EventData::Message(m) = &mut event.data {
        m.text = "it's done".to_string();
    }
    let predicate = parse_predicate("text = 'it''s done'").unwrap();
    assert!(predicate.matches(&event));
}

#[parameterized(
    percent_run = { "%lo%", "hello", true },
    underscore = { "h_llo", "hello", true },
    anchored_miss = { "hello%", "say hello", false },
    full_wild = { "%", "anything", true },
    empty_pattern = { "", "", true },
)]
fn like_matching(pattern: &str, text: &str, expected: bool) {
    let event = {
        let mut e = message_event(1, "luna", text);
        if let EventData::Message(m) = &mut e.data {
            m.text = text.to_string();
        }
        e
    };
    let predicate = parse_predicate(&format!("text LIKE '{pattern}'")).unwrap();
    assert_eq!(predicate.matches(&event), expected);
}

#[test]
fn display_roundtrips_through_parse() {
    let predicate = parse_predicate("id > 3 AND (from = 'luna' OR NOT type = 'life')").unwrap();
    let reparsed = parse_predicate(&predicate.to_string()).unwrap();
    assert_eq!(predicate, reparsed);
}

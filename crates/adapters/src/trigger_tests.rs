// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hcom_core::test_support::message_event;

#[test]
fn claude_trigger_is_the_sentinel() {
    assert_eq!(trigger_text(Tool::Claude, &[]), "<hcom>");
}

#[test]
fn gemini_trigger_previews_the_first_message() {
    let events = vec![message_event(1, "luna", "deploy finished\nsecond line")];
    let text = trigger_text(Tool::Gemini, &events);
    assert!(text.contains("luna: deploy finished"), "{text}");
    assert!(!text.contains("second line"));

    let many = vec![
        message_event(1, "luna", "one"),
        message_event(2, "nova", "two"),
    ];
    assert!(trigger_text(Tool::Gemini, &many).contains("2 new messages"));
}

#[test]
fn codex_trigger_instructs_listen() {
    let text = trigger_text(Tool::Codex, &[]);
    assert!(text.contains("hcom listen"));
}

#[test]
fn claude_profile_checks_prompt_not_ready_token() {
    let profile = profile(Tool::Claude);
    assert!(profile.gate.require_idle);
    assert!(profile.gate.require_prompt_empty);
    assert!(!profile.gate.require_ready_prompt);
    assert_eq!(profile.verify_timeout, Duration::from_secs(2));
}

#[test]
fn codex_profile_has_long_verify_window() {
    let profile = profile(Tool::Codex);
    assert!(!profile.gate.require_idle);
    assert_eq!(profile.verify_timeout, Duration::from_secs(10));
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hcom_core::test_support::message_event;

#[test]
fn claude_payload_parses() {
    let input = r#"{
        "session_id": "abc-123",
        "transcript_path": "/tmp/t.jsonl",
        "tool_name": "Edit",
        "tool_input": {"file_path": "src/main.rs"},
        "tool_response": {"stdout": "ok", "stderr": ""}
    }"#;
    let payload = parse_payload(Tool::Claude, input).unwrap();
    assert_eq!(payload.session_id, Some(SessionId::new("abc-123")));
    assert_eq!(payload.tool_name.as_deref(), Some("Edit"));
    assert_eq!(payload.tool_result.as_deref(), Some("ok"));
    assert_eq!(
        payload.tool_input.unwrap()["file_path"],
        "src/main.rs"
    );
}

#[test]
fn claude_string_tool_response() {
    let input = r#"{"session_id": "s", "tool_response": "plain text"}"#;
    let payload = parse_payload(Tool::Claude, input).unwrap();
    assert_eq!(payload.tool_result.as_deref(), Some("plain text"));
}

#[test]
fn gemini_alternative_key_names() {
    let input = r#"{
        "sessionId": "g-1",
        "session_path": "/tmp/g.json",
        "toolName": "write_file",
        "toolInput": {"path": "a.txt"},
        "tool_response": {"llmContent": "wrote it"}
    }"#;
    let payload = parse_payload(Tool::Gemini, input).unwrap();
    assert_eq!(payload.session_id, Some(SessionId::new("g-1")));
    assert_eq!(
        payload.transcript_path.as_deref(),
        Some(std::path::Path::new("/tmp/g.json"))
    );
    assert_eq!(payload.tool_name.as_deref(), Some("write_file"));
    assert_eq!(payload.tool_result.as_deref(), Some("wrote it"));
}

#[test]
fn gemini_nested_response_output() {
    let input = r#"{"sessionId": "g", "tool_response": {"response": {"output": "nested"}}}"#;
    let payload = parse_payload(Tool::Gemini, input).unwrap();
    assert_eq!(payload.tool_result.as_deref(), Some("nested"));
}

#[test]
fn codex_argv_payload() {
    let input = r#"{
        "type": "agent-turn-complete",
        "thread-id": "t-9",
        "turn-id": "12345",
        "cwd": "/work",
        "input-messages": ["do the thing"],
        "last-assistant-message": "done"
    }"#;
    let payload = parse_payload(Tool::Codex, input).unwrap();
    assert_eq!(payload.session_id, Some(SessionId::new("t-9")));
    assert_eq!(payload.event_type.as_deref(), Some("agent-turn-complete"));
    assert_eq!(payload.last_assistant_message.as_deref(), Some("done"));
    assert_eq!(payload.raw["turn-id"], "12345");
}

#[test]
fn empty_input_is_missing() {
    assert!(matches!(
        parse_payload(Tool::Claude, "  "),
        Err(PayloadError::Missing)
    ));
}

#[test]
fn malformed_json_errors() {
    assert!(matches!(
        parse_payload(Tool::Claude, "{nope"),
        Err(PayloadError::Json(_))
    ));
}

#[test]
fn hook_kind_parses_both_spellings() {
    assert_eq!(HookKind::parse("stop").unwrap(), HookKind::Stop);
    assert_eq!(HookKind::parse("Stop").unwrap(), HookKind::Stop);
    assert_eq!(HookKind::parse("pre").unwrap(), HookKind::PreToolUse);
    assert!(HookKind::parse("bogus").is_err());
}

#[test]
fn delivery_formatting_lists_senders() {
    let messages = vec![
        message_event(1, "luna", "first"),
        message_event(2, "nova", "second"),
    ];
    let text = format_delivery(&messages);
    assert!(text.contains("[luna] first"));
    assert!(text.contains("[nova] second"));
    assert!(text.contains("hcom send"));
}

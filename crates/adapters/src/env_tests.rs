// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn parses_launcher_fields() {
    let env = HookEnv::from_map(&map(&[
        ("HCOM_PROCESS_ID", "b41c-7e18"),
        ("HCOM_LAUNCHED", "1"),
        ("HCOM_TAG", "api"),
        ("HCOM_LAUNCH_EVENT_ID", "42"),
    ]));
    assert_eq!(env.process_id, Some(ProcessId::new("b41c-7e18")));
    assert!(env.launched);
    assert_eq!(env.tag.as_deref(), Some("api"));
    assert_eq!(env.launch_event_id, Some(42));
    assert!(!env.pty_mode);
}

#[test]
fn empty_values_read_as_absent() {
    let env = HookEnv::from_map(&map(&[("HCOM_PROCESS_ID", ""), ("HCOM_TAG", "")]));
    assert_eq!(env.process_id, None);
    assert_eq!(env.tag, None);
}

#[test]
fn bad_launch_event_id_ignored() {
    let env = HookEnv::from_map(&map(&[("HCOM_LAUNCH_EVENT_ID", "not-a-number")]));
    assert_eq!(env.launch_event_id, None);
}

#[parameterized(
    claude = { &[("CLAUDECODE", "1")], Tool::Claude },
    claude_env_file = { &[("CLAUDE_ENV_FILE", "/tmp/x")], Tool::Claude },
    gemini = { &[("GEMINI_CLI", "1")], Tool::Gemini },
    codex = { &[("CODEX_SANDBOX_NETWORK_DISABLED", "1")], Tool::Codex },
    none = { &[], Tool::Adhoc },
)]
fn detects_tools(pairs: &[(&str, &str)], expected: Tool) {
    assert_eq!(detect_tool(&map(pairs)), expected);
}

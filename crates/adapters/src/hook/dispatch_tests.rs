// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::hook::parse_payload;
use hcom_core::test_support::live_instance;
use hcom_core::{Config, Intent, SessionId, SystemClock};
use hcom_engine::runtime::shared_store;

fn runtime_with_bound(name: &str, session: &str) -> (tempfile::TempDir, Runtime<SystemClock>) {
    let dir = tempfile::tempdir().unwrap();
    let store = shared_store(dir.path()).unwrap();
    {
        let mut guard = store.lock();
        guard.with_registry(|r| {
            let mut row = live_instance(name, Tool::Claude);
            row.session_id = Some(SessionId::new(session));
            r.save_instance(row);
            r.set_session_binding(SessionId::new(session), name);
        });
    }
    (
        dir,
        Runtime::with_clock(store, Config::default(), SystemClock),
    )
}

fn claude_payload(session: &str) -> HookPayload {
    parse_payload(
        Tool::Claude,
        &format!(r#"{{"session_id": "{session}"}}"#),
    )
    .unwrap()
}

async fn send_to(runtime: &Runtime<SystemClock>, name: &str, text: &str) {
    runtime
        .send(
            "bigboss",
            text,
            &[format!("@{name}")],
            Intent::Inform,
            None,
            None,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn stop_hook_delivers_with_exit_2() {
    let (_dir, runtime) = runtime_with_bound("luna", "s1");
    send_to(&runtime, "luna", "urgent thing").await;

    let result = dispatch(&runtime, HookKind::Stop, &claude_payload("s1"), &HookEnv::default()).await;
    assert_eq!(result.exit_code, 2);
    assert!(result.stdout.contains("urgent thing"));

    // Cursor advanced: a second stop hook finds nothing and goes quiet
    let result = dispatch(&runtime, HookKind::Stop, &claude_payload("s1"), &HookEnv::default()).await;
    assert_eq!(result.exit_code, 0);

    let guard = runtime.store().lock();
    let row = guard.registry().get_instance("luna").unwrap();
    assert_eq!(row.status, InstanceStatus::Listening);
    assert_eq!(row.status_context, "ready");
}

#[tokio::test]
async fn unbound_session_is_silent() {
    let (_dir, runtime) = runtime_with_bound("luna", "s1");
    let result = dispatch(
        &runtime,
        HookKind::Stop,
        &claude_payload("other-session"),
        &HookEnv::default(),
    )
    .await;
    assert_eq!(result.exit_code, 0);
    assert!(result.stdout.is_empty());
    assert!(result.stderr.is_empty());
}

#[tokio::test]
async fn post_tool_use_injects_context() {
    let (_dir, runtime) = runtime_with_bound("luna", "s1");
    send_to(&runtime, "luna", "read this between tools").await;

    let payload = parse_payload(
        Tool::Claude,
        r#"{"session_id": "s1", "tool_name": "Bash", "tool_input": {"command": "ls"}}"#,
    )
    .unwrap();
    let result = dispatch(&runtime, HookKind::PostToolUse, &payload, &HookEnv::default()).await;
    assert_eq!(result.exit_code, 0);

    let output: serde_json::Value = serde_json::from_str(&result.stdout).unwrap();
    assert!(output["hookSpecificOutput"]["additionalContext"]
        .as_str()
        .unwrap()
        .contains("read this between tools"));
}

#[tokio::test]
async fn pre_tool_use_tracks_edit_context() {
    let (_dir, runtime) = runtime_with_bound("luna", "s1");
    let payload = parse_payload(
        Tool::Claude,
        r#"{"session_id": "s1", "tool_name": "Edit", "tool_input": {"file_path": "src/a.rs"}}"#,
    )
    .unwrap();
    dispatch(&runtime, HookKind::PreToolUse, &payload, &HookEnv::default()).await;

    let guard = runtime.store().lock();
    let row = guard.registry().get_instance("luna").unwrap();
    assert_eq!(row.status_context, "tool:edit");
    assert_eq!(row.status_detail, "src/a.rs");
}

#[tokio::test]
async fn permission_notification_blocks() {
    let (_dir, runtime) = runtime_with_bound("luna", "s1");
    let payload = parse_payload(
        Tool::Claude,
        r#"{"session_id": "s1", "message": "Claude needs your permission to use Bash"}"#,
    )
    .unwrap();
    dispatch(&runtime, HookKind::Notification, &payload, &HookEnv::default()).await;

    let guard = runtime.store().lock();
    let row = guard.registry().get_instance("luna").unwrap();
    assert_eq!(row.status, InstanceStatus::Blocked);
    assert_eq!(row.status_context, "notify:approval");
}

#[tokio::test]
async fn subagent_stop_resolves_by_agent_id() {
    let (_dir, runtime) = runtime_with_bound("luna", "s1");
    {
        let mut guard = runtime.store().lock();
        guard.with_registry(|r| {
            let mut sub = live_instance("luna_task_1", Tool::Claude);
            sub.parent_name = Some("luna".to_string());
            sub.agent_id = Some("agent-77".to_string());
            sub.session_id = None;
            r.save_instance(sub);
        });
    }
    send_to(&runtime, "luna_task_1", "for the subagent").await;

    let payload = parse_payload(
        Tool::Claude,
        r#"{"session_id": "s1", "agent_id": "agent-77"}"#,
    )
    .unwrap();
    let result = dispatch(&runtime, HookKind::SubagentStop, &payload, &HookEnv::default()).await;
    assert_eq!(result.exit_code, 2);
    assert!(result.stdout.contains("for the subagent"));
}

#[tokio::test]
async fn session_end_marks_exit() {
    let (_dir, runtime) = runtime_with_bound("luna", "s1");
    dispatch(&runtime, HookKind::SessionEnd, &claude_payload("s1"), &HookEnv::default()).await;

    let guard = runtime.store().lock();
    let row = guard.registry().get_instance("luna").unwrap();
    assert_eq!(row.status, InstanceStatus::Inactive);
    assert_eq!(row.status_context, "exit:session_end");
}

#[test]
fn routing_table_covers_the_tools() {
    assert_eq!(route(Tool::Claude, HookKind::Stop), Some(Route::StopDeliver));
    assert_eq!(
        route(Tool::Claude, HookKind::SubagentStop),
        Some(Route::SubagentStopDeliver)
    );
    assert_eq!(route(Tool::Gemini, HookKind::Stop), Some(Route::StopDeliver));
    assert_eq!(route(Tool::Codex, HookKind::Notify), Some(Route::TurnComplete));
    // Codex has exactly one hook
    assert_eq!(route(Tool::Codex, HookKind::Stop), None);
    assert_eq!(route(Tool::Adhoc, HookKind::Stop), None);
}

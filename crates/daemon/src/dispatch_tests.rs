// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hcom_core::test_support::live_instance;
use hcom_core::{Config, SessionId};
use hcom_engine::runtime::shared_store;

fn runtime_with(names: &[&str]) -> (tempfile::TempDir, Runtime) {
    let dir = tempfile::tempdir().unwrap();
    let store = shared_store(dir.path()).unwrap();
    {
        let mut guard = store.lock();
        guard.with_registry(|r| {
            for name in names {
                r.save_instance(live_instance(name, Tool::Claude));
            }
        });
    }
    (
        dir,
        Runtime::with_clock(store, Config::default(), hcom_core::SystemClock),
    )
}

fn cli(argv: &[&str]) -> Request {
    Request::cli(argv.iter().map(|s| s.to_string()).collect())
}

#[tokio::test]
async fn send_broadcast_reports_delivery() {
    let (_dir, runtime) = runtime_with(&["luna", "nova"]);
    let response = handle_request(&runtime, &cli(&["send", "--", "hello", "team"])).await;
    assert_eq!(response.exit_code, 0, "{}", response.stderr);
    assert!(response.stdout.contains("to 2 instance(s)"), "{}", response.stdout);
}

#[tokio::test]
async fn send_with_mention_and_intent() {
    let (_dir, runtime) = runtime_with(&["luna", "nova"]);
    let response = handle_request(
        &runtime,
        &cli(&["send", "@luna", "--intent", "request", "--", "review", "this"]),
    )
    .await;
    assert_eq!(response.exit_code, 0);
    assert!(response.stdout.contains("to 1 instance(s)"));

    let guard = runtime.store().lock();
    let events = guard.events_after(0, usize::MAX).unwrap();
    let message = events[0].data.as_message().unwrap();
    assert_eq!(message.intent, Intent::Request);
    assert_eq!(message.from, "bigboss");
    assert_eq!(message.text, "review this");
}

#[tokio::test]
async fn send_empty_text_fails() {
    let (_dir, runtime) = runtime_with(&["luna"]);
    let response = handle_request(&runtime, &cli(&["send", "--"])).await;
    assert_eq!(response.exit_code, 1);
    assert!(response.stderr.contains("empty"));
}

#[tokio::test]
async fn unknown_command_fails() {
    let (_dir, runtime) = runtime_with(&[]);
    let response = handle_request(&runtime, &cli(&["frobnicate"])).await;
    assert_eq!(response.exit_code, 1);
    assert!(response.stderr.contains("unknown command"));
}

#[tokio::test]
async fn listen_requires_identity() {
    let (_dir, runtime) = runtime_with(&["luna"]);
    let response = handle_request(&runtime, &cli(&["listen", "0.1"])).await;
    assert_eq!(response.exit_code, 1);
    assert!(response.stderr.contains("identity"));
}

#[tokio::test]
async fn listen_with_process_binding_drains() {
    let (_dir, runtime) = runtime_with(&["luna", "nova"]);
    {
        let mut guard = runtime.store().lock();
        guard.with_registry(|r| {
            r.set_process_binding(ProcessId::new("proc-luna"), None, "luna");
        });
    }
    handle_request(&runtime, &cli(&["send", "@luna", "--", "ping"])).await;

    let mut request = cli(&["listen", "2"]);
    request
        .env
        .insert("HCOM_PROCESS_ID".into(), "proc-luna".into());
    let response = handle_request(&runtime, &request).await;
    assert_eq!(response.exit_code, 0);
    assert!(response.stdout.contains("ping"), "{}", response.stdout);
}

#[tokio::test]
async fn start_then_list_shows_instance() {
    let (_dir, runtime) = runtime_with(&[]);
    let response = handle_request(&runtime, &cli(&["start", "--name", "nora"])).await;
    assert_eq!(response.exit_code, 0, "{}", response.stderr);
    assert!(response.stdout.contains("started nora"));

    let response = handle_request(&runtime, &cli(&["list"])).await;
    assert!(response.stdout.contains("nora"));

    let response = handle_request(&runtime, &cli(&["list", "--sh"])).await;
    assert!(response.stdout.contains("name=nora"));
}

#[tokio::test]
async fn stop_by_tag_selects_group() {
    let (_dir, runtime) = runtime_with(&[]);
    {
        let mut guard = runtime.store().lock();
        guard.with_registry(|r| {
            let mut a = live_instance("luna", Tool::Claude);
            a.tag = Some("api".into());
            let mut b = live_instance("nova", Tool::Claude);
            b.tag = Some("api".into());
            let c = live_instance("kivo", Tool::Claude);
            r.save_instance(a);
            r.save_instance(b);
            r.save_instance(c);
        });
    }

    let response = handle_request(&runtime, &cli(&["stop", "tag:api"])).await;
    assert_eq!(response.exit_code, 0, "{}", response.stderr);

    let guard = runtime.store().lock();
    assert!(guard.registry().get_instance("luna").is_none());
    assert!(guard.registry().get_instance("nova").is_none());
    assert!(guard.registry().get_instance("kivo").is_some());
}

#[tokio::test]
async fn events_last_renders_and_filters() {
    let (_dir, runtime) = runtime_with(&["luna", "nova"]);
    handle_request(&runtime, &cli(&["send", "--", "one"])).await;
    handle_request(&runtime, &cli(&["send", "@luna", "--", "two"])).await;

    let response = handle_request(
        &runtime,
        &cli(&["events", "--last", "10", "--sql", "type = 'message' AND text = 'two'"]),
    )
    .await;
    assert_eq!(response.exit_code, 0, "{}", response.stderr);
    assert!(response.stdout.contains("two"));
    assert!(!response.stdout.contains("one"));
}

#[tokio::test]
async fn events_json_emits_wire_shape() {
    let (_dir, runtime) = runtime_with(&["luna"]);
    handle_request(&runtime, &cli(&["send", "--", "hello"])).await;

    let response = handle_request(&runtime, &cli(&["events", "--json", "--last", "5"])).await;
    let first_line = response.stdout.lines().next().unwrap();
    let value: serde_json::Value = serde_json::from_str(first_line).unwrap();
    assert_eq!(value["type"], "message");
    assert!(value["data"]["text"].is_string());
}

#[tokio::test]
async fn reset_archives_store() {
    let (_dir, runtime) = runtime_with(&["luna"]);
    handle_request(&runtime, &cli(&["send", "--", "pre-reset"])).await;

    let response = handle_request(&runtime, &cli(&["reset", "all"])).await;
    assert_eq!(response.exit_code, 0, "{}", response.stderr);
    assert!(response.stdout.contains("archived"));

    let guard = runtime.store().lock();
    assert_eq!(guard.last_event_id(), 0);
    assert!(guard.registry().instances.is_empty());
}

#[tokio::test]
async fn hook_request_routes_to_dispatcher() {
    let (_dir, runtime) = runtime_with(&[]);
    {
        let mut guard = runtime.store().lock();
        guard.with_registry(|r| {
            let mut row = live_instance("luna", Tool::Claude);
            row.session_id = Some(SessionId::new("s1"));
            r.save_instance(row);
            r.set_session_binding(SessionId::new("s1"), "luna");
        });
    }
    handle_request(&runtime, &cli(&["send", "@luna", "--", "for the hook"])).await;

    let mut request = cli(&[]);
    request.kind = RequestKind::Hook;
    request.hook_type = Some("stop".to_string());
    request.stdin = Some(r#"{"session_id": "s1"}"#.to_string());
    request.env.insert("CLAUDECODE".into(), "1".into());

    let response = handle_request(&runtime, &request).await;
    assert_eq!(response.exit_code, 2, "{}", response.stderr);
    assert!(response.stdout.contains("for the hook"));
}

#[tokio::test]
async fn hook_for_non_participant_is_silent() {
    let (_dir, runtime) = runtime_with(&[]);
    let mut request = cli(&[]);
    request.kind = RequestKind::Hook;
    request.hook_type = Some("stop".to_string());
    request.stdin = Some(r#"{"session_id": "nobody"}"#.to_string());
    request.env.insert("CLAUDECODE".into(), "1".into());

    let response = handle_request(&runtime, &request).await;
    assert_eq!(response.exit_code, 0);
    assert!(response.stdout.is_empty());
    assert!(response.stderr.is_empty());
}

#[tokio::test]
async fn subscription_lifecycle_via_cli() {
    let (_dir, runtime) = runtime_with(&["luna"]);
    {
        let mut guard = runtime.store().lock();
        guard.with_registry(|r| {
            r.set_process_binding(ProcessId::new("p-luna"), None, "luna");
        });
    }

    let mut request = cli(&["events", "sub", "text LIKE '%deploy%'"]);
    request.env.insert("HCOM_PROCESS_ID".into(), "p-luna".into());
    let response = handle_request(&runtime, &request).await;
    assert_eq!(response.exit_code, 0, "{}", response.stderr);

    let response = handle_request(&runtime, &cli(&["events", "subs"])).await;
    assert!(response.stdout.contains("luna"));

    let id = hcom_engine::subscriptions::list(&runtime)[0].id.clone();
    let response = handle_request(&runtime, &cli(&["events", "unsub", &id])).await;
    assert_eq!(response.exit_code, 0);
}

//! Hook-path delivery: the Stop hook drains unread and exits 2.

use crate::prelude::*;
use hcom_adapters::hook::{dispatch, parse_payload, HookKind};
use hcom_adapters::HookEnv;
use hcom_core::{SessionId, Tool};

fn bind_session(world: &World, name: &str, session: &str) {
    let mut guard = world.runtime.store().lock();
    guard.with_registry(|registry| {
        registry.update_instance(name, |row| {
            row.session_id = Some(SessionId::new(session));
        });
        registry.rebind_session(SessionId::new(session), name);
    });
}

fn stop_payload(session: &str) -> hcom_adapters::HookPayload {
    parse_payload(Tool::Claude, &format!(r#"{{"session_id": "{session}"}}"#)).unwrap()
}

#[tokio::test]
async fn stop_hook_drains_and_exits_2() {
    let world = World::with_instances(&[("luna", None)]);
    bind_session(&world, "luna", "claude-session-1");
    world.send("bigboss", &["@luna"], "act on this").await;

    let result = dispatch(
        &world.runtime,
        HookKind::Stop,
        &stop_payload("claude-session-1"),
        &HookEnv::default(),
    )
    .await;
    assert!(result.is_message_delivered());
    assert!(result.stdout.contains("act on this"));

    // Drained: the next Stop hook is quiet and the instance listens
    let result = dispatch(
        &world.runtime,
        HookKind::Stop,
        &stop_payload("claude-session-1"),
        &HookEnv::default(),
    )
    .await;
    assert!(result.is_success());
}

#[tokio::test]
async fn foreign_session_hook_is_a_silent_no_op() {
    let world = World::with_instances(&[("luna", None)]);
    bind_session(&world, "luna", "claude-session-1");

    let result = dispatch(
        &world.runtime,
        HookKind::Stop,
        &stop_payload("some-other-session"),
        &HookEnv::default(),
    )
    .await;
    assert_eq!(result.exit_code, 0);
    assert!(result.stdout.is_empty());
    assert!(result.stderr.is_empty());
}

//! Stop semantics: cascade to subagents, terminal for delivery.

use crate::prelude::*;
use hcom_core::{EventData, LifeAction, SessionId, Tool};
use hcom_engine::lifecycle::stop;
use hcom_engine::NotifyBus;

#[tokio::test]
async fn stop_cascades_to_subagents_with_reason() {
    let world = World::with_instances(&[("luna", None)]);
    {
        let mut guard = world.runtime.store().lock();
        guard.with_registry(|registry| {
            for task in ["luna_task_1", "luna_task_2"] {
                let mut row = hcom_core::test_support::live_instance(task, Tool::Claude);
                row.parent_name = Some("luna".to_string());
                row.parent_session_id = Some(SessionId::new("session-luna"));
                row.session_id = None;
                registry.save_instance(row);
            }
        });
    }

    stop(world.runtime.store(), &NotifyBus, "luna", "bigboss", None)
        .await
        .unwrap();

    // No row remains for any of the three
    for name in ["luna", "luna_task_1", "luna_task_2"] {
        assert!(!world.row_exists(name), "{name}");
    }

    // Each has a life/stopped event; subagents say parent_stopped
    let guard = world.runtime.store().lock();
    let events = guard.events_after(0, usize::MAX).unwrap();
    for name in ["luna", "luna_task_1", "luna_task_2"] {
        let stopped = events
            .iter()
            .filter(|e| e.instance == name)
            .filter_map(|e| e.data.as_life())
            .find(|l| l.action == LifeAction::Stopped)
            .unwrap_or_else(|| panic!("no stopped event for {name}"));
        if name.starts_with("luna_task") {
            assert_eq!(stopped.reason.as_deref(), Some("parent_stopped"));
        }
        assert!(stopped.snapshot.is_some());
    }
}

#[tokio::test]
async fn stop_is_terminal_for_the_instance() {
    let world = World::with_instances(&[("luna", None), ("nova", None)]);

    stop(world.runtime.store(), &NotifyBus, "luna", "bigboss", None)
        .await
        .unwrap();

    // Delivery to the stopped name resolves to nothing
    let event = world.send("bigboss", &["@luna"], "too late").await;
    assert!(world.delivered_to(&event).is_empty());

    // After the final life/stopped, no further events carry the instance
    let guard = world.runtime.store().lock();
    let events = guard.events_after(0, usize::MAX).unwrap();
    let last_luna_event = events
        .iter()
        .filter(|e| e.instance == "luna")
        .next_back()
        .unwrap();
    match &last_luna_event.data {
        EventData::Life(life) => assert_eq!(life.action, LifeAction::Stopped),
        other => panic!("trailing event for stopped instance: {other:?}"),
    }
}

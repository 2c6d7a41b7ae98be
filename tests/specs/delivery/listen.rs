//! Pull delivery: round-trip, exactly-once, timeout semantics.

use crate::prelude::*;

#[tokio::test]
async fn round_trip_is_exactly_once() {
    let world = World::with_instances(&[("luna", None)]);
    let event = world.send("bigboss", &["@luna"], "the one message").await;

    let outcome = world.listen("luna", QUICK).await;
    assert_eq!(outcome.messages.len(), 1);
    assert_eq!(outcome.messages[0].id, event.id);
    assert_eq!(outcome.cursor_advanced, Some(event.id));

    // The cursor advanced past the message exactly once
    let cursor_after_first = world.cursor_of("luna");
    let outcome = world.listen("luna", BRIEF).await;
    assert!(outcome.timed_out);
    assert_eq!(world.cursor_of("luna"), cursor_after_first);
}

#[tokio::test]
async fn timeout_returns_cleanly_without_cursor_advance() {
    let world = World::with_instances(&[("luna", None)]);
    let before = world.cursor_of("luna");

    let outcome = world.listen("luna", BRIEF).await;
    assert!(outcome.timed_out);
    assert!(outcome.cursor_advanced.is_none());
    assert_eq!(world.cursor_of("luna"), before);
}

#[tokio::test]
async fn concurrent_listeners_each_get_their_copy() {
    let world = World::with_instances(&[("luna", None), ("nova", None)]);

    let luna = {
        let runtime = world.runtime.clone();
        tokio::spawn(async move {
            hcom_engine::listen(
                &runtime,
                "luna",
                QUICK * 2,
                None,
                hcom_storage::NotifyKind::Hook,
            )
            .await
            .unwrap()
        })
    };
    let nova = {
        let runtime = world.runtime.clone();
        tokio::spawn(async move {
            hcom_engine::listen(
                &runtime,
                "nova",
                QUICK * 2,
                None,
                hcom_storage::NotifyKind::Hook,
            )
            .await
            .unwrap()
        })
    };

    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    world.send("bigboss", &[], "fan out").await;

    let (luna, nova) = tokio::join!(luna, nova);
    assert_eq!(luna.unwrap().messages.len(), 1);
    assert_eq!(nova.unwrap().messages.len(), 1);
}

//! Event-id ordering guarantees.

use crate::prelude::*;

#[tokio::test]
async fn ids_are_strictly_increasing_and_gap_free() {
    let world = World::with_instances(&[("luna", None)]);

    let mut previous = 0;
    for i in 0..10 {
        let event = world.send("bigboss", &["@luna"], &format!("m{i}")).await;
        assert_eq!(event.id, previous + 1);
        previous = event.id;
    }
}

#[tokio::test]
async fn recipient_sees_event_id_order() {
    let world = World::with_instances(&[("luna", None)]);
    for i in 0..5 {
        world.send("bigboss", &["@luna"], &format!("m{i}")).await;
    }

    let outcome = world.listen("luna", QUICK).await;
    let ids: Vec<i64> = outcome.messages.iter().map(|m| m.id).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted);
    assert_eq!(ids.len(), 5);
}

#[tokio::test]
async fn cursor_never_exceeds_store_maximum() {
    let world = World::with_instances(&[("luna", None)]);
    world.send("bigboss", &["@luna"], "one").await;
    world.listen("luna", QUICK).await;

    let guard = world.runtime.store().lock();
    let max = guard.last_event_id();
    let cursor = guard.registry().get_instance("luna").unwrap().last_event_id;
    assert!(cursor <= max);
}

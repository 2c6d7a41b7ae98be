//! Broadcast delivery across the live set.

use crate::prelude::*;
use hcom_core::{EventData, Scope};

#[tokio::test]
async fn broadcast_reaches_every_instance_once() {
    let world = World::with_instances(&[("luna", None), ("nova", None)]);
    let event = world.send("bigboss", &[], "hello team").await;

    let EventData::Message(message) = &event.data else {
        panic!("expected message event");
    };
    assert_eq!(message.from, "bigboss");
    assert_eq!(message.scope, Scope::Broadcast);
    assert_eq!(world.delivered_to(&event), vec!["luna", "nova"]);

    // Each instance receives it exactly once
    for name in ["luna", "nova"] {
        let outcome = world.listen(name, QUICK).await;
        assert_eq!(outcome.messages.len(), 1, "{name}");
        assert_eq!(outcome.messages[0].id, event.id);

        // ...and the cursor has advanced past the message's id
        assert!(world.cursor_of(name) >= event.id, "{name}");
    }

    // Exactly once: a second listen times out empty
    for name in ["luna", "nova"] {
        let outcome = world.listen(name, BRIEF).await;
        assert!(outcome.timed_out);
        assert!(outcome.messages.is_empty());
    }
}

#[tokio::test]
async fn broadcast_skips_the_sender() {
    let world = World::with_instances(&[("luna", None), ("nova", None)]);
    let event = world.send("luna", &[], "from inside").await;
    assert_eq!(world.delivered_to(&event), vec!["nova"]);

    let outcome = world.listen("luna", BRIEF).await;
    assert!(outcome.messages.is_empty());
}

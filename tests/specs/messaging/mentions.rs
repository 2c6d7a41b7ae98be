//! Mention addressing: tags, prefixes and the underscore block.

use crate::prelude::*;

#[tokio::test]
async fn tag_prefix_addresses_the_group() {
    let world = World::with_instances(&[
        ("luna", Some("api")),
        ("nova", Some("api")),
        ("luna2", Some("beta")),
    ]);

    let event = world.send("bigboss", &["@api-"], "build it").await;
    assert_eq!(world.delivered_to(&event), vec!["api-luna", "api-nova"]);

    // The beta instance never sees it
    let outcome = world.listen("beta-luna2", BRIEF).await;
    assert!(outcome.timed_out);
    assert!(outcome.messages.is_empty());
}

#[tokio::test]
async fn bare_tag_expands_when_nothing_matches_exactly() {
    let world = World::with_instances(&[("luna", Some("api")), ("nova", Some("api"))]);
    let event = world.send("bigboss", &["@api"], "ping").await;
    assert_eq!(world.delivered_to(&event), vec!["api-luna", "api-nova"]);
}

#[tokio::test]
async fn underscore_blocks_prefix_expansion() {
    let world = World::with_instances(&[("luna", None), ("luna_reviewer_1", None)]);

    let event = world.send("bigboss", &["@luna"], "ping").await;
    assert_eq!(world.delivered_to(&event), vec!["luna"]);

    // The subagent is still reachable by its exact name
    let event = world.send("bigboss", &["@luna_reviewer_1"], "direct").await;
    assert_eq!(world.delivered_to(&event), vec!["luna_reviewer_1"]);
}

#[tokio::test]
async fn mention_to_missing_instance_warns_and_delivers_nothing() {
    let world = World::with_instances(&[("luna", None)]);
    let tokens = vec!["@ghost".to_string()];
    let outcome = world
        .runtime
        .send("bigboss", "anyone?", &tokens, hcom_core::Intent::Inform, None, None)
        .await
        .unwrap();
    assert!(world.delivered_to(&outcome.event).is_empty());
    assert_eq!(outcome.warnings.len(), 1);
}

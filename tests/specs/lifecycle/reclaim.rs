//! Session reclaim: `start --as <name>` takes over an existing identity.

use crate::prelude::*;
use hcom_core::{SessionId, Tool};
use hcom_engine::lifecycle::{start, StartOpts};

#[tokio::test]
async fn reclaim_redirects_delivery_and_preserves_cursor() {
    let world = World::with_instances(&[("veki", None), ("nova", None)]);

    // veki is bound to an active session; nora exists with history
    let session = SessionId::new("claude-s1");
    {
        let mut guard = world.runtime.store().lock();
        guard.with_registry(|registry| {
            registry.update_instance("veki", |row| row.session_id = Some(session.clone()));
            registry.rebind_session(session.clone(), "veki");
        });
    }

    // Messages sent before the reclaim define the history horizon
    let before = world.send("bigboss", &[], "pre-reclaim noise").await;

    // nora carries a cursor from its previous life, past that noise
    {
        let mut guard = world.runtime.store().lock();
        guard.with_registry(|registry| {
            let mut row = hcom_core::Instance::placeholder(
                "nora",
                Tool::Claude,
                hcom_core::test_support::fixed_ts(),
            );
            row.last_event_id = before.id;
            registry.save_instance(row);
        });
    }

    // The user inside the veki session runs `start --as nora`
    let outcome = {
        let mut guard = world.runtime.store().lock();
        let outcome = start(
            &mut guard,
            chrono::Utc::now(),
            StartOpts {
                as_name: Some("nora".to_string()),
                tool: Tool::Claude,
                session_id: Some(session.clone()),
                ..Default::default()
            },
        )
        .unwrap();
        guard.flush().unwrap();
        outcome
    };
    assert!(outcome.reclaimed);
    assert_eq!(outcome.name, "nora");

    // nora does not see messages sent before the reclaim
    assert!(world.cursor_of("nora") >= before.id);

    // A subsequent send to @nora reaches that session...
    let event = world.send("bigboss", &["@nora"], "hi").await;
    assert_eq!(world.delivered_to(&event), vec!["nora"]);
    let outcome = world.listen("nora", QUICK).await;
    assert_eq!(outcome.messages.len(), 1);
    assert_eq!(outcome.messages[0].id, event.id);

    // ...and veki never receives it (only the pre-reclaim broadcast that
    // was legitimately addressed to it)
    let outcome = world.listen("veki", BRIEF).await;
    assert!(outcome.messages.iter().all(|m| m.id != event.id));

    // The session maps to nora now
    let guard = world.runtime.store().lock();
    assert_eq!(guard.registry().get_session_binding(&session), Some("nora"));
    assert!(guard
        .registry()
        .get_instance("veki")
        .unwrap()
        .session_id
        .is_none());
}

#[tokio::test]
async fn start_is_idempotent_for_a_bound_session() {
    let world = World::with_instances(&[]);
    let session = SessionId::new("s1");

    let first = {
        let mut guard = world.runtime.store().lock();
        start(
            &mut guard,
            chrono::Utc::now(),
            StartOpts {
                name: Some("luna".to_string()),
                tool: Tool::Claude,
                session_id: Some(session.clone()),
                ..Default::default()
            },
        )
        .unwrap()
    };
    assert!(first.created);

    let cursor_before = world.cursor_of("luna");
    let second = {
        let mut guard = world.runtime.store().lock();
        start(
            &mut guard,
            chrono::Utc::now(),
            StartOpts {
                tool: Tool::Claude,
                session_id: Some(session),
                ..Default::default()
            },
        )
        .unwrap()
    };
    assert_eq!(second.name, "luna");
    assert!(!second.created);
    assert_eq!(world.cursor_of("luna"), cursor_before);
}

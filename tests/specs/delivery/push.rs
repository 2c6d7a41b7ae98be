//! Push delivery against a fake PTY: inject, verify, retry.

use hcom_engine::test_support::{FakeDelivery, FakeInjector, FakePty, QuietNotifier};
use hcom_engine::{run_push_loop, DeliveryGate, PushDeps, PushHandle, TwoPhaseRetryPolicy};
use std::time::Duration;

fn deps(
    store: FakeDelivery,
    screen: FakePty,
    injector: FakeInjector,
) -> PushDeps<FakeDelivery, FakePty, FakeInjector, QuietNotifier> {
    PushDeps {
        instance: "gem".to_string(),
        store,
        screen,
        injector,
        notifier: QuietNotifier::default(),
        gate: DeliveryGate::default(),
        retry: TwoPhaseRetryPolicy {
            initial: Duration::from_millis(5),
            multiplier: 2.0,
            warm_maximum: Duration::from_millis(20),
            warm_window: Duration::from_secs(60),
            cold_maximum: Duration::from_millis(40),
        },
        verify_timeout: Duration::from_millis(80),
        max_verify_retries: 5,
        idle_wait: Duration::from_millis(20),
        start_pending: false,
    }
}

#[tokio::test]
async fn idle_gemini_receives_and_confirms() {
    let store = FakeDelivery::default();
    let screen = FakePty::default();
    let injector = FakeInjector::auto(store.clone());

    let handle = PushHandle::new();
    let run = tokio::spawn(run_push_loop(
        deps(store.clone(), screen, injector.clone()),
        handle.clone(),
    ));

    // Message arrives: wake finds pending, gate passes, trigger lands,
    // the hook drains and the cursor advances
    store.set_pending(1);
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(injector.triggers(), 1);
    assert_eq!(store.cursor(), 1);

    // Back to idle: no further injections
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(injector.triggers(), 1);

    handle.stop();
    let _ = tokio::time::timeout(Duration::from_secs(2), run).await;
}

#[tokio::test]
async fn swallowed_enter_gets_enter_only_retry_then_confirms() {
    let store = FakeDelivery::default();
    let screen = FakePty::default();
    let injector = FakeInjector::manual(); // simulate the Enter being lost
    store.set_pending(1);

    let handle = PushHandle::new();
    let run = tokio::spawn(run_push_loop(
        deps(store.clone(), screen, injector.clone()),
        handle.clone(),
    ));

    // First injection, then a verify timeout, then the Enter-only retry
    tokio::time::sleep(Duration::from_millis(140)).await;
    assert_eq!(injector.triggers(), 1, "full trigger sent once");
    assert!(injector.enters() >= 1, "first retry is Enter-only");

    // Now the Enter lands: the hook drains, cursor advances, loop settles
    store.confirm_delivery();
    tokio::time::sleep(Duration::from_millis(120)).await;
    let triggers = injector.triggers();
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(injector.triggers(), triggers, "no injections after confirm");

    handle.stop();
    let _ = tokio::time::timeout(Duration::from_secs(2), run).await;
}

#[tokio::test]
async fn retries_are_bounded_between_attempts() {
    let store = FakeDelivery::default();
    let screen = FakePty::default();
    let injector = FakeInjector::manual();
    store.set_pending(1);

    let handle = PushHandle::new();
    let mut d = deps(store.clone(), screen, injector.clone());
    d.max_verify_retries = 2;
    let run = tokio::spawn(run_push_loop(d, handle.clone()));

    // With verify never confirming: trigger, enter retry, full retry,
    // then the attempt is abandoned back to pending
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(injector.enters() >= 1);
    assert!(injector.triggers() >= 2);

    handle.stop();
    let _ = tokio::time::timeout(Duration::from_secs(2), run).await;
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hcom_core::test_support::live_instance;
use hcom_core::{InstanceStatus, Tool};

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
    (dir, Runtime::with_clock(store, Config::default(), SystemClock))
}

#[tokio::test]
async fn send_and_unread_roundtrip() {
    let (_dir, runtime) = runtime_with(&["luna", "nova"]);
    let outcome = runtime
        .send("bigboss", "hello", &[], Intent::Inform, None, None)
        .await
        .unwrap();
    assert!(outcome.warnings.is_empty());

    let unread = runtime.unread("luna", 50).unwrap();
    assert_eq!(unread.len(), 1);

    let missing = runtime.unread("ghost", 50);
    assert!(matches!(missing, Err(EngineError::IdentityMissing(_))));
}

#[tokio::test]
async fn set_status_updates_row_and_log() {
    let (_dir, runtime) = runtime_with(&["luna"]);
    runtime
        .set_status("luna", InstanceStatus::Blocked, "pty:approval", None)
        .await
        .unwrap();

    let guard = runtime.store().lock();
    let row = guard.registry().get_instance("luna").unwrap();
    assert_eq!(row.status, InstanceStatus::Blocked);

    let statuses = guard
        .events_after_matching(0, usize::MAX, |e| e.data.as_status().is_some())
        .unwrap();
    assert_eq!(statuses.len(), 1);
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hcom_core::event::MessageData;
use hcom_core::test_support::live_instance;
use hcom_core::Tool;

fn message(from: &str, text: &str) -> EventData {
    EventData::Message(MessageData::new(from, text))
}

#[test]
fn append_and_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = Store::open(dir.path()).unwrap();

    let event = store.append_event("luna", message("luna", "hi"), None).unwrap();
    assert_eq!(event.id, 1);

    let events = store.events_after(0, usize::MAX).unwrap();
    assert_eq!(events.len(), 1);
}

#[test]
fn registry_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut store = Store::open(dir.path()).unwrap();
        store.with_registry(|r| r.save_instance(live_instance("luna", Tool::Claude)));
        store.flush().unwrap();
    }
    let store = Store::open(dir.path()).unwrap();
    assert!(store.registry().get_instance("luna").is_some());
}

#[test]
fn unflushed_registry_changes_lost_on_reopen() {
    // Durability is eventual: a crash loses the last few milliseconds
    let dir = tempfile::tempdir().unwrap();
    {
        let mut store = Store::open(dir.path()).unwrap();
        store.with_registry(|r| r.save_instance(live_instance("luna", Tool::Claude)));
        // No flush
    }
    let store = Store::open(dir.path()).unwrap();
    assert!(store.registry().get_instance("luna").is_none());
}

#[test]
fn stale_cursor_clamped_on_open() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut store = Store::open(dir.path()).unwrap();
        store.append_event("luna", message("luna", "one"), None).unwrap();
        let mut row = live_instance("luna", Tool::Claude);
        row.last_event_id = 999; // beyond the log max
        store.with_registry(|r| r.save_instance(row));
        store.flush().unwrap();
    }
    let store = Store::open(dir.path()).unwrap();
    assert_eq!(store.registry().get_instance("luna").unwrap().last_event_id, 1);
}

#[test]
fn reset_archives_and_restarts_ids() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = Store::open(dir.path()).unwrap();
    store.append_event("luna", message("luna", "old"), None).unwrap();
    store.with_registry(|r| r.save_instance(live_instance("luna", Tool::Claude)));
    store.flush().unwrap();

    let archive_dir = store.reset().unwrap();
    assert!(archive_dir.join("events.jsonl.zst").exists());
    assert!(archive_dir.join("registry.json").exists());

    // Fresh generation: empty registry, ids restart
    assert!(store.registry().get_instance("luna").is_none());
    assert_eq!(store.last_event_id(), 0);
    let event = store.append_event("nova", message("nova", "new"), None).unwrap();
    assert_eq!(event.id, 1);
}

#[test]
fn needs_flush_tracks_both_halves() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = Store::open(dir.path()).unwrap();
    assert!(!store.needs_flush());

    store.with_registry(|r| r.kv_set("k", Some("v".into())));
    assert!(store.needs_flush());
    store.flush().unwrap();
    assert!(!store.needs_flush());
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hcom_core::test_support::{fixed_ts, live_instance};
use hcom_core::{Instance, Tool};

fn open_store(dir: &tempfile::TempDir) -> Store {
    Store::open(dir.path()).unwrap()
}

#[test]
fn process_binding_wins() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_store(&dir);
    store.with_registry(|r| {
        r.save_instance(live_instance("luna", Tool::Claude));
        r.save_instance(live_instance("nova", Tool::Claude));
        r.set_process_binding(ProcessId::new("p1"), None, "luna");
        r.set_session_binding(SessionId::new("s1"), "nova");
    });

    let input = ResolveInput {
        process_id: Some(ProcessId::new("p1")),
        session_id: Some(SessionId::new("s1")),
        transcript_path: None,
    };
    assert_eq!(resolve(&mut store, &input), Some("luna".to_string()));
}

#[test]
fn session_binding_is_second() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_store(&dir);
    store.with_registry(|r| {
        r.save_instance(live_instance("nova", Tool::Claude));
        r.set_session_binding(SessionId::new("s1"), "nova");
    });

    let input = ResolveInput {
        process_id: Some(ProcessId::new("unbound")),
        session_id: Some(SessionId::new("s1")),
        transcript_path: None,
    };
    assert_eq!(resolve(&mut store, &input), Some("nova".to_string()));
}

#[test]
fn stale_binding_to_deleted_row_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_store(&dir);
    store.with_registry(|r| {
        r.set_process_binding(ProcessId::new("p1"), None, "ghost");
    });

    let input = ResolveInput {
        process_id: Some(ProcessId::new("p1")),
        ..Default::default()
    };
    assert_eq!(resolve(&mut store, &input), None);
}

#[test]
fn transcript_marker_binds_pending_row() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_store(&dir);
    // Pending: row exists, session_id null
    store.with_registry(|r| {
        r.save_instance(Instance::placeholder("veki", Tool::Claude, fixed_ts()));
    });

    let transcript = dir.path().join("transcript.jsonl");
    std::fs::write(
        &transcript,
        "{\"role\":\"user\",\"text\":\"welcome [hcom:veki] marker\"}\n",
    )
    .unwrap();

    let input = ResolveInput {
        process_id: None,
        session_id: Some(SessionId::new("s9")),
        transcript_path: Some(transcript),
    };
    assert_eq!(resolve(&mut store, &input), Some("veki".to_string()));

    // Side effects: session bound, row claimed
    assert_eq!(
        store.registry().get_session_binding(&SessionId::new("s9")),
        Some("veki")
    );
    assert_eq!(
        store.registry().get_instance("veki").unwrap().session_id,
        Some(SessionId::new("s9"))
    );
}

#[test]
fn marker_against_claimed_row_does_not_bind() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_store(&dir);
    store.with_registry(|r| {
        r.save_instance(live_instance("veki", Tool::Claude)); // already has a session
    });

    let transcript = dir.path().join("transcript.jsonl");
    std::fs::write(&transcript, "[hcom:veki]").unwrap();

    let input = ResolveInput {
        process_id: None,
        session_id: Some(SessionId::new("other")),
        transcript_path: Some(transcript),
    };
    assert_eq!(resolve(&mut store, &input), None);
}

#[test]
fn last_marker_wins() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_store(&dir);
    store.with_registry(|r| {
        r.save_instance(Instance::placeholder("nora", Tool::Claude, fixed_ts()));
    });

    let transcript = dir.path().join("t.jsonl");
    std::fs::write(&transcript, "[hcom:veki] then later [hcom:nora]").unwrap();

    let input = ResolveInput {
        session_id: Some(SessionId::new("s1")),
        transcript_path: Some(transcript),
        ..Default::default()
    };
    assert_eq!(resolve(&mut store, &input), Some("nora".to_string()));
}

#[test]
fn bind_redirects_process_and_merges_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_store(&dir);
    let sid = SessionId::new("s1");
    let pid = ProcessId::new("p1");

    store.with_registry(|r| {
        r.save_instance(live_instance("nora", Tool::Claude));
        r.set_session_binding(sid.clone(), "nora");
        // The launcher pre-created a placeholder and bound the process to it
        r.save_instance(Instance::placeholder("veki", Tool::Claude, fixed_ts()));
        r.set_process_binding(pid.clone(), None, "veki");
        r.upsert_notify_endpoint("veki", hcom_storage::NotifyKind::Pty, 4001);
    });

    let canonical = bind_session_to_process(&mut store, &sid, &pid, fixed_ts()).unwrap();
    assert_eq!(canonical, Some("nora".to_string()));

    // Placeholder merged away, endpoints migrated, process redirected
    assert!(store.registry().get_instance("veki").is_none());
    assert_eq!(store.registry().list_notify_ports("nora"), vec![4001]);
    assert_eq!(
        store.registry().process_binding(&pid).unwrap().instance_name,
        "nora"
    );
}

#[test]
fn bind_marks_real_instance_abandoned() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_store(&dir);
    let sid = SessionId::new("s1");
    let pid = ProcessId::new("p1");

    store.with_registry(|r| {
        r.save_instance(live_instance("nora", Tool::Claude));
        r.set_session_binding(sid.clone(), "nora");
        r.save_instance(live_instance("veki", Tool::Claude)); // a real instance, not a placeholder
        r.set_process_binding(pid.clone(), None, "veki");
    });

    bind_session_to_process(&mut store, &sid, &pid, fixed_ts()).unwrap();

    let veki = store.registry().get_instance("veki").unwrap();
    assert_eq!(veki.status, InstanceStatus::Inactive);
    assert_eq!(veki.status_context, "exit:session_switch");
}

#[test]
fn bind_with_unknown_session_records_session_on_binding() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_store(&dir);
    let pid = ProcessId::new("p1");
    store.with_registry(|r| {
        r.save_instance(live_instance("luna", Tool::Claude));
        r.set_process_binding(pid.clone(), None, "luna");
    });

    let out =
        bind_session_to_process(&mut store, &SessionId::new("fresh"), &pid, fixed_ts()).unwrap();
    assert_eq!(out, None);
    assert_eq!(
        store.registry().process_binding(&pid).unwrap().session_id,
        Some(SessionId::new("fresh"))
    );
}

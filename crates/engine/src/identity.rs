// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identity resolution: from "the process this hook fired under" and "the
//! session the transcript belongs to" to a canonical instance name.
//!
//! Resolution order:
//! 1. process binding (launcher-assigned, survives resume/fork)
//! 2. session binding
//! 3. transcript marker `[hcom:<name>]` against a still-pending row
//! 4. none — the caller decides (hook: exit 0, CLI: error)

use crate::error::EngineError;
use chrono::{DateTime, Utc};
use hcom_core::{InstanceStatus, ProcessId, SessionId};
use hcom_storage::Store;
use std::path::Path;
use tracing::{debug, info};

/// Inputs a hook or CLI entry can offer for resolution.
#[derive(Debug, Default, Clone)]
pub struct ResolveInput {
    pub process_id: Option<ProcessId>,
    pub session_id: Option<SessionId>,
    pub transcript_path: Option<std::path::PathBuf>,
}

/// Resolve to a canonical instance name, binding the session as a side
/// effect when the transcript marker path fires.
pub fn resolve(store: &mut Store, input: &ResolveInput) -> Option<String> {
    if let Some(process_id) = &input.process_id {
        if let Some(binding) = store.registry().process_binding(process_id) {
            let name = binding.instance_name.clone();
            if store.registry().get_instance(&name).is_some() {
                return Some(name);
            }
        }
    }

    if let Some(session_id) = &input.session_id {
        if let Some(name) = store.registry().get_session_binding(session_id) {
            let name = name.to_string();
            if store.registry().get_instance(&name).is_some() {
                return Some(name);
            }
        }
    }

    if let (Some(session_id), Some(transcript)) = (&input.session_id, &input.transcript_path) {
        if let Some(name) = scan_transcript_marker(transcript) {
            let pending = store
                .registry()
                .get_instance(&name)
                .is_some_and(|row| row.session_id.is_none());
            if pending {
                store.with_registry(|registry| {
                    registry.rebind_session(session_id.clone(), name.clone());
                    registry.update_instance(&name, |row| {
                        row.session_id = Some(session_id.clone());
                    });
                    registry.clear_session_id_from_other_instances(session_id, &name);
                });
                info!(%name, "bound session via transcript marker");
                return Some(name);
            }
        }
    }

    None
}

/// Scan a transcript for the last `[hcom:<name>]` marker emitted by `start`.
fn scan_transcript_marker(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let mut found = None;
    let mut rest = content.as_str();
    while let Some(start) = rest.find("[hcom:") {
        let after = &rest[start + "[hcom:".len()..];
        if let Some(end) = after.find(']') {
            let candidate = &after[..end];
            if !candidate.is_empty()
                && candidate
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
            {
                found = Some(candidate.to_string());
            }
            rest = &after[end..];
        } else {
            break;
        }
    }
    found
}

/// Bind a session to a launcher-assigned process.
///
/// When the session already maps to a canonical instance, the process
/// binding is redirected there: a true placeholder previously bound to the
/// process is merged away, while a real instance is marked abandoned
/// (`exit:session_switch`). Notify endpoints follow the redirect.
pub fn bind_session_to_process(
    store: &mut Store,
    session_id: &SessionId,
    process_id: &ProcessId,
    now: DateTime<Utc>,
) -> Result<Option<String>, EngineError> {
    let canonical = store
        .registry()
        .get_session_binding(session_id)
        .map(str::to_string);

    let Some(canonical) = canonical else {
        // Session unknown: record what we do know on the process binding
        let existing = store
            .registry()
            .process_binding(process_id)
            .map(|b| b.instance_name.clone());
        if let Some(name) = existing {
            store.with_registry(|registry| {
                registry.set_process_binding(process_id.clone(), Some(session_id.clone()), name);
            });
        }
        return Ok(None);
    };

    let previous = store
        .registry()
        .process_binding(process_id)
        .map(|b| b.instance_name.clone());

    if let Some(previous) = previous.filter(|p| *p != canonical) {
        let placeholder = store
            .registry()
            .get_instance(&previous)
            .is_some_and(|row| row.is_placeholder());

        store.with_registry(|registry| {
            registry.migrate_notify_endpoints(&previous, &canonical);
        });

        if placeholder {
            debug!(%previous, %canonical, "merging placeholder into canonical instance");
            store.with_registry(|registry| {
                registry.delete_instance(&previous);
            });
        } else {
            let _ = crate::bus::set_status(
                store,
                &previous,
                InstanceStatus::Inactive,
                "exit:session_switch",
                None,
                None,
                now,
            )?;
        }
    }

    store.with_registry(|registry| {
        registry.set_process_binding(
            process_id.clone(),
            Some(session_id.clone()),
            canonical.clone(),
        );
    });

    Ok(Some(canonical))
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mutable registry state: instances, bindings, notify endpoints, kv.
//!
//! Unlike the event log this state is updated in place. It is persisted as
//! an atomic snapshot (`registry.json`) on a short debounce; a crash loses
//! at most the last few milliseconds of registry churn, never the event
//! log.

use hcom_core::{Instance, ProcessId, SessionId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What kind of consumer a notify endpoint wakes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyKind {
    Pty,
    Hook,
    EventsWait,
    Inject,
}

/// A local TCP wake endpoint for one instance.
///
/// Endpoints are hints: a failed connect prunes the row. Multiple
/// concurrent endpoints per instance are legal (PTY + listen + hook).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyEndpoint {
    pub instance: String,
    pub kind: NotifyKind,
    pub port: u16,
}

/// Process binding: launcher-assigned id → instance, surviving session
/// resume/fork because the OS process is the stable identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessBinding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub instance_name: String,
}

/// The registry tables.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Registry {
    /// Base name → row. Names are globally unique per store.
    pub instances: HashMap<String, Instance>,
    /// session_id → instance name (unique on session_id)
    pub session_bindings: HashMap<SessionId, String>,
    /// process_id → binding
    pub process_bindings: HashMap<ProcessId, ProcessBinding>,
    #[serde(default)]
    pub notify_endpoints: Vec<NotifyEndpoint>,
    /// Small keyed blob store; `kv_set(key, None)` tombstone-deletes.
    #[serde(default)]
    pub kv: HashMap<String, String>,
}

impl Registry {
    pub fn get_instance(&self, name: &str) -> Option<&Instance> {
        self.instances.get(name)
    }

    /// Find a row by base or full (tag-prefixed) name.
    pub fn find_instance(&self, name: &str) -> Option<&Instance> {
        self.instances
            .get(name)
            .or_else(|| self.instances.values().find(|i| i.full_name() == name))
    }

    /// Insert or replace a row.
    pub fn save_instance(&mut self, instance: Instance) {
        self.instances.insert(instance.name.clone(), instance);
    }

    /// Partial update through a closure; no-op when the row is gone.
    /// Returns whether the row existed.
    pub fn update_instance<F>(&mut self, name: &str, update: F) -> bool
    where
        F: FnOnce(&mut Instance),
    {
        match self.instances.get_mut(name) {
            Some(row) => {
                update(row);
                true
            }
            None => false,
        }
    }

    /// Delete a row, cascading its session bindings. Deleting a row that
    /// was concurrently removed is not an error.
    pub fn delete_instance(&mut self, name: &str) -> Option<Instance> {
        let row = self.instances.remove(name)?;
        self.session_bindings.retain(|_, bound| bound != name);
        Some(row)
    }

    pub fn get_session_binding(&self, session_id: &SessionId) -> Option<&str> {
        self.session_bindings.get(session_id).map(String::as_str)
    }

    pub fn set_session_binding(&mut self, session_id: SessionId, name: impl Into<String>) {
        self.session_bindings.insert(session_id, name.into());
    }

    /// Bind, clearing any conflicting binding for the same session.
    pub fn rebind_session(&mut self, session_id: SessionId, name: impl Into<String>) {
        let name = name.into();
        self.session_bindings.retain(|_, bound| *bound != name);
        self.session_bindings.insert(session_id, name);
    }

    /// Clear `session_id` from every row except `except`, enforcing the
    /// one-instance-per-session invariant after a rebind.
    pub fn clear_session_id_from_other_instances(
        &mut self,
        session_id: &SessionId,
        except: &str,
    ) {
        for row in self.instances.values_mut() {
            if row.name != except && row.session_id.as_ref() == Some(session_id) {
                row.session_id = None;
            }
        }
    }

    pub fn process_binding(&self, process_id: &ProcessId) -> Option<&ProcessBinding> {
        self.process_bindings.get(process_id)
    }

    pub fn set_process_binding(
        &mut self,
        process_id: ProcessId,
        session_id: Option<SessionId>,
        instance_name: impl Into<String>,
    ) {
        self.process_bindings.insert(
            process_id,
            ProcessBinding {
                session_id,
                instance_name: instance_name.into(),
            },
        );
    }

    pub fn delete_process_binding(&mut self, process_id: &ProcessId) {
        self.process_bindings.remove(process_id);
    }

    pub fn delete_process_bindings_for_instance(&mut self, name: &str) {
        self.process_bindings
            .retain(|_, binding| binding.instance_name != name);
    }

    /// Ports registered for an instance (any kind).
    pub fn list_notify_ports(&self, instance: &str) -> Vec<u16> {
        self.notify_endpoints
            .iter()
            .filter(|e| e.instance == instance)
            .map(|e| e.port)
            .collect()
    }

    /// Idempotent insert: one row per (instance, kind, port).
    pub fn upsert_notify_endpoint(&mut self, instance: &str, kind: NotifyKind, port: u16) {
        let exists = self
            .notify_endpoints
            .iter()
            .any(|e| e.instance == instance && e.kind == kind && e.port == port);
        if !exists {
            self.notify_endpoints.push(NotifyEndpoint {
                instance: instance.to_string(),
                kind,
                port,
            });
        }
    }

    /// Delete endpoints for an instance, optionally narrowed by kind/port.
    pub fn delete_notify_endpoint(
        &mut self,
        instance: &str,
        kind: Option<NotifyKind>,
        port: Option<u16>,
    ) {
        self.notify_endpoints.retain(|e| {
            e.instance != instance
                || kind.is_some_and(|k| e.kind != k)
                || port.is_some_and(|p| e.port != p)
        });
    }

    /// Move all endpoints from one instance name to another (reclaim,
    /// fork, `--as`).
    pub fn migrate_notify_endpoints(&mut self, from: &str, to: &str) {
        for endpoint in &mut self.notify_endpoints {
            if endpoint.instance == from {
                endpoint.instance = to.to_string();
            }
        }
    }

    pub fn kv_get(&self, key: &str) -> Option<&str> {
        self.kv.get(key).map(String::as_str)
    }

    /// Set or tombstone-delete a key.
    pub fn kv_set(&mut self, key: &str, value: Option<String>) {
        match value {
            Some(v) => {
                self.kv.insert(key.to_string(), v);
            }
            None => {
                self.kv.remove(key);
            }
        }
    }

    /// Keys with the given prefix, for subscription iteration.
    pub fn kv_keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .kv
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// The live participating set as (base, tag) pairs for addressing.
    pub fn live_names(&self) -> Vec<hcom_core::LiveName> {
        let mut names: Vec<&Instance> = self.instances.values().collect();
        names.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
        names
            .into_iter()
            .map(|i| hcom_core::LiveName::new(i.name.clone(), i.tag.as_deref()))
            .collect()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;

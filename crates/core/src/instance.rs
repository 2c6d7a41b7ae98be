// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Instance rows: the live set of participating assistants.
//!
//! The existence of a row is the sole gate for participation; a missing row
//! means "not a participant right now" and all delivery is a no-op.

use crate::id::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// The assistant tool a row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Claude,
    Gemini,
    Codex,
    #[default]
    Adhoc,
}

impl Tool {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tool::Claude => "claude",
            Tool::Gemini => "gemini",
            Tool::Codex => "codex",
            Tool::Adhoc => "adhoc",
        }
    }
}

/// Current status of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Active,
    Listening,
    Blocked,
    #[default]
    Inactive,
    /// Delivery thread crashed; the tool keeps running with degraded delivery
    Error,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Active => "active",
            InstanceStatus::Listening => "listening",
            InstanceStatus::Blocked => "blocked",
            InstanceStatus::Inactive => "inactive",
            InstanceStatus::Error => "error",
        }
    }
}

/// A participating assistant.
///
/// `name` is the base form (CVCV allocator preferred, globally unique per
/// store); `tag` is an optional group label displayed as `tag-name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// At most one instance per session (unique when non-null)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub tool: Tool,
    #[serde(default)]
    pub directory: PathBuf,
    #[serde(default)]
    pub background: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default)]
    pub status: InstanceStatus,
    pub status_time: DateTime<Utc>,
    #[serde(default)]
    pub status_context: String,
    #[serde(default)]
    pub status_detail: String,
    /// Delivery cursor: highest event id this instance has consumed
    #[serde(default)]
    pub last_event_id: i64,
    /// Liveness heartbeat (historical name; updated on every listen iteration)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_stop: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_context: Option<Value>,
    /// Set for instances synced from another host; never stopped locally
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_device_id: Option<String>,
}

impl Instance {
    /// New placeholder row as the launcher creates it: no session yet,
    /// inactive, context `"new"`.
    pub fn placeholder(name: impl Into<String>, tool: Tool, now: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            tag: None,
            session_id: None,
            parent_session_id: None,
            parent_name: None,
            agent_id: None,
            tool,
            directory: PathBuf::new(),
            background: false,
            pid: None,
            status: InstanceStatus::Inactive,
            status_time: now,
            status_context: "new".to_string(),
            status_detail: String::new(),
            last_event_id: 0,
            last_stop: None,
            created_at: now,
            launch_context: None,
            origin_device_id: None,
        }
    }

    /// Display/address form: `tag-name` when tagged, bare name otherwise.
    pub fn full_name(&self) -> String {
        match &self.tag {
            Some(tag) => format!("{}-{}", tag, self.name),
            None => self.name.clone(),
        }
    }

    /// A placeholder has never been claimed by a session.
    pub fn is_placeholder(&self) -> bool {
        self.session_id.is_none() && self.status_context == "new"
    }

    /// Synced from another device (never stopped locally).
    pub fn is_remote(&self) -> bool {
        self.origin_device_id.is_some()
    }

    /// Spawned by another instance's Task tool.
    pub fn is_subagent(&self) -> bool {
        self.parent_session_id.is_some()
    }

    /// External senders were created via `start` + `send --name`: they have
    /// no session (no hooks), no parent, and are not remote.
    pub fn is_external_sender(&self) -> bool {
        !self.is_remote() && !self.is_subagent() && self.session_id.is_none()
    }

    /// Full row snapshot for embedding in the final `life/stopped` event.
    pub fn snapshot(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;

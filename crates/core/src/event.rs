// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event types for the hcom store and wire format.
//!
//! Wire shape (one JSON object per event, also used for relay export):
//! `{"id": i64, "ts": "ISO-8601 UTC", "type": "message|status|life", "instance": str, "data": {...}}`
//!
//! Unknown keys inside `data` are preserved on read and written back out,
//! so consumers on older/newer versions interoperate.

use crate::instance::InstanceStatus;
use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Durable event category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Message,
    Status,
    Life,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Message => "message",
            EventKind::Status => "status",
            EventKind::Life => "life",
        }
    }
}

/// Delivery scope of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[default]
    Broadcast,
    Mentions,
}

/// Conversational intent attached to a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Request,
    #[default]
    Inform,
    Ack,
}

/// Who wrote a message.
///
/// `External` senders may write messages but not status; `System` may write
/// both; only `Instance` senders write all three event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderKind {
    #[default]
    Instance,
    External,
    System,
}

/// Lifecycle action recorded in `life` events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifeAction {
    Created,
    Ready,
    Started,
    Stopped,
    BatchLaunched,
}

/// Payload of a `message` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageData {
    pub from: String,
    pub text: String,
    #[serde(default)]
    pub scope: Scope,
    /// Resolved full instance names (read receipts + cursor logic)
    #[serde(default)]
    pub delivered_to: Vec<String>,
    /// Raw parsed tokens (subscription filtering)
    #[serde(default)]
    pub mentions: Vec<String>,
    #[serde(default)]
    pub intent: Intent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<i64>,
    #[serde(default)]
    pub sender_kind: SenderKind,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessageData {
    pub fn new(from: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            text: text.into(),
            scope: Scope::Broadcast,
            delivered_to: Vec::new(),
            mentions: Vec::new(),
            intent: Intent::Inform,
            thread: None,
            reply_to: None,
            sender_kind: SenderKind::Instance,
            extra: Map::new(),
        }
    }
}

/// Payload of a `status` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusData {
    pub status: InstanceStatus,
    #[serde(default)]
    pub context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Opaque position marker from transcript-derived status (pass-through)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Value>,
    /// Timestamp of the last delivered message, for `deliver:*` contexts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_ts: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StatusData {
    pub fn new(status: InstanceStatus, context: impl Into<String>) -> Self {
        Self {
            status,
            context: context.into(),
            detail: None,
            position: None,
            msg_ts: None,
            extra: Map::new(),
        }
    }
}

/// Payload of a `life` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeData {
    pub action: LifeAction,
    /// Who initiated the action (instance name, "bigboss", "launcher", ...)
    pub by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    /// Number of instances launched, on `batch_launched`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launched: Option<u32>,
    /// Full row snapshot embedded in the final `stopped` event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LifeData {
    pub fn new(action: LifeAction, by: impl Into<String>) -> Self {
        Self {
            action,
            by: by.into(),
            reason: None,
            batch_id: None,
            launched: None,
            snapshot: None,
            extra: Map::new(),
        }
    }
}

/// Typed event payload; the variant determines the event's `type` tag.
#[derive(Debug, Clone, PartialEq)]
pub enum EventData {
    Message(MessageData),
    Status(StatusData),
    Life(LifeData),
}

impl EventData {
    pub fn kind(&self) -> EventKind {
        match self {
            EventData::Message(_) => EventKind::Message,
            EventData::Status(_) => EventKind::Status,
            EventData::Life(_) => EventKind::Life,
        }
    }

    pub fn as_message(&self) -> Option<&MessageData> {
        match self {
            EventData::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_status(&self) -> Option<&StatusData> {
        match self {
            EventData::Status(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_life(&self) -> Option<&LifeData> {
        match self {
            EventData::Life(l) => Some(l),
            _ => None,
        }
    }
}

/// A durable, append-only store record.
///
/// `instance` is the subject of the event, not necessarily the sender.
/// Events are never mutated; ids are strictly monotonic within a store
/// generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub instance: String,
    pub data: EventData,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        self.data.kind()
    }
}

// The `type` tag lives beside `data` on the wire, so Event carries a custom
// serde pair that routes the payload by the sibling tag.

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut st = serializer.serialize_struct("Event", 5)?;
        st.serialize_field("id", &self.id)?;
        st.serialize_field("ts", &self.ts)?;
        st.serialize_field("type", &self.kind())?;
        st.serialize_field("instance", &self.instance)?;
        match &self.data {
            EventData::Message(m) => st.serialize_field("data", m)?,
            EventData::Status(s) => st.serialize_field("data", s)?,
            EventData::Life(l) => st.serialize_field("data", l)?,
        }
        st.end()
    }
}

#[derive(Deserialize)]
struct WireEvent {
    id: i64,
    ts: DateTime<Utc>,
    #[serde(rename = "type")]
    kind: EventKind,
    #[serde(default)]
    instance: String,
    data: Value,
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireEvent::deserialize(deserializer)?;
        let data = match wire.kind {
            EventKind::Message => EventData::Message(
                serde_json::from_value(wire.data).map_err(D::Error::custom)?,
            ),
            EventKind::Status => {
                EventData::Status(serde_json::from_value(wire.data).map_err(D::Error::custom)?)
            }
            EventKind::Life => {
                EventData::Life(serde_json::from_value(wire.data).map_err(D::Error::custom)?)
            }
        };
        Ok(Event {
            id: wire.id,
            ts: wire.ts,
            instance: wire.instance,
            data,
        })
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;

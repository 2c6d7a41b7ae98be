// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test builders shared across crates' tests.

use crate::event::{Event, EventData, MessageData};
use crate::instance::{Instance, InstanceStatus, Tool};
use chrono::{TimeZone, Utc};

/// A fixed timestamp for deterministic tests.
pub fn fixed_ts() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// A live instance row bound to a session, ready for delivery tests.
pub fn live_instance(name: &str, tool: Tool) -> Instance {
    let mut row = Instance::placeholder(name, tool, fixed_ts());
    row.session_id = Some(crate::id::SessionId::new(format!("session-{name}")));
    row.status = InstanceStatus::Listening;
    row.status_context = "ready".to_string();
    row
}

/// A broadcast message event with the given id.
pub fn message_event(id: i64, from: &str, text: &str) -> Event {
    Event {
        id,
        ts: fixed_ts(),
        instance: from.to_string(),
        data: EventData::Message(MessageData::new(from, text)),
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! MessageBus: message writes, unread computation, cursor advance and
//! status emission.

use crate::error::EngineError;
use crate::notify::NotifyBus;
use crate::runtime::SharedStore;
use chrono::{DateTime, Utc};
use hcom_core::{
    parse_targets, resolve_targets, Config, Event, EventData, Instance, InstanceStatus, Intent,
    MessageData, Scope, SenderKind, StatusData,
};
use tracing::debug;

/// The literal system sender used for self-announcements.
pub const SYSTEM_SENDER: &str = "hcom";

/// Result of a send: the appended event plus addressing warnings.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub event: Event,
    pub warnings: Vec<String>,
}

/// Validate message text: nonempty, size cap, no embedded NUL.
fn validate_text(text: &str, config: &Config) -> Result<(), EngineError> {
    if text.trim().is_empty() {
        return Err(EngineError::invalid("message text is empty"));
    }
    if text.len() > config.max_message_bytes {
        return Err(EngineError::invalid(format!(
            "message exceeds {} bytes",
            config.max_message_bytes
        )));
    }
    if text.contains('\0') {
        return Err(EngineError::invalid("message contains NUL"));
    }
    Ok(())
}

/// Classify the sender. Known rows are `Instance` (or `External` for
/// ad-hoc sender rows); the literal system sender is `System`; anything
/// else (the human at the CLI) is `External`.
fn classify_sender(store: &hcom_storage::Store, from: &str) -> SenderKind {
    if from == SYSTEM_SENDER || from.starts_with("[hcom") {
        return SenderKind::System;
    }
    match store.registry().find_instance(from) {
        Some(row) if row.is_external_sender() => SenderKind::External,
        Some(_) => SenderKind::Instance,
        None => SenderKind::External,
    }
}

/// Send a message: resolve targets, append the event, wake the delivered
/// set. Addressing warnings are recorded as status events on the sender's
/// subject line and returned.
#[allow(clippy::too_many_arguments)]
pub async fn send(
    store: &SharedStore,
    notify: &NotifyBus,
    config: &Config,
    from: &str,
    text: &str,
    target_tokens: &[String],
    intent: Intent,
    reply_to: Option<i64>,
    thread: Option<String>,
) -> Result<SendOutcome, EngineError> {
    validate_text(text, config)?;
    let targets = parse_targets(target_tokens)?;

    let (event, warnings) = {
        let mut guard = store.lock();

        let sender_kind = classify_sender(&guard, from);
        let sender_full = guard
            .registry()
            .find_instance(from)
            .map(|row| row.full_name());

        let live = guard.registry().live_names();
        let mut resolution = resolve_targets(&targets, &live, config.relay_enabled);

        // Broadcasts fan out to everyone but the sender
        if let (Scope::Broadcast, Some(sender_full)) = (resolution.scope, &sender_full) {
            resolution.delivered_to.retain(|name| name != sender_full);
        }

        let mut data = MessageData::new(from, text);
        data.scope = resolution.scope;
        data.delivered_to = resolution.delivered_to.clone();
        data.mentions = resolution.mentions.clone();
        data.intent = intent;
        data.reply_to = reply_to;
        data.thread = thread;
        data.sender_kind = sender_kind;

        let event = guard.append_event(from, EventData::Message(data), None)?;

        for warning in &resolution.warnings {
            let mut status = StatusData::new(InstanceStatus::Active, "warn:addressing");
            status.detail = Some(warning.clone());
            guard.append_event(from, EventData::Status(status), None)?;
        }

        guard.flush()?;
        (event, resolution.warnings)
    };

    debug!(from, id = event.id, "message appended");

    if let EventData::Message(m) = &event.data {
        notify.wake_all(store, &m.delivered_to).await;
    }

    Ok(SendOutcome { event, warnings })
}

/// Unread messages for an instance: events past the cursor that are
/// broadcasts or mention the instance's full name.
pub fn unread(
    store: &hcom_storage::Store,
    row: &Instance,
    limit: usize,
) -> Result<Vec<Event>, EngineError> {
    let full_name = row.full_name();
    let events = store.events_after_matching(row.last_event_id, limit, |event| {
        let EventData::Message(m) = &event.data else {
            return false;
        };
        match m.scope {
            Scope::Broadcast => m.from != full_name && m.from != row.name,
            Scope::Mentions => m.delivered_to.iter().any(|name| name == &full_name),
        }
    })?;
    Ok(events)
}

/// Advance the cursor through the largest id actually delivered. The
/// cursor never moves backwards and never skips past unread events.
pub fn advance_cursor(
    store: &mut hcom_storage::Store,
    name: &str,
    delivered_through: i64,
) -> Result<(), EngineError> {
    store.with_registry(|registry| {
        registry.update_instance(name, |row| {
            if delivered_through > row.last_event_id {
                row.last_event_id = delivered_through;
            }
        });
    });
    Ok(())
}

/// Set instance status, appending a `status` event when the visible state
/// actually changed. Heartbeat-only refreshes stay row-local.
///
/// Returns the appended event, when one was written.
pub fn set_status(
    store: &mut hcom_storage::Store,
    name: &str,
    status: InstanceStatus,
    context: &str,
    detail: Option<String>,
    msg_ts: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<Option<Event>, EngineError> {
    let changed = {
        let Some(row) = store.registry().get_instance(name) else {
            // Row gone: delivery is a no-op, not an error
            return Ok(None);
        };
        row.status != status || row.status_context != context
    };

    store.with_registry(|registry| {
        registry.update_instance(name, |row| {
            row.status = status;
            row.status_context = context.to_string();
            row.status_detail = detail.clone().unwrap_or_default();
            row.status_time = now;
        });
    });

    if !changed {
        return Ok(None);
    }
    let mut data = StatusData::new(status, context);
    data.detail = detail;
    data.msg_ts = msg_ts;
    let event = store.append_event(name, EventData::Status(data), None)?;
    Ok(Some(event))
}

/// Gate status: visible in the row (`tui:<reason>`) but never logged as an
/// event, so a flapping gate doesn't bloat the store.
pub fn set_gate_status(
    store: &mut hcom_storage::Store,
    name: &str,
    context: &str,
    detail: &str,
    now: DateTime<Utc>,
) {
    store.with_registry(|registry| {
        registry.update_instance(name, |row| {
            row.status_context = context.to_string();
            row.status_detail = detail.to_string();
            row.status_time = now;
        });
    });
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;

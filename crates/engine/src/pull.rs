// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pull delivery: blocking `listen` and the Stop-hook drain path.
//!
//! A listen registers a fresh notify endpoint, parks on it, and drains
//! unread messages the moment a wake (or the poll interval) finds any.
//! The cursor advances only through the largest id actually returned;
//! timeouts leave it untouched.

use crate::bus;
use crate::error::EngineError;
use crate::notify::NotifyWaiter;
use crate::runtime::Runtime;
use chrono::{DateTime, Utc};
use hcom_core::{Clock, Event, EventData, InstanceStatus};
use hcom_storage::{NotifyKind, Predicate};
use std::time::Duration;
use tracing::debug;

/// Interval between store re-checks while parked; also the heartbeat cadence
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How far back `wait_events` scans for matches that landed before the
/// endpoint was registered (covers the append/wake race window)
const LOOKBACK: chrono::Duration = chrono::Duration::seconds(10);

/// Result of a listen call.
#[derive(Debug, Clone, Default)]
pub struct ListenOutcome {
    pub messages: Vec<Event>,
    pub timed_out: bool,
    /// New cursor position when messages were delivered
    pub cursor_advanced: Option<i64>,
}

/// Blocking listen for one instance.
///
/// Returns as soon as a delivery batch is drained (bounded by
/// `max_messages_per_delivery`; earlier-than-cursor messages stay unread
/// for the next round), or with `timed_out` after `timeout`.
pub async fn listen<C: Clock>(
    runtime: &Runtime<C>,
    name: &str,
    timeout: Duration,
    filter: Option<&Predicate>,
    kind: NotifyKind,
) -> Result<ListenOutcome, EngineError> {
    let store = runtime.store().clone();
    let limit = runtime.config().max_messages_per_delivery;

    let base_name = {
        let guard = store.lock();
        guard
            .registry()
            .find_instance(name)
            .map(|row| row.name.clone())
            .ok_or(EngineError::NotParticipating)?
    };

    let waiter = NotifyWaiter::bind().await?;
    {
        let mut guard = store.lock();
        guard.with_registry(|registry| {
            registry.upsert_notify_endpoint(&base_name, kind, waiter.port());
        });
        let _ = bus::set_status(
            &mut guard,
            &base_name,
            InstanceStatus::Listening,
            "listen",
            None,
            None,
            runtime.now(),
        )?;
        heartbeat(&mut guard, &base_name, runtime.now());
        guard.flush()?;
    }

    let deadline = tokio::time::Instant::now() + timeout;
    let outcome = loop {
        // Row deleted mid-listen (stop): wake observes the gone row
        let drained = {
            let mut guard = store.lock();
            let Some(row) = guard.registry().get_instance(&base_name).cloned() else {
                break ListenOutcome {
                    timed_out: false,
                    ..Default::default()
                };
            };
            heartbeat(&mut guard, &base_name, runtime.now());

            let mut messages = bus::unread(&guard, &row, limit)?;
            if let Some(predicate) = filter {
                messages.retain(|event| predicate.matches(event));
            }

            if messages.is_empty() {
                None
            } else {
                let last = &messages[messages.len() - 1];
                let last_id = last.id;
                let last_ts = last.ts;
                let last_from = match &last.data {
                    EventData::Message(m) => m.from.clone(),
                    _ => String::new(),
                };
                bus::advance_cursor(&mut guard, &base_name, last_id)?;
                let _ = bus::set_status(
                    &mut guard,
                    &base_name,
                    InstanceStatus::Active,
                    &format!("deliver:{last_from}"),
                    None,
                    Some(last_ts),
                    runtime.now(),
                )?;
                guard.flush()?;
                Some((messages, last_id))
            }
        };

        if let Some((messages, last_id)) = drained {
            debug!(instance = %base_name, count = messages.len(), "listen drained");
            break ListenOutcome {
                messages,
                timed_out: false,
                cursor_advanced: Some(last_id),
            };
        }

        let now = tokio::time::Instant::now();
        if now >= deadline {
            break ListenOutcome {
                timed_out: true,
                ..Default::default()
            };
        }
        let wait = POLL_INTERVAL.min(deadline - now);
        waiter.wait(wait).await;
    };

    // The endpoint dies with this call
    {
        let mut guard = store.lock();
        guard.with_registry(|registry| {
            registry.delete_notify_endpoint(&base_name, Some(kind), Some(waiter.port()));
        });
        let _ = guard.flush();
    }

    Ok(outcome)
}

/// Heartbeat: row-local liveness stamp, no event.
fn heartbeat(store: &mut hcom_storage::Store, name: &str, now: DateTime<Utc>) {
    store.with_registry(|registry| {
        registry.update_instance(name, |row| {
            row.last_stop = Some(now);
        });
    });
}

/// Wait for any event matching `filter` with `id > after`
/// (`events --wait`). No cursor is involved; the caller tracks its own
/// last-seen id. Scans back [`LOOKBACK`] on entry so matches that landed
/// just before registration aren't missed.
pub async fn wait_events<C: Clock>(
    runtime: &Runtime<C>,
    instance: Option<&str>,
    after: Option<i64>,
    timeout: Duration,
    filter: &Predicate,
) -> Result<Vec<Event>, EngineError> {
    let store = runtime.store().clone();

    let floor = match after {
        Some(id) => id,
        None => {
            // Look back a bounded window for already-present matches
            let cutoff = runtime.now() - LOOKBACK;
            let guard = store.lock();
            let recent =
                guard.events_after_matching(0, usize::MAX, |event| event.ts >= cutoff)?;
            match recent.first() {
                Some(first) => first.id - 1,
                None => guard.last_event_id(),
            }
        }
    };

    let waiter = NotifyWaiter::bind().await?;
    if let Some(instance) = instance {
        let mut guard = store.lock();
        guard.with_registry(|registry| {
            registry.upsert_notify_endpoint(instance, NotifyKind::EventsWait, waiter.port());
        });
        guard.flush()?;
    }

    let deadline = tokio::time::Instant::now() + timeout;
    let result = loop {
        let matches = {
            let guard = store.lock();
            guard.events_after_matching(floor, usize::MAX, |event| filter.matches(event))?
        };
        if !matches.is_empty() {
            break matches;
        }

        let now = tokio::time::Instant::now();
        if now >= deadline {
            break Vec::new();
        }
        waiter.wait(POLL_INTERVAL.min(deadline - now)).await;
    };

    if let Some(instance) = instance {
        let mut guard = store.lock();
        guard.with_registry(|registry| {
            registry.delete_notify_endpoint(
                instance,
                Some(NotifyKind::EventsWait),
                Some(waiter.port()),
            );
        });
        let _ = guard.flush();
    }

    Ok(result)
}

#[cfg(test)]
#[path = "pull_tests.rs"]
mod tests;

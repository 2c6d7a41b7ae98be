// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event subscriptions: KV-backed predicates matched on every append.
//!
//! A subscription is a `events_sub:<id>` KV row holding a caller identity,
//! a predicate over the flattened event view, the last-seen event id and
//! an optional `once` flag. Matches enqueue a system message to the
//! caller; `once` subscriptions delete themselves after the first hit.

use crate::bus::SYSTEM_SENDER;
use crate::error::EngineError;
use crate::runtime::Runtime;
use hcom_core::{Clock, Event, EventData, Intent, SenderKind};
use hcom_storage::parse_predicate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const KV_PREFIX: &str = "events_sub:";

/// A stored subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    /// Instance that receives match notifications
    pub caller: String,
    /// Predicate source over the flattened event view
    pub predicate: String,
    /// Highest event id already notified
    #[serde(default)]
    pub last_event_id: i64,
    /// Delete after the first match
    #[serde(default)]
    pub once: bool,
}

/// Preset predicates, parameterised by instance name or command pattern.
pub fn preset(name: &str, param: &str) -> Option<String> {
    let quoted = param.replace('\'', "''");
    match name {
        "idle" => Some(format!(
            "type = 'status' AND status = 'listening' AND instance = '{quoted}'"
        )),
        "file_edits" => Some(format!(
            "type = 'status' AND context LIKE 'tool:edit%' AND instance = '{quoted}'"
        )),
        "collision" => Some(format!(
            "type = 'status' AND context LIKE 'tool:edit%' AND detail LIKE '%{quoted}%'"
        )),
        "cmd" => Some(format!(
            "type = 'status' AND context LIKE 'tool:bash%' AND detail LIKE '%{quoted}%'"
        )),
        _ => None,
    }
}

/// Create a subscription. The predicate is parsed up front; equality
/// comparisons against array fields are surfaced as warnings (callers
/// almost always want `LIKE '%name%'`).
pub fn create<C: Clock>(
    runtime: &Runtime<C>,
    caller: &str,
    predicate_src: &str,
    once: bool,
) -> Result<(String, Vec<String>), EngineError> {
    let predicate = parse_predicate(predicate_src)?;
    let warnings: Vec<String> = predicate
        .equality_on_array_fields()
        .into_iter()
        .map(|field| {
            format!("'{field}' is a JSON array; use {field} LIKE '%name%' instead of equality")
        })
        .collect();

    let id = uuid::Uuid::new_v4().to_string();
    let subscription = Subscription {
        id: id.clone(),
        caller: caller.to_string(),
        predicate: predicate_src.to_string(),
        last_event_id: {
            let guard = runtime.store().lock();
            guard.last_event_id()
        },
        once,
    };

    let mut guard = runtime.store().lock();
    let value = serde_json::to_string(&subscription)
        .map_err(|e| EngineError::invalid(e.to_string()))?;
    guard.with_registry(|registry| {
        registry.kv_set(&format!("{KV_PREFIX}{id}"), Some(value));
    });
    guard.flush()?;
    debug!(id = %id, caller, "subscription created");
    Ok((id, warnings))
}

/// Delete a subscription by id. Unknown ids are a no-op.
pub fn remove<C: Clock>(runtime: &Runtime<C>, id: &str) -> Result<bool, EngineError> {
    let mut guard = runtime.store().lock();
    let key = format!("{KV_PREFIX}{id}");
    let existed = guard.registry().kv_get(&key).is_some();
    if existed {
        guard.with_registry(|registry| registry.kv_set(&key, None));
        guard.flush()?;
    }
    Ok(existed)
}

/// List all subscriptions.
pub fn list<C: Clock>(runtime: &Runtime<C>) -> Vec<Subscription> {
    let guard = runtime.store().lock();
    let keys = guard.registry().kv_keys_with_prefix(KV_PREFIX);
    keys.iter()
        .filter_map(|key| guard.registry().kv_get(key))
        .filter_map(|value| serde_json::from_str(value).ok())
        .collect()
}

/// Run the matcher over a freshly appended event.
///
/// System-sender messages are skipped so a subscription on message events
/// cannot feed back on its own notifications.
pub async fn match_event<C: Clock>(
    runtime: &Runtime<C>,
    event: &Event,
) -> Result<(), EngineError> {
    if let EventData::Message(m) = &event.data {
        if m.sender_kind == SenderKind::System {
            return Ok(());
        }
    }

    let mut hits: Vec<Subscription> = Vec::new();
    {
        let guard = runtime.store().lock();
        let keys = guard.registry().kv_keys_with_prefix(KV_PREFIX);
        for key in keys {
            let Some(value) = guard.registry().kv_get(&key) else {
                continue;
            };
            let Ok(subscription) = serde_json::from_str::<Subscription>(value) else {
                warn!(key, "unparseable subscription dropped from matching");
                continue;
            };
            if event.id <= subscription.last_event_id {
                continue;
            }
            let Ok(predicate) = parse_predicate(&subscription.predicate) else {
                continue;
            };
            if predicate.matches(event) {
                hits.push(subscription);
            }
        }
    }

    for mut subscription in hits {
        {
            let mut guard = runtime.store().lock();
            if subscription.once {
                guard.with_registry(|registry| {
                    registry.kv_set(&format!("{KV_PREFIX}{}", subscription.id), None);
                });
            } else {
                subscription.last_event_id = event.id;
                let value = serde_json::to_string(&subscription)
                    .map_err(|e| EngineError::invalid(e.to_string()))?;
                guard.with_registry(|registry| {
                    registry.kv_set(&format!("{KV_PREFIX}{}", subscription.id), Some(value));
                });
            }
        }

        let text = format!(
            "[sub {}] event {} matched: {}",
            &subscription.id[..8.min(subscription.id.len())],
            event.id,
            summarize(event)
        );
        let target = format!("@{}", subscription.caller);
        // Direct bus send: notifications are system messages, which the
        // matcher skips, so no re-entry is possible.
        crate::bus::send(
            runtime.store(),
            runtime.notify(),
            runtime.config(),
            SYSTEM_SENDER,
            &text,
            &[target],
            Intent::Inform,
            None,
            None,
        )
        .await?;
    }

    Ok(())
}

fn summarize(event: &Event) -> String {
    match &event.data {
        EventData::Message(m) => format!("{}: {}", m.from, truncate(&m.text, 80)),
        EventData::Status(s) => format!(
            "{} is {} ({})",
            event.instance,
            s.status.as_str(),
            s.context
        ),
        EventData::Life(l) => format!("{} {:?}", event.instance, l.action),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        text.to_string()
    } else {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &text[..end])
    }
}

#[cfg(test)]
#[path = "subscriptions_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Instance lifecycle: create, start, reclaim, stop, batch readiness and
//! stale cleanup.

use crate::bus::{self, SYSTEM_SENDER};
use crate::error::EngineError;
use crate::notify::NotifyBus;
use crate::runtime::SharedStore;
use chrono::{DateTime, Utc};
use hcom_core::{
    Config, EventData, Instance, InstanceStatus, Intent, LifeAction, LifeData, NameAllocator,
    ProcessId, SessionId, Tool,
};
use hcom_storage::Store;
use serde_json::Value;
use tracing::{info, warn};

/// Options for creating an instance row.
#[derive(Debug, Default, Clone)]
pub struct CreateOpts {
    /// Explicit name; allocated from the CVCV pool when absent
    pub name: Option<String>,
    pub tool: Tool,
    pub tag: Option<String>,
    pub session_id: Option<SessionId>,
    pub parent_session_id: Option<SessionId>,
    pub parent_name: Option<String>,
    pub agent_id: Option<String>,
    pub directory: Option<std::path::PathBuf>,
    pub background: bool,
    pub pid: Option<u32>,
    /// Freeform launch snapshot (carries `batch_id` for batch launches)
    pub launch_context: Option<Value>,
    /// Batch launch event id: seeds the cursor so the whole batch shares a
    /// history horizon. Rejected when it predates a store reset.
    pub launch_event_id: Option<i64>,
    pub by: Option<String>,
}

/// Create an instance row. Idempotent: an existing placeholder is filled
/// in with the provided fields rather than failing.
///
/// Fresh rows seed `last_event_id` to the current maximum ("skip
/// history"), or to the batch launch event id when one was supplied and is
/// still valid.
pub fn create_instance(
    store: &mut Store,
    now: DateTime<Utc>,
    opts: CreateOpts,
) -> Result<String, EngineError> {
    let allocator = NameAllocator::new();
    let name = match &opts.name {
        Some(name) => {
            allocator.validate(name)?;
            name.clone()
        }
        None => {
            let live: Vec<String> = store.registry().instances.keys().cloned().collect();
            allocator.allocate(&live, &mut rand::rng())?
        }
    };

    if let Some(existing) = store.registry().get_instance(&name).cloned() {
        // Fill in, don't fail
        store.with_registry(|registry| {
            registry.update_instance(&name, |row| {
                if row.session_id.is_none() {
                    row.session_id = opts.session_id.clone();
                }
                if row.tag.is_none() {
                    row.tag = opts.tag.clone();
                }
                if let Some(dir) = &opts.directory {
                    row.directory = dir.clone();
                }
                if row.pid.is_none() {
                    row.pid = opts.pid;
                }
                if row.launch_context.is_none() {
                    row.launch_context = opts.launch_context.clone();
                }
            });
            if let Some(session_id) = &opts.session_id {
                if existing.session_id.is_none() {
                    registry.rebind_session(session_id.clone(), name.clone());
                }
            }
        });
        return Ok(name);
    }

    let last = store.last_event_id();
    let cursor = match opts.launch_event_id {
        // A launch event id beyond the current max means the env var
        // outlived a store reset; fall back to skip-history.
        Some(id) if id <= last => id,
        _ => last,
    };

    let mut row = Instance::placeholder(&name, opts.tool, now);
    row.tag = opts.tag.clone();
    row.session_id = opts.session_id.clone();
    row.parent_session_id = opts.parent_session_id.clone();
    row.parent_name = opts.parent_name.clone();
    row.agent_id = opts.agent_id.clone();
    row.directory = opts.directory.clone().unwrap_or_default();
    row.background = opts.background;
    row.pid = opts.pid;
    row.last_event_id = cursor;
    row.launch_context = opts.launch_context.clone();

    store.with_registry(|registry| {
        registry.save_instance(row);
        if let Some(session_id) = &opts.session_id {
            registry.rebind_session(session_id.clone(), name.clone());
        }
    });

    let by = opts.by.unwrap_or_else(|| "launcher".to_string());
    let mut life = LifeData::new(LifeAction::Created, by);
    life.batch_id = batch_id_of(&opts.launch_context);
    store.append_event(&name, EventData::Life(life), None)?;

    info!(%name, cursor, "instance created");
    Ok(name)
}

fn batch_id_of(launch_context: &Option<Value>) -> Option<String> {
    launch_context
        .as_ref()
        .and_then(|v| v.get("batch_id"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Options for `start`.
#[derive(Debug, Default, Clone)]
pub struct StartOpts {
    /// `start --as <name>`: reclaim an existing name for this session
    pub as_name: Option<String>,
    /// `start --name <name>`: explicit name for a fresh instance
    pub name: Option<String>,
    pub tool: Tool,
    pub tag: Option<String>,
    pub session_id: Option<SessionId>,
    pub process_id: Option<ProcessId>,
    pub directory: Option<std::path::PathBuf>,
}

/// Outcome of `start`.
#[derive(Debug, Clone, PartialEq)]
pub struct StartOutcome {
    pub name: String,
    pub created: bool,
    pub reclaimed: bool,
}

/// Start (or re-start) participation for the current context.
///
/// Idempotent: a session already bound to an instance returns that
/// instance with its cursor untouched. `--as` reclaims a name: the
/// reclaiming session takes over the row, preserving its cursor so the
/// instance continues from where it left off.
pub fn start(store: &mut Store, now: DateTime<Utc>, opts: StartOpts) -> Result<StartOutcome, EngineError> {
    if let Some(as_name) = &opts.as_name {
        return reclaim(store, now, as_name, &opts);
    }

    // Existing binding: idempotent return
    let bound = opts
        .process_id
        .as_ref()
        .and_then(|pid| store.registry().process_binding(pid))
        .map(|b| b.instance_name.clone())
        .or_else(|| {
            opts.session_id
                .as_ref()
                .and_then(|sid| store.registry().get_session_binding(sid))
                .map(str::to_string)
        })
        .filter(|name| store.registry().get_instance(name).is_some());

    if let Some(name) = bound {
        mark_started(store, &name, now)?;
        return Ok(StartOutcome {
            name,
            created: false,
            reclaimed: false,
        });
    }

    let name = create_instance(
        store,
        now,
        CreateOpts {
            name: opts.name.clone(),
            tool: opts.tool,
            tag: opts.tag.clone(),
            session_id: opts.session_id.clone(),
            directory: opts.directory.clone(),
            by: Some("start".to_string()),
            ..Default::default()
        },
    )?;

    if let Some(process_id) = &opts.process_id {
        store.with_registry(|registry| {
            registry.set_process_binding(process_id.clone(), opts.session_id.clone(), name.clone());
        });
    }

    mark_started(store, &name, now)?;
    Ok(StartOutcome {
        name,
        created: true,
        reclaimed: false,
    })
}

fn mark_started(store: &mut Store, name: &str, now: DateTime<Utc>) -> Result<(), EngineError> {
    let was_new = store
        .registry()
        .get_instance(name)
        .is_some_and(|row| row.status_context == "new");
    let _ = bus::set_status(store, name, InstanceStatus::Active, "start", None, None, now)?;
    store.append_event(
        name,
        EventData::Life(LifeData::new(LifeAction::Started, name)),
        None,
    )?;
    if was_new {
        emit_ready(store, name)?;
    }
    Ok(())
}

/// `start --as <name>`: take over an existing name.
fn reclaim(
    store: &mut Store,
    now: DateTime<Utc>,
    as_name: &str,
    opts: &StartOpts,
) -> Result<StartOutcome, EngineError> {
    // Drop any placeholder the launcher bound to this process
    if let Some(process_id) = &opts.process_id {
        let previous = store
            .registry()
            .process_binding(process_id)
            .map(|b| b.instance_name.clone());
        if let Some(previous) = previous.filter(|p| p != as_name) {
            let placeholder = store
                .registry()
                .get_instance(&previous)
                .is_some_and(|row| row.is_placeholder());
            if placeholder {
                store.with_registry(|registry| {
                    registry.migrate_notify_endpoints(&previous, as_name);
                    registry.delete_instance(&previous);
                });
            }
        }
    }

    // Preserve the cursor of the reclaimed row so the new session
    // continues from where the name left off
    let previous_row = store.registry().get_instance(as_name).cloned();
    let preserved_cursor = previous_row.as_ref().map(|row| row.last_event_id);

    store.with_registry(|registry| {
        if registry.get_instance(as_name).is_some() {
            registry.delete_instance(as_name);
        }
        registry.delete_process_bindings_for_instance(as_name);
    });

    let name = create_instance(
        store,
        now,
        CreateOpts {
            name: Some(as_name.to_string()),
            tool: opts.tool,
            tag: opts
                .tag
                .clone()
                .or_else(|| previous_row.and_then(|r| r.tag)),
            session_id: opts.session_id.clone(),
            directory: opts.directory.clone(),
            by: Some("start --as".to_string()),
            ..Default::default()
        },
    )?;

    if let Some(cursor) = preserved_cursor {
        store.with_registry(|registry| {
            registry.update_instance(&name, |row| row.last_event_id = cursor);
        });
    }
    if let Some(process_id) = &opts.process_id {
        store.with_registry(|registry| {
            registry.set_process_binding(process_id.clone(), opts.session_id.clone(), name.clone());
        });
    }
    if let Some(session_id) = &opts.session_id {
        store.with_registry(|registry| {
            registry.rebind_session(session_id.clone(), name.clone());
            registry.clear_session_id_from_other_instances(session_id, &name);
        });
        store.with_registry(|registry| {
            registry.update_instance(&name, |row| row.session_id = Some(session_id.clone()));
        });
    }

    mark_started(store, &name, now)?;
    info!(%name, "name reclaimed");
    Ok(StartOutcome {
        name,
        created: true,
        reclaimed: true,
    })
}

/// Stop an instance: terminate headless processes, cascade to subagents
/// (deepest first), snapshot each row into its final `life/stopped`
/// event, release bindings and endpoints, delete the rows.
///
/// Wakes are sent after each delete so listeners wake up and observe the
/// row is gone. Remote (synced) instances are never stopped locally.
pub async fn stop(
    store: &SharedStore,
    notify: &NotifyBus,
    name: &str,
    by: &str,
    reason: Option<String>,
) -> Result<Vec<String>, EngineError> {
    // Build the cascade up front: the target last, its transitive
    // subagents before it, leaves first.
    let cascade: Vec<(String, Option<String>)> = {
        let guard = store.lock();
        let row = guard
            .registry()
            .find_instance(name)
            .ok_or_else(|| EngineError::IdentityMissing(name.to_string()))?;
        if row.is_remote() {
            return Err(EngineError::invalid(format!(
                "{name} is synced from another device"
            )));
        }

        let base = row.name.clone();
        let mut ordered = vec![(base.clone(), reason.clone())];
        let mut frontier = vec![base];
        while let Some(parent) = frontier.pop() {
            for child in guard.registry().instances.values() {
                if child.parent_name.as_deref() == Some(parent.as_str()) {
                    ordered.push((child.name.clone(), Some("parent_stopped".to_string())));
                    frontier.push(child.name.clone());
                }
            }
        }
        ordered.reverse();
        ordered
    };

    let mut stopped = Vec::new();
    for (target, target_reason) in cascade {
        if stop_one(store, notify, &target, by, target_reason).await? {
            stopped.push(target);
        }
    }
    Ok(stopped)
}

/// Stop a single row. Returns false when the row was already gone
/// (double-stop race), which is not an error.
async fn stop_one(
    store: &SharedStore,
    notify: &NotifyBus,
    name: &str,
    by: &str,
    reason: Option<String>,
) -> Result<bool, EngineError> {
    let ports = {
        let mut guard = store.lock();
        let Some(row) = guard.registry().get_instance(name).cloned() else {
            return Ok(false);
        };

        if row.background {
            terminate_process(row.pid);
        }

        let ports = guard.registry().list_notify_ports(name);
        let snapshot = row.snapshot();

        guard.with_registry(|registry| {
            registry.delete_process_bindings_for_instance(name);
            registry.delete_notify_endpoint(name, None, None);
        });

        let mut life = LifeData::new(LifeAction::Stopped, by);
        life.reason = reason;
        life.snapshot = Some(snapshot);
        guard.append_event(name, EventData::Life(life), None)?;

        guard.with_registry(|registry| {
            registry.delete_instance(name);
        });
        guard.flush()?;
        ports
    };

    notify.wake_ports(&ports).await;
    info!(name, by, "instance stopped");
    Ok(true)
}

/// SIGTERM the process group, then SIGKILL after a grace period.
fn terminate_process(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid else { return };
    let pgid = Pid::from_raw(pid as i32);
    if killpg(pgid, Signal::SIGTERM).is_err() {
        return;
    }
    // Escalate in the background; best-effort
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
        let _ = killpg(pgid, Signal::SIGKILL);
    });
}

/// Emit `life/ready` for an instance's first transition out of
/// `context="new"`.
pub fn emit_ready(store: &mut Store, name: &str) -> Result<(), EngineError> {
    let batch_id = store
        .registry()
        .get_instance(name)
        .and_then(|row| batch_id_of(&row.launch_context));
    let mut life = LifeData::new(LifeAction::Ready, name);
    life.batch_id = batch_id;
    store.append_event(name, EventData::Life(life), None)?;
    Ok(())
}

/// After an instance became ready, check whether its whole batch is now
/// ready and announce it to the launcher with a one-shot system message.
pub async fn batch_ready_check<C: hcom_core::Clock>(
    runtime: &crate::runtime::Runtime<C>,
    name: &str,
) -> Result<(), EngineError> {
    let announce = {
        let guard = runtime.store().lock();
        let Some(row) = guard.registry().get_instance(name) else {
            return Ok(());
        };
        let Some(batch_id) = batch_id_of(&row.launch_context) else {
            return Ok(());
        };

        let events = guard.events_after(0, usize::MAX)?;
        let mut launched: Option<(u32, String)> = None;
        let mut ready: Vec<String> = Vec::new();
        let mut already_announced = false;

        for event in &events {
            let EventData::Life(life) = &event.data else {
                continue;
            };
            if life.batch_id.as_deref() != Some(batch_id.as_str()) {
                continue;
            }
            match life.action {
                LifeAction::BatchLaunched => {
                    launched = life.launched.map(|n| (n, life.by.clone()));
                }
                LifeAction::Ready => {
                    if !ready.contains(&event.instance) {
                        ready.push(event.instance.clone());
                    }
                }
                _ => {}
            }
        }

        // One announcement per batch
        if guard
            .registry()
            .kv_get(&format!("batch_announced:{batch_id}"))
            .is_some()
        {
            already_announced = true;
        }

        match launched {
            Some((count, launcher))
                if !already_announced && ready.len() as u32 >= count =>
            {
                Some((batch_id, launcher, count, ready))
            }
            _ => None,
        }
    };

    let Some((batch_id, launcher, count, ready)) = announce else {
        return Ok(());
    };

    {
        let mut guard = runtime.store().lock();
        guard.with_registry(|registry| {
            registry.kv_set(&format!("batch_announced:{batch_id}"), Some("1".to_string()));
        });
    }

    let text = format!(
        "[hcom-launcher] → {launcher}: All {count} instances ready: {} (batch: {batch_id})",
        ready.join(", ")
    );
    let target = format!("@{launcher}");
    runtime
        .send(SYSTEM_SENDER, &text, &[target], Intent::Inform, None, None)
        .await?;
    Ok(())
}

/// Promote listening instances whose heartbeat went stale to
/// `inactive/stale:listening`.
pub fn promote_stale_listening(
    store: &mut Store,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<(), EngineError> {
    let stale: Vec<String> = store
        .registry()
        .instances
        .values()
        .filter(|row| row.status == InstanceStatus::Listening)
        .filter(|row| {
            let threshold = if store.registry().list_notify_ports(&row.name).is_empty() {
                config.stale_listen_adhoc_secs
            } else {
                config.stale_listen_tcp_secs
            };
            heartbeat_age_secs(row, now) > threshold as i64
        })
        .map(|row| row.name.clone())
        .collect();

    for name in stale {
        warn!(%name, "listening heartbeat stale, promoting to inactive");
        let _ = bus::set_status(
            store,
            &name,
            InstanceStatus::Inactive,
            "stale:listening",
            None,
            None,
            now,
        )?;
    }
    Ok(())
}

fn heartbeat_age_secs(row: &Instance, now: DateTime<Utc>) -> i64 {
    let last = row.last_stop.unwrap_or(row.status_time);
    (now - last).num_seconds()
}

/// Opportunistic cleanup: delete at most ONE stale or long-inactive
/// instance per call (one-per-call avoids long locks). Returns the name
/// deleted, if any.
pub fn cleanup_one_stale(
    store: &mut Store,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<Option<String>, EngineError> {
    let candidate = store
        .registry()
        .instances
        .values()
        .filter(|row| !row.is_remote())
        .find(|row| {
            let age = (now - row.status_time).num_seconds();
            if row.status != InstanceStatus::Inactive {
                return false;
            }
            if row.status_context.starts_with("exit:") {
                return age > config.stale_exit_secs as i64;
            }
            if row.status_context == "stale:listening" {
                return age > config.stale_listening_secs as i64;
            }
            // Placeholders waiting to be claimed are spared the short
            // windows but fall under the long one
            age > config.stale_inactive_secs as i64
        })
        .map(|row| row.name.clone());

    let Some(name) = candidate else {
        return Ok(None);
    };

    let snapshot = store
        .registry()
        .get_instance(&name)
        .map(|row| row.snapshot());
    let mut life = LifeData::new(LifeAction::Stopped, SYSTEM_SENDER);
    life.reason = Some("stale".to_string());
    life.snapshot = snapshot;
    store.append_event(&name, EventData::Life(life), None)?;
    store.with_registry(|registry| {
        registry.delete_process_bindings_for_instance(&name);
        registry.delete_notify_endpoint(&name, None, None);
        registry.delete_instance(&name);
    });
    info!(%name, "stale instance cleaned up");
    Ok(Some(name))
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;

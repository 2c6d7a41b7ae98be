//! Test helpers for behavioral specifications.
//!
//! Provides a high-level DSL over the engine runtime with a real store in
//! a temp directory.

#![allow(dead_code)]

use hcom_core::test_support::live_instance;
use hcom_core::{Config, Event, Intent, SystemClock, Tool};
use hcom_engine::runtime::{shared_store, Runtime};
use std::time::Duration;

/// A spec world: one store, one runtime, temp-dir backed.
pub struct World {
    _dir: tempfile::TempDir,
    pub runtime: Runtime<SystemClock>,
}

impl World {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = shared_store(dir.path()).unwrap();
        let runtime = Runtime::with_clock(store, Config::default(), SystemClock);
        Self { _dir: dir, runtime }
    }

    /// Register live instances by name, optionally tagged (`"api-luna"`
    /// creates base `luna` with tag `api` — single-dash names only).
    pub fn with_instances(names: &[(&str, Option<&str>)]) -> Self {
        let world = Self::new();
        {
            let mut guard = world.runtime.store().lock();
            guard.with_registry(|registry| {
                for (name, tag) in names {
                    let mut row = live_instance(name, Tool::Claude);
                    row.tag = tag.map(str::to_string);
                    registry.save_instance(row);
                }
            });
        }
        world
    }

    pub async fn send(&self, from: &str, targets: &[&str], text: &str) -> Event {
        let tokens: Vec<String> = targets.iter().map(|s| s.to_string()).collect();
        self.runtime
            .send(from, text, &tokens, Intent::Inform, None, None)
            .await
            .unwrap()
            .event
    }

    pub async fn listen(&self, name: &str, timeout: Duration) -> hcom_engine::ListenOutcome {
        hcom_engine::listen(
            &self.runtime,
            name,
            timeout,
            None,
            hcom_storage::NotifyKind::Hook,
        )
        .await
        .unwrap()
    }

    pub fn cursor_of(&self, name: &str) -> i64 {
        let guard = self.runtime.store().lock();
        guard
            .registry()
            .get_instance(name)
            .map(|row| row.last_event_id)
            .unwrap_or(-1)
    }

    pub fn delivered_to(&self, event: &Event) -> Vec<String> {
        match &event.data {
            hcom_core::EventData::Message(m) => m.delivered_to.clone(),
            _ => Vec::new(),
        }
    }

    pub fn row_exists(&self, name: &str) -> bool {
        let guard = self.runtime.store().lock();
        guard.registry().get_instance(name).is_some()
    }
}

/// Short timeout for "should be there already" drains.
pub const QUICK: Duration = Duration::from_secs(2);

/// Short timeout for "should time out" listens.
pub const BRIEF: Duration = Duration::from_millis(120);

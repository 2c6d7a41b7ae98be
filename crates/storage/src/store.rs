// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store facade: the event log and the registry behind one API.
//!
//! One `Store` per store directory, owned by a single writer process (the
//! daemon). Registry mutations mark the store dirty; `flush()` is the
//! single durability point for both the log's group commit and the
//! registry snapshot.

use crate::log::{EventLog, LogError};
use crate::registry::Registry;
use crate::snapshot::{RegistrySnapshot, SnapshotError};
use chrono::{DateTime, Utc};
use hcom_core::{Event, EventData};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

const EVENTS_FILE: &str = "events.jsonl";
const REGISTRY_FILE: &str = "registry.json";
const ARCHIVE_DIR: &str = "archive";

/// Errors from store operations.
///
/// Storage failure is fatal to the individual call; callers must not
/// swallow these.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("event log error: {0}")]
    Log(#[from] LogError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The persistent event store and instance registry.
pub struct Store {
    dir: PathBuf,
    log: EventLog,
    registry: Registry,
    registry_dirty: bool,
}

impl Store {
    /// Open or create the store under `dir`.
    ///
    /// Cursors beyond the log's maximum id (stale state from an external
    /// reset) are clamped on load.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;
        let log = EventLog::open(&dir.join(EVENTS_FILE))?;
        let registry = match RegistrySnapshot::load(&dir.join(REGISTRY_FILE))? {
            Some(snapshot) => snapshot.registry,
            None => Registry::default(),
        };

        let mut store = Self {
            dir: dir.to_owned(),
            log,
            registry,
            registry_dirty: false,
        };
        store.clamp_cursors();
        Ok(store)
    }

    fn clamp_cursors(&mut self) {
        let max = self.log.last_event_id();
        for row in self.registry.instances.values_mut() {
            if row.last_event_id > max {
                warn!(
                    instance = %row.name,
                    cursor = row.last_event_id,
                    max,
                    "cursor beyond log maximum, clamping",
                );
                row.last_event_id = max;
                self.registry_dirty = true;
            }
        }
    }

    /// Append an event, assigning the next id.
    ///
    /// `ts` overrides the timestamp for retrodated transcript-derived
    /// events; the id is still fresh.
    pub fn append_event(
        &mut self,
        instance: &str,
        data: EventData,
        ts: Option<DateTime<Utc>>,
    ) -> Result<Event, StoreError> {
        Ok(self.log.append(instance, data, ts)?)
    }

    pub fn last_event_id(&self) -> i64 {
        self.log.last_event_id()
    }

    /// Events with `id > after`, oldest first, up to `limit`.
    pub fn events_after(&self, after: i64, limit: usize) -> Result<Vec<Event>, StoreError> {
        Ok(self.log.events_after(after, limit)?)
    }

    /// Events with `id > after` matching a predicate closure.
    pub fn events_after_matching<F>(
        &self,
        after: i64,
        limit: usize,
        keep: F,
    ) -> Result<Vec<Event>, StoreError>
    where
        F: FnMut(&Event) -> bool,
    {
        Ok(self.log.events_after_matching(after, limit, keep)?)
    }

    /// The most recent `count` events.
    pub fn tail_events(&self, count: usize) -> Result<Vec<Event>, StoreError> {
        Ok(self.log.tail(count)?)
    }

    /// Read-only registry access.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutate the registry, marking it for the next flush.
    pub fn with_registry<T>(&mut self, mutate: impl FnOnce(&mut Registry) -> T) -> T {
        let result = mutate(&mut self.registry);
        self.registry_dirty = true;
        result
    }

    /// Whether either half has unflushed changes.
    pub fn needs_flush(&self) -> bool {
        self.log.needs_flush() || self.registry_dirty
    }

    /// Flush the log (single fsync group commit) and the registry snapshot.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        self.log.flush()?;
        if self.registry_dirty {
            RegistrySnapshot::new(self.log.last_event_id(), self.registry.clone())
                .save(&self.dir.join(REGISTRY_FILE))?;
            self.registry_dirty = false;
        }
        Ok(())
    }

    /// Archive the current store files under `archive/<timestamp>/` and
    /// start a fresh, empty store. Event ids restart; the archived
    /// generation keeps its own id space.
    ///
    /// The event log is zstd-compressed in the archive; the registry is
    /// copied as-is.
    pub fn reset(&mut self) -> Result<PathBuf, StoreError> {
        self.flush()?;

        let stamp = Utc::now().format("%Y%m%d-%H%M%S").to_string();
        let archive_dir = self.dir.join(ARCHIVE_DIR).join(&stamp);
        std::fs::create_dir_all(&archive_dir)?;

        let events_path = self.dir.join(EVENTS_FILE);
        if events_path.exists() {
            let input = std::fs::File::open(&events_path)?;
            let output = std::fs::File::create(archive_dir.join("events.jsonl.zst"))?;
            zstd::stream::copy_encode(input, output, 3)?;
            std::fs::remove_file(&events_path)?;
        }

        let registry_path = self.dir.join(REGISTRY_FILE);
        if registry_path.exists() {
            std::fs::copy(&registry_path, archive_dir.join(REGISTRY_FILE))?;
            std::fs::remove_file(&registry_path)?;
        }

        info!(archive = %archive_dir.display(), "store reset, previous generation archived");

        self.log = EventLog::open(&events_path)?;
        self.registry = Registry::default();
        self.registry_dirty = false;
        Ok(archive_dir)
    }

    /// Store directory path.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

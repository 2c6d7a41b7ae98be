// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-process runtime handle.
//!
//! Owns the store, config, clock and notify bus; constructed once in main
//! and threaded through explicitly. There are no global singletons.

use crate::bus::{self, SendOutcome};
use crate::error::EngineError;
use crate::notify::NotifyBus;
use chrono::{DateTime, Utc};
use hcom_core::{Clock, Config, Event, InstanceStatus, Intent, SystemClock};
use hcom_storage::Store;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

/// The store behind its single-process lock.
pub type SharedStore = Arc<Mutex<Store>>;

/// Open a store and wrap it for sharing.
pub fn shared_store(dir: &Path) -> Result<SharedStore, EngineError> {
    Ok(Arc::new(Mutex::new(Store::open(dir)?)))
}

/// Runtime facade the daemon dispatch calls into.
#[derive(Clone)]
pub struct Runtime<C: Clock = SystemClock> {
    store: SharedStore,
    config: Config,
    notify: NotifyBus,
    clock: C,
}

impl Runtime<SystemClock> {
    pub fn open(dir: &Path, config: Config) -> Result<Self, EngineError> {
        Ok(Self {
            store: shared_store(dir)?,
            config,
            notify: NotifyBus,
            clock: SystemClock,
        })
    }
}

impl<C: Clock> Runtime<C> {
    pub fn with_clock(store: SharedStore, config: Config, clock: C) -> Self {
        Self {
            store,
            config,
            notify: NotifyBus,
            clock,
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn notify(&self) -> &NotifyBus {
        &self.notify
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now_utc()
    }

    /// Send a message (see [`bus::send`]), then run the subscription
    /// matcher over the new event.
    pub async fn send(
        &self,
        from: &str,
        text: &str,
        targets: &[String],
        intent: Intent,
        reply_to: Option<i64>,
        thread: Option<String>,
    ) -> Result<SendOutcome, EngineError> {
        let outcome = bus::send(
            &self.store,
            &self.notify,
            &self.config,
            from,
            text,
            targets,
            intent,
            reply_to,
            thread,
        )
        .await?;
        crate::subscriptions::match_event(self, &outcome.event).await?;
        Ok(outcome)
    }

    /// Set status and flush; used by hooks where the status change is the
    /// whole request.
    pub async fn set_status(
        &self,
        name: &str,
        status: InstanceStatus,
        context: &str,
        detail: Option<String>,
    ) -> Result<(), EngineError> {
        let event = {
            let mut store = self.store.lock();
            let event =
                bus::set_status(&mut store, name, status, context, detail, None, self.now())?;
            store.flush()?;
            event
        };
        // Status events feed subscriptions too
        if let Some(event) = event {
            crate::subscriptions::match_event(self, &event).await?;
        }
        Ok(())
    }

    /// Unread messages for a named instance.
    pub fn unread(&self, name: &str, limit: usize) -> Result<Vec<Event>, EngineError> {
        let store = self.store.lock();
        let row = store
            .registry()
            .find_instance(name)
            .cloned()
            .ok_or_else(|| EngineError::IdentityMissing(name.to_string()))?;
        bus::unread(&store, &row, limit)
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;

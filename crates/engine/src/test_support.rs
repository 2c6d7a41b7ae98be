// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake delivery dependencies for engine tests and downstream crates.

use crate::push::{DeliveryStore, Injector, Notifier, PtyScreen};
use async_trait::async_trait;
use hcom_core::InstanceStatus;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Screen whose predicates are plain flags.
#[derive(Clone, Default)]
pub struct FakePty {
    inner: Arc<Mutex<FakePtyState>>,
}

#[derive(Default)]
struct FakePtyState {
    waiting_approval: bool,
    user_active: bool,
    not_ready: bool,
    prompt_has_text: bool,
    output_unstable: bool,
}

impl FakePty {
    pub fn set_waiting_approval(&self, value: bool) {
        self.inner.lock().waiting_approval = value;
    }

    pub fn set_user_active(&self, value: bool) {
        self.inner.lock().user_active = value;
    }

    pub fn set_ready(&self, value: bool) {
        self.inner.lock().not_ready = !value;
    }

    pub fn set_prompt_empty(&self, value: bool) {
        self.inner.lock().prompt_has_text = !value;
    }

    pub fn set_output_stable(&self, value: bool) {
        self.inner.lock().output_unstable = !value;
    }
}

impl PtyScreen for FakePty {
    fn is_waiting_approval(&self) -> bool {
        self.inner.lock().waiting_approval
    }

    fn is_user_active(&self) -> bool {
        self.inner.lock().user_active
    }

    fn is_ready(&self) -> bool {
        !self.inner.lock().not_ready
    }

    fn is_prompt_empty(&self) -> bool {
        !self.inner.lock().prompt_has_text
    }

    fn is_output_stable(&self, _window: Duration) -> bool {
        !self.inner.lock().output_unstable
    }
}

/// In-memory cursor/status store for loop tests.
#[derive(Clone, Default)]
pub struct FakeDelivery {
    inner: Arc<Mutex<FakeDeliveryState>>,
}

struct FakeDeliveryState {
    cursor: i64,
    pending: usize,
    idle: bool,
    status: InstanceStatus,
    context: String,
    bound: bool,
    status_log: Vec<(InstanceStatus, String)>,
}

impl Default for FakeDeliveryState {
    fn default() -> Self {
        Self {
            cursor: 0,
            pending: 0,
            idle: true,
            status: InstanceStatus::Listening,
            context: "ready".to_string(),
            bound: true,
            status_log: Vec::new(),
        }
    }
}

impl FakeDelivery {
    pub fn set_pending(&self, count: usize) {
        self.inner.lock().pending = count;
    }

    pub fn set_idle(&self, idle: bool) {
        self.inner.lock().idle = idle;
    }

    pub fn set_bound(&self, bound: bool) {
        self.inner.lock().bound = bound;
    }

    pub fn force_status(&self, status: InstanceStatus, context: &str) {
        let mut inner = self.inner.lock();
        inner.status = status;
        inner.context = context.to_string();
    }

    /// Simulate the hook side: drain one pending message, advance cursor.
    pub fn confirm_delivery(&self) {
        let mut inner = self.inner.lock();
        inner.cursor += 1;
        inner.pending = inner.pending.saturating_sub(1);
    }

    pub fn cursor(&self) -> i64 {
        self.inner.lock().cursor
    }

    pub fn status_log(&self) -> Vec<(InstanceStatus, String)> {
        self.inner.lock().status_log.clone()
    }

    pub fn context(&self) -> String {
        self.inner.lock().context.clone()
    }
}

impl DeliveryStore for FakeDelivery {
    fn get_cursor(&self) -> i64 {
        self.inner.lock().cursor
    }

    fn has_pending(&self) -> bool {
        self.inner.lock().pending > 0
    }

    fn is_idle(&self) -> bool {
        self.inner.lock().idle
    }

    fn status(&self) -> Option<(InstanceStatus, String)> {
        let inner = self.inner.lock();
        Some((inner.status, inner.context.clone()))
    }

    fn set_status(&mut self, status: InstanceStatus, context: &str, _detail: &str) {
        let mut inner = self.inner.lock();
        inner.status = status;
        inner.context = context.to_string();
        inner.status_log.push((status, context.to_string()));
    }

    fn set_gate_status(&mut self, context: &str, _detail: &str) {
        self.inner.lock().context = context.to_string();
    }

    fn refresh_binding(&mut self) -> bool {
        self.inner.lock().bound
    }
}

/// Injector that records calls; optionally auto-confirms via the store.
#[derive(Clone)]
pub struct FakeInjector {
    inner: Arc<Mutex<FakeInjectorState>>,
    auto_confirm: Option<FakeDelivery>,
}

#[derive(Default)]
struct FakeInjectorState {
    triggers: usize,
    enters: usize,
    fail: bool,
}

impl FakeInjector {
    /// Records injections without confirming; the test drives the cursor.
    pub fn manual() -> Self {
        Self {
            inner: Arc::default(),
            auto_confirm: None,
        }
    }

    /// Every trigger injection is immediately consumed by the "hook".
    pub fn auto(store: FakeDelivery) -> Self {
        Self {
            inner: Arc::default(),
            auto_confirm: Some(store),
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.inner.lock().fail = fail;
    }

    pub fn triggers(&self) -> usize {
        self.inner.lock().triggers
    }

    pub fn enters(&self) -> usize {
        self.inner.lock().enters
    }
}

impl Injector for FakeInjector {
    fn inject_trigger(&mut self) -> bool {
        let mut inner = self.inner.lock();
        if inner.fail {
            return false;
        }
        inner.triggers += 1;
        drop(inner);
        if let Some(store) = &self.auto_confirm {
            store.confirm_delivery();
        }
        true
    }

    fn inject_enter(&mut self) -> bool {
        let mut inner = self.inner.lock();
        if inner.fail {
            return false;
        }
        inner.enters += 1;
        true
    }
}

/// Notifier that never signals but keeps waits short so tests run fast.
pub struct QuietNotifier {
    pub cap: Duration,
}

impl Default for QuietNotifier {
    fn default() -> Self {
        Self {
            cap: Duration::from_millis(5),
        }
    }
}

#[async_trait]
impl Notifier for QuietNotifier {
    async fn wait(&mut self, timeout: Duration) -> bool {
        tokio::time::sleep(timeout.min(self.cap)).await;
        false
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hcom-engine: messaging and delivery core.
//!
//! The engines operate on a shared [`hcom_storage::Store`] behind a mutex.
//! Discipline: the lock is held for store calls only, never across an
//! await point.

pub mod bus;
pub mod device;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod notify;
pub mod pull;
pub mod push;
pub mod runtime;
pub mod subscriptions;

pub use bus::{advance_cursor, set_gate_status, set_status, unread, SendOutcome, SYSTEM_SENDER};
pub use device::{add_device_suffix, device_short_id, device_uuid};
pub use error::EngineError;
pub use notify::{NotifyBus, NotifyWaiter};
pub use pull::{listen, wait_events, ListenOutcome};
pub use push::{
    run_push_loop, DeliveryGate, DeliveryStore, GateResult, Injector, Notifier, PtyScreen,
    PushDeps, PushHandle, TwoPhaseRetryPolicy,
};
pub use runtime::{Runtime, SharedStore};

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

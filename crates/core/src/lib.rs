// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hcom-core: Core library for the hcom inter-agent messaging fabric

pub mod address;
pub mod clock;
pub mod config;
pub mod event;
pub mod hook;
pub mod id;
pub mod instance;
pub mod names;
pub mod time_fmt;

pub use address::{
    parse_targets, resolve_targets, AddressError, LiveName, ParsedTarget, Resolution,
};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{Config, ConfigError, ConfigKey};
pub use event::{
    Event, EventData, EventKind, Intent, LifeAction, LifeData, MessageData, Scope, SenderKind,
    StatusData,
};
pub use hook::HookResult;
pub use id::{ProcessId, SessionId};
pub use instance::{Instance, InstanceStatus, Tool};
pub use names::{hash_to_name, is_pool_shape, NameAllocator, NameError};
pub use time_fmt::{format_age, format_elapsed};

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

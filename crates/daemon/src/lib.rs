// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! hcom daemon library
//!
//! This module exposes the socket protocol types for use by CLI clients.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod protocol;

pub use protocol::{
    read_request, read_response, write_response, ProtocolError, Request, RequestKind, Response,
    DEFAULT_TIMEOUT, MAX_REQUEST_SIZE, PROTOCOL_VERSION,
};

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Codex CLI notify hook payloads (JSON in `argv[2]`).
//!
//! Codex has a single hook; its thread-id doubles as the session id so
//! identity resolution works unchanged.

use super::claude::string_field;
use super::{HookPayload, PayloadError};
use hcom_core::SessionId;
use serde_json::Value;
use std::path::PathBuf;

pub(super) fn parse(value: &Value) -> Result<HookPayload, PayloadError> {
    Ok(HookPayload {
        session_id: string_field(value, "thread-id").map(SessionId::new),
        transcript_path: string_field(value, "transcript_path")
            .or_else(|| string_field(value, "session_path"))
            .map(PathBuf::from),
        event_type: string_field(value, "type"),
        last_assistant_message: string_field(value, "last-assistant-message"),
        cwd: string_field(value, "cwd").map(PathBuf::from),
        raw: value.clone(),
        ..Default::default()
    })
}

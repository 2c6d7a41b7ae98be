// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Claude Code hook payloads (JSON on stdin).

use super::{HookPayload, PayloadError};
use hcom_core::SessionId;
use serde_json::Value;
use std::path::PathBuf;

pub(super) fn parse(value: &Value) -> Result<HookPayload, PayloadError> {
    // Tool result can be a string or a dict with stdout/stderr
    let tool_result = match value.get("tool_response") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Object(map)) => Some(
            map.get("stdout")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        ),
        _ => None,
    };

    Ok(HookPayload {
        session_id: string_field(value, "session_id")
            .or_else(|| string_field(value, "sessionId"))
            .map(SessionId::new),
        transcript_path: string_field(value, "transcript_path").map(PathBuf::from),
        tool_name: string_field(value, "tool_name"),
        tool_input: value.get("tool_input").cloned(),
        tool_result,
        agent_id: string_field(value, "agent_id"),
        agent_type: string_field(value, "agent_type"),
        cwd: string_field(value, "cwd").map(PathBuf::from),
        raw: value.clone(),
        ..Default::default()
    })
}

pub(super) fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

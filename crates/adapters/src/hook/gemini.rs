// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gemini CLI hook payloads (JSON on stdin, alternative key names).

use super::claude::string_field;
use super::{HookPayload, PayloadError};
use hcom_core::SessionId;
use serde_json::Value;
use std::path::PathBuf;

pub(super) fn parse(value: &Value) -> Result<HookPayload, PayloadError> {
    // Tool response shape varies: {"llmContent": ...}, {"output": ...},
    // {"response": {"output": ...}}, or a bare string
    let tool_result = match value.get("tool_response") {
        Some(Value::Object(map)) => {
            let text = map
                .get("llmContent")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .or_else(|| map.get("output").and_then(Value::as_str).filter(|s| !s.is_empty()))
                .or_else(|| {
                    map.get("response")
                        .and_then(|r| r.get("output"))
                        .and_then(Value::as_str)
                });
            text.map(str::to_string)
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) if !other.is_null() => Some(other.to_string()),
        _ => None,
    };

    Ok(HookPayload {
        session_id: string_field(value, "session_id")
            .or_else(|| string_field(value, "sessionId"))
            .map(SessionId::new),
        transcript_path: string_field(value, "transcript_path")
            .or_else(|| string_field(value, "session_path"))
            .map(PathBuf::from),
        tool_name: string_field(value, "tool_name").or_else(|| string_field(value, "toolName")),
        tool_input: value
            .get("tool_input")
            .or_else(|| value.get("toolInput"))
            .cloned(),
        tool_result,
        notification_type: string_field(value, "notification_type"),
        cwd: string_field(value, "cwd").map(PathBuf::from),
        raw: value.clone(),
        ..Default::default()
    })
}

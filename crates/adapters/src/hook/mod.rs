// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Normalized hook input for Claude/Gemini/Codex plus the routing table.
//!
//! The tools disagree on everything surface-level: Claude sends JSON on
//! stdin, Gemini sends JSON with alternative key names, Codex passes a
//! JSON payload in `argv[2]`. Everything downstream of [`parse_payload`]
//! sees one shape.

mod claude;
mod codex;
mod dispatch;
mod gemini;

pub use dispatch::{dispatch, route, Route};

use hcom_core::{SessionId, Tool};
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from payload parsing
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("invalid hook JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown hook type '{0}'")]
    UnknownHookType(String),
    #[error("missing payload")]
    Missing,
}

/// Hook types routed by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    SessionStart,
    UserPromptSubmit,
    PreToolUse,
    PostToolUse,
    Notification,
    Stop,
    SubagentStop,
    SessionEnd,
    /// Codex's single notify hook
    Notify,
}

impl HookKind {
    /// Parse the hook-type string carried in argv.
    pub fn parse(value: &str) -> Result<Self, PayloadError> {
        match value {
            "sessionstart" | "SessionStart" => Ok(HookKind::SessionStart),
            "prompt" | "UserPromptSubmit" => Ok(HookKind::UserPromptSubmit),
            "pre" | "PreToolUse" => Ok(HookKind::PreToolUse),
            "post" | "PostToolUse" => Ok(HookKind::PostToolUse),
            "notification" | "Notification" => Ok(HookKind::Notification),
            "stop" | "Stop" => Ok(HookKind::Stop),
            "subagent-stop" | "SubagentStop" => Ok(HookKind::SubagentStop),
            "sessionend" | "SessionEnd" => Ok(HookKind::SessionEnd),
            "notify" => Ok(HookKind::Notify),
            other => Err(PayloadError::UnknownHookType(other.to_string())),
        }
    }
}

/// Normalized hook input — the same structure for every tool, with the
/// raw payload preserved for tool-specific fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookPayload {
    pub tool: Tool,
    pub session_id: Option<SessionId>,
    pub transcript_path: Option<PathBuf>,
    pub tool_name: Option<String>,
    pub tool_input: Option<Value>,
    /// Flattened tool result text (Claude stdout, Gemini llmContent)
    pub tool_result: Option<String>,
    /// Subagent hooks
    pub agent_id: Option<String>,
    pub agent_type: Option<String>,
    pub notification_type: Option<String>,
    /// Codex event type (e.g. "agent-turn-complete")
    pub event_type: Option<String>,
    pub last_assistant_message: Option<String>,
    pub cwd: Option<PathBuf>,
    /// Original payload for tool-specific access
    pub raw: Value,
}

/// Parse a hook payload for the given tool.
///
/// `input` is the stdin JSON for Claude/Gemini and the `argv[2]` JSON for
/// Codex.
pub fn parse_payload(tool: Tool, input: &str) -> Result<HookPayload, PayloadError> {
    if input.trim().is_empty() {
        return Err(PayloadError::Missing);
    }
    let value: Value = serde_json::from_str(input)?;
    let mut payload = match tool {
        Tool::Claude => claude::parse(&value)?,
        Tool::Gemini => gemini::parse(&value)?,
        Tool::Codex => codex::parse(&value)?,
        Tool::Adhoc => HookPayload {
            raw: value.clone(),
            ..Default::default()
        },
    };
    payload.tool = tool;
    Ok(payload)
}

/// Render a delivery batch as the context block a tool receives.
pub fn format_delivery(messages: &[hcom_core::Event]) -> String {
    let mut out = String::from("New hcom messages:\n");
    for event in messages {
        if let hcom_core::EventData::Message(m) = &event.data {
            out.push_str(&format!("[{}] {}\n", m.from, m.text));
        }
    }
    out.push_str("Reply with: hcom send @<name> -- <text>");
    out
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

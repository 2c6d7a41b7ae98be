// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recognised environment variables.
//!
//! Hook and CLI requests carry the calling process's environment in the
//! daemon request; nothing here reads the daemon's own `std::env`.

use hcom_core::{ProcessId, Tool};
use std::collections::HashMap;

/// Launcher/tool environment as seen by one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookEnv {
    /// Root directory override (defaults to `~/.hcom`)
    pub hcom_dir: Option<String>,
    /// Launcher-assigned UUID binding this process to an instance
    pub process_id: Option<ProcessId>,
    pub launched: bool,
    pub pty_mode: bool,
    /// Log file path when running headless
    pub background: Option<String>,
    pub launched_by: Option<String>,
    pub launch_batch_id: Option<String>,
    pub launch_event_id: Option<i64>,
    pub tag: Option<String>,
    pub hints: Option<String>,
    pub auto_approve: bool,
    pub auto_subscribe: Option<String>,
    pub go_text: Option<String>,
    pub name_export: bool,
    pub via_shim: bool,
}

impl HookEnv {
    pub fn from_map(env: &HashMap<String, String>) -> Self {
        let get = |key: &str| env.get(key).filter(|v| !v.is_empty()).cloned();
        let flag = |key: &str| env.get(key).is_some_and(|v| v == "1");
        Self {
            hcom_dir: get("HCOM_DIR"),
            process_id: get("HCOM_PROCESS_ID").map(ProcessId::new),
            launched: flag("HCOM_LAUNCHED"),
            pty_mode: flag("HCOM_PTY_MODE"),
            background: get("HCOM_BACKGROUND"),
            launched_by: get("HCOM_LAUNCHED_BY"),
            launch_batch_id: get("HCOM_LAUNCH_BATCH_ID"),
            launch_event_id: get("HCOM_LAUNCH_EVENT_ID").and_then(|v| v.parse().ok()),
            tag: get("HCOM_TAG"),
            hints: get("HCOM_HINTS"),
            auto_approve: flag("HCOM_AUTO_APPROVE"),
            auto_subscribe: get("HCOM_AUTO_SUBSCRIBE"),
            go_text: get("HCOM_GO"),
            name_export: flag("HCOM_NAME_EXPORT"),
            via_shim: flag("HCOM_VIA_SHIM"),
        }
    }
}

/// Identify the calling tool from the markers the tools themselves set.
pub fn detect_tool(env: &HashMap<String, String>) -> Tool {
    if env.contains_key("CLAUDECODE") || env.contains_key("CLAUDE_ENV_FILE") {
        Tool::Claude
    } else if env.contains_key("GEMINI_CLI") {
        Tool::Gemini
    } else if env.keys().any(|k| k.starts_with("CODEX_SANDBOX")) {
        Tool::Codex
    } else {
        Tool::Adhoc
    }
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;

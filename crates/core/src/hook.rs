// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Standard return type from hook handlers.
//!
//! Hook handlers never touch the process streams; they return a
//! [`HookResult`] and the daemon decides where the bytes go. Exit code 2 is
//! the Stop-hook "message delivered — continue" path.

use serde_json::{json, Value};

/// Captured outcome of one hook invocation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HookResult {
    /// 0 = success, 1 = error, 2 = message delivered (Stop hook only)
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Structured hook response, when one was produced
    pub hook_output: Option<Value>,
}

impl HookResult {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            stderr: message.into(),
            ..Default::default()
        }
    }

    /// Stop hook with unread messages: exit 2 + block decision so the tool
    /// continues with the injected context.
    pub fn stop_with_messages(context: impl Into<String>) -> Self {
        let output = json!({
            "decision": "block",
            "reason": context.into(),
        });
        Self {
            exit_code: 2,
            stdout: output.to_string(),
            stderr: String::new(),
            hook_output: Some(output),
        }
    }

    /// Allow the operation and inject additional context.
    pub fn allow_with_context(hook_event: &str, context: impl Into<String>) -> Self {
        let output = json!({
            "decision": "allow",
            "hookSpecificOutput": {
                "hookEventName": hook_event,
                "additionalContext": context.into(),
            }
        });
        Self {
            exit_code: 0,
            stdout: output.to_string(),
            stderr: String::new(),
            hook_output: Some(output),
        }
    }

    /// Allow the tool call with a modified input (Task prompt injection).
    pub fn with_updated_input(hook_event: &str, updated_input: Value) -> Self {
        let output = json!({
            "hookSpecificOutput": {
                "hookEventName": hook_event,
                "updatedInput": updated_input,
            }
        });
        Self {
            exit_code: 0,
            stdout: output.to_string(),
            stderr: String::new(),
            hook_output: Some(output),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn is_error(&self) -> bool {
        self.exit_code != 0 && self.exit_code != 2
    }

    pub fn is_message_delivered(&self) -> bool {
        self.exit_code == 2
    }
}

#[cfg(test)]
#[path = "hook_tests.rs"]
mod tests;

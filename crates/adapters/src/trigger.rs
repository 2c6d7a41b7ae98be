// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-tool injection triggers and delivery-gate profiles.
//!
//! The trigger is the line the push engine types into the tool's terminal
//! when the gate opens. Claude's wrapper protocol runs `listen` from its
//! Stop hook, so a bare sentinel suffices; Gemini gets a human-readable
//! preview; Codex gets a literal instruction, since its only hook is the
//! notify hook.

use hcom_core::{Event, EventData, Tool};
use hcom_engine::DeliveryGate;
use std::time::Duration;

/// Claude's sentinel: its Stop hook drains messages when the turn ends.
const CLAUDE_TRIGGER: &str = "<hcom>";

/// Gate profile and verification window for one tool.
#[derive(Debug, Clone, Copy)]
pub struct ToolProfile {
    pub gate: DeliveryGate,
    /// Cursor-advance confirmation window
    pub verify_timeout: Duration,
    /// Idle park between wake checks
    pub idle_wait: Duration,
}

/// The delivery profile for a tool.
pub fn profile(tool: Tool) -> ToolProfile {
    match tool {
        Tool::Claude => ToolProfile {
            gate: DeliveryGate {
                require_idle: true,
                // Claude hides the shortcut hint in accept-edits mode
                require_ready_prompt: false,
                require_prompt_empty: true,
                ..Default::default()
            },
            verify_timeout: Duration::from_secs(2),
            idle_wait: Duration::from_secs(30),
        },
        Tool::Gemini => ToolProfile {
            gate: DeliveryGate {
                require_idle: true,
                ..Default::default()
            },
            verify_timeout: Duration::from_secs(2),
            idle_wait: Duration::from_secs(30),
        },
        // Codex has no turn-end hook, so idle state is unknowable from
        // the DB; the screen checks carry the gate alone, and the agent
        // takes longer to act on the instruction.
        Tool::Codex => ToolProfile {
            gate: DeliveryGate::default(),
            verify_timeout: Duration::from_secs(10),
            idle_wait: Duration::from_secs(30),
        },
        Tool::Adhoc => ToolProfile {
            gate: DeliveryGate::default(),
            verify_timeout: Duration::from_secs(2),
            idle_wait: Duration::from_secs(30),
        },
    }
}

/// The line injected into the PTY for one pending batch.
pub fn trigger_text(tool: Tool, pending: &[Event]) -> String {
    match tool {
        Tool::Claude => CLAUDE_TRIGGER.to_string(),
        Tool::Gemini => {
            let preview = pending
                .first()
                .and_then(|event| match &event.data {
                    EventData::Message(m) => Some(format!("{}: {}", m.from, first_line(&m.text))),
                    _ => None,
                })
                .unwrap_or_default();
            if pending.len() > 1 {
                format!("[hcom] {} new messages — {}", pending.len(), preview)
            } else {
                format!("[hcom] new message — {}", preview)
            }
        }
        Tool::Codex | Tool::Adhoc => {
            "You have new hcom messages. Run `hcom listen` to read them.".to_string()
        }
    }
}

fn first_line(text: &str) -> &str {
    let line = text.lines().next().unwrap_or("");
    if line.len() > 120 {
        let mut end = 120;
        while !line.is_char_boundary(end) {
            end -= 1;
        }
        &line[..end]
    } else {
        line
    }
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;

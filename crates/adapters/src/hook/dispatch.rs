// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hook routing table and handlers.
//!
//! `ROUTES` is the authoritative map of which hooks are handled where.
//! Handlers degrade to silent success for non-participants: a hook firing
//! in a session that isn't hcom-attached must never leak errors into
//! normal tool usage.

use super::{format_delivery, HookKind, HookPayload};
use crate::env::HookEnv;
use hcom_core::{Clock, HookResult, InstanceStatus, Tool};
use hcom_engine::identity::{self, ResolveInput};
use hcom_engine::runtime::Runtime;
use hcom_engine::{lifecycle, pull};
use hcom_storage::NotifyKind;
use std::time::Duration;
use tracing::debug;

/// How long a Stop hook holds the turn waiting for in-flight messages
const STOP_WAIT: Duration = Duration::from_millis(500);

/// What a routed hook does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Bind session to process; first contact for a launched tool
    BindSession,
    /// Track turn start, inject unread as additional context
    PromptContext,
    /// Track tool activity (status only)
    ToolStart,
    /// Track tool completion, inject unread as additional context
    ToolDone,
    /// Approval prompts and other notifications
    Notification,
    /// End-of-turn drain: exit 2 with messages, else mark listening
    StopDeliver,
    /// Same, for Task subagents
    SubagentStopDeliver,
    /// Mark the instance gone for this session
    SessionEnd,
    /// Codex turn-complete: mark listening (delivery rides the PTY trigger)
    TurnComplete,
}

/// The routing table. A `(tool, hook)` pair absent here is ignored.
pub const ROUTES: &[(Tool, HookKind, Route)] = &[
    (Tool::Claude, HookKind::SessionStart, Route::BindSession),
    (Tool::Claude, HookKind::UserPromptSubmit, Route::PromptContext),
    (Tool::Claude, HookKind::PreToolUse, Route::ToolStart),
    (Tool::Claude, HookKind::PostToolUse, Route::ToolDone),
    (Tool::Claude, HookKind::Notification, Route::Notification),
    (Tool::Claude, HookKind::Stop, Route::StopDeliver),
    (Tool::Claude, HookKind::SubagentStop, Route::SubagentStopDeliver),
    (Tool::Claude, HookKind::SessionEnd, Route::SessionEnd),
    (Tool::Gemini, HookKind::SessionStart, Route::BindSession),
    (Tool::Gemini, HookKind::UserPromptSubmit, Route::PromptContext),
    (Tool::Gemini, HookKind::PreToolUse, Route::ToolStart),
    (Tool::Gemini, HookKind::PostToolUse, Route::ToolDone),
    (Tool::Gemini, HookKind::Notification, Route::Notification),
    (Tool::Gemini, HookKind::Stop, Route::StopDeliver),
    (Tool::Codex, HookKind::Notify, Route::TurnComplete),
];

/// Look up the route for a `(tool, hook)` pair.
pub fn route(tool: Tool, kind: HookKind) -> Option<Route> {
    ROUTES
        .iter()
        .find(|(t, k, _)| *t == tool && *k == kind)
        .map(|(_, _, route)| *route)
}

/// Handle one hook invocation end to end.
pub async fn dispatch<C: Clock>(
    runtime: &Runtime<C>,
    kind: HookKind,
    payload: &HookPayload,
    env: &HookEnv,
) -> HookResult {
    let Some(route) = route(payload.tool, kind) else {
        return HookResult::success("");
    };

    match handle(runtime, route, payload, env).await {
        Ok(result) => result,
        Err(hcom_engine::EngineError::NotParticipating) => HookResult::success(""),
        Err(error) => {
            // Participants see their errors; the daemon logs regardless
            tracing::error!(?route, %error, "hook handler failed");
            HookResult::error(error.to_string())
        }
    }
}

async fn handle<C: Clock>(
    runtime: &Runtime<C>,
    route: Route,
    payload: &HookPayload,
    env: &HookEnv,
) -> Result<HookResult, hcom_engine::EngineError> {
    let input = ResolveInput {
        process_id: env.process_id.clone(),
        session_id: payload.session_id.clone(),
        transcript_path: payload.transcript_path.clone(),
    };

    let name = {
        let mut guard = runtime.store().lock();
        let resolved = match route {
            Route::SubagentStopDeliver => resolve_subagent(&guard, payload),
            _ => identity::resolve(&mut guard, &input),
        };
        resolved.ok_or(hcom_engine::EngineError::NotParticipating)?
    };
    debug!(%name, ?route, "hook resolved");

    match route {
        Route::BindSession => {
            if let (Some(session_id), Some(process_id)) = (&payload.session_id, &env.process_id) {
                let mut guard = runtime.store().lock();
                identity::bind_session_to_process(
                    &mut guard,
                    session_id,
                    process_id,
                    runtime.now(),
                )?;
                guard.flush()?;
            }
            mark_transition(runtime, &name, InstanceStatus::Active, "sessionstart", None).await?;
            Ok(HookResult::success(""))
        }

        Route::PromptContext => {
            mark_transition(runtime, &name, InstanceStatus::Active, "prompt", None).await?;
            let messages = drain(runtime, &name)?;
            if messages.is_empty() {
                Ok(HookResult::success(""))
            } else {
                Ok(HookResult::allow_with_context(
                    "UserPromptSubmit",
                    format_delivery(&messages),
                ))
            }
        }

        Route::ToolStart => {
            let (context, detail) = tool_context(payload);
            mark_transition(runtime, &name, InstanceStatus::Active, &context, detail).await?;
            Ok(HookResult::success(""))
        }

        Route::ToolDone => {
            let (context, detail) = tool_context(payload);
            mark_transition(
                runtime,
                &name,
                InstanceStatus::Active,
                &format!("{context}:done"),
                detail,
            )
            .await?;
            let messages = drain(runtime, &name)?;
            if messages.is_empty() {
                Ok(HookResult::success(""))
            } else {
                Ok(HookResult::allow_with_context(
                    "PostToolUse",
                    format_delivery(&messages),
                ))
            }
        }

        Route::Notification => {
            let message = payload
                .raw
                .get("message")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string);
            let is_approval = payload
                .notification_type
                .as_deref()
                .map(|t| t.contains("permission") || t.contains("approval"))
                .unwrap_or_else(|| {
                    message
                        .as_deref()
                        .is_some_and(|m| m.contains("permission") || m.contains("approval"))
                });
            if is_approval {
                mark_transition(
                    runtime,
                    &name,
                    InstanceStatus::Blocked,
                    "notify:approval",
                    message,
                )
                .await?;
            } else {
                mark_transition(runtime, &name, InstanceStatus::Active, "notify", message).await?;
            }
            Ok(HookResult::success(""))
        }

        Route::StopDeliver | Route::SubagentStopDeliver => {
            let outcome =
                pull::listen(runtime, &name, STOP_WAIT, None, NotifyKind::Hook).await?;
            if outcome.messages.is_empty() {
                mark_transition(runtime, &name, InstanceStatus::Listening, "ready", None).await?;
                Ok(HookResult::success(""))
            } else {
                Ok(HookResult::stop_with_messages(format_delivery(
                    &outcome.messages,
                )))
            }
        }

        Route::SessionEnd => {
            mark_transition(
                runtime,
                &name,
                InstanceStatus::Inactive,
                "exit:session_end",
                None,
            )
            .await?;
            Ok(HookResult::success(""))
        }

        Route::TurnComplete => {
            // Codex reports end-of-turn; delivery itself rides the PTY
            // trigger which tells the agent to run `hcom listen`
            mark_transition(runtime, &name, InstanceStatus::Listening, "ready", None).await?;
            Ok(HookResult::success(""))
        }
    }
}

/// Status transition plus batch-readiness bookkeeping: the first move out
/// of `context="new"` emits `life/ready` and may complete a batch.
async fn mark_transition<C: Clock>(
    runtime: &Runtime<C>,
    name: &str,
    status: InstanceStatus,
    context: &str,
    detail: Option<String>,
) -> Result<(), hcom_engine::EngineError> {
    let was_new = {
        let guard = runtime.store().lock();
        guard
            .registry()
            .get_instance(name)
            .is_some_and(|row| row.status_context == "new")
    };

    runtime.set_status(name, status, context, detail).await?;

    if was_new {
        {
            let mut guard = runtime.store().lock();
            lifecycle::emit_ready(&mut guard, name)?;
            guard.flush()?;
        }
        lifecycle::batch_ready_check(runtime, name).await?;
    }
    Ok(())
}

/// Drain unread immediately: no endpoint, no listening blip. The cursor
/// advances through the last message actually included.
fn drain<C: Clock>(
    runtime: &Runtime<C>,
    name: &str,
) -> Result<Vec<hcom_core::Event>, hcom_engine::EngineError> {
    let mut guard = runtime.store().lock();
    let row = guard
        .registry()
        .find_instance(name)
        .cloned()
        .ok_or(hcom_engine::EngineError::NotParticipating)?;

    let messages = hcom_engine::bus::unread(
        &guard,
        &row,
        runtime.config().max_messages_per_delivery,
    )?;
    if let Some(last) = messages.last() {
        let from = match &last.data {
            hcom_core::EventData::Message(m) => m.from.clone(),
            _ => String::new(),
        };
        hcom_engine::bus::advance_cursor(&mut guard, &row.name, last.id)?;
        let _ = hcom_engine::bus::set_status(
            &mut guard,
            &row.name,
            InstanceStatus::Active,
            &format!("deliver:{from}"),
            None,
            Some(last.ts),
            runtime.now(),
        )?;
        guard.flush()?;
    }
    Ok(messages)
}

/// Subagents resolve by agent id, never by session (their session belongs
/// to the parent).
fn resolve_subagent(store: &hcom_storage::Store, payload: &HookPayload) -> Option<String> {
    let agent_id = payload.agent_id.as_deref()?;
    store
        .registry()
        .instances
        .values()
        .find(|row| row.agent_id.as_deref() == Some(agent_id))
        .map(|row| row.name.clone())
}

/// Map a tool call to a status context slug plus detail.
fn tool_context(payload: &HookPayload) -> (String, Option<String>) {
    let name = payload.tool_name.as_deref().unwrap_or("unknown");
    let slug = match name {
        "Edit" | "Write" | "MultiEdit" | "NotebookEdit" | "write_file" | "replace" => "edit",
        "Bash" | "run_shell_command" => "bash",
        other => return (format!("tool:{}", other.to_ascii_lowercase()), tool_detail(payload)),
    };
    (format!("tool:{slug}"), tool_detail(payload))
}

fn tool_detail(payload: &HookPayload) -> Option<String> {
    let input = payload.tool_input.as_ref()?;
    let detail = input
        .get("file_path")
        .or_else(|| input.get("command"))
        .or_else(|| input.get("path"))
        .and_then(serde_json::Value::as_str)?;
    Some(detail.to_string())
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Push delivery for PTY-attached assistants.
//!
//! A notify-driven loop that injects a trigger line into the tool's
//! terminal only when the tool is provably quiescent, then verifies the
//! delivery by watching the instance cursor advance (the tool's hook reads
//! the messages and moves the cursor).
//!
//! States:
//! - `idle`: no pending messages, parked on the notifier
//! - `pending`: messages exist, waiting for a safe gate to inject
//! - `verifying`: injected, waiting for cursor advance to confirm
//!
//! No periodic store polling happens while idle; delivery attempts occur
//! only after a wake or a bounded retry tick.

use async_trait::async_trait;
use hcom_core::InstanceStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Debounce window for identical gate-block log lines
const GATE_LOG_DEBOUNCE: Duration = Duration::from_secs(5);

/// How long a gate must stay blocked before the reason surfaces in the row
const GATE_STATUS_AFTER: Duration = Duration::from_secs(2);

/// Output-stability window for the stuck-active recovery path
const RECOVERY_STABLE_WINDOW: Duration = Duration::from_secs(10);

/// Wake primitive the loop parks on (usually a local TCP notify listener).
#[async_trait]
pub trait Notifier: Send {
    /// Block until notified or timeout. Returns true if notified.
    async fn wait(&mut self, timeout: Duration) -> bool;
}

#[async_trait]
impl Notifier for crate::notify::NotifyWaiter {
    async fn wait(&mut self, timeout: Duration) -> bool {
        crate::notify::NotifyWaiter::wait(self, timeout).await
    }
}

/// Screen model answering the gate predicates for one PTY.
pub trait PtyScreen: Send {
    /// A pending approval prompt is visible (OSC9 or tool token)
    fn is_waiting_approval(&self) -> bool;
    /// Keystrokes observed within the cooldown window
    fn is_user_active(&self) -> bool;
    /// The tool's idle-prompt token is visible
    fn is_ready(&self) -> bool;
    /// The input region holds no user-typed text (placeholder excluded)
    fn is_prompt_empty(&self) -> bool;
    /// Screen bytes unchanged for the window
    fn is_output_stable(&self, window: Duration) -> bool;
}

/// Writes trigger bytes into the PTY master side.
pub trait Injector: Send {
    /// Inject the tool-specific trigger line plus Enter
    fn inject_trigger(&mut self) -> bool;
    /// Inject only Enter (first verify retry: text buffered, Enter lost)
    fn inject_enter(&mut self) -> bool;
}

/// Store access seam for the loop: cursor, pending set, status writes.
pub trait DeliveryStore: Send {
    fn get_cursor(&self) -> i64;
    fn has_pending(&self) -> bool;
    /// DB status is `listening` (the tool reported end-of-turn)
    fn is_idle(&self) -> bool;
    fn status(&self) -> Option<(InstanceStatus, String)>;
    /// Status change that logs an event
    fn set_status(&mut self, status: InstanceStatus, context: &str, detail: &str);
    /// Row-only gate status (`tui:*`), no event
    fn set_gate_status(&mut self, context: &str, detail: &str);
    /// Re-read the process binding. False means the binding is gone:
    /// do not deliver, but keep the loop alive (a later `start` may rebind).
    fn refresh_binding(&mut self) -> bool;
}

/// Gate evaluation outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateResult {
    pub safe: bool,
    pub reason: &'static str,
}

impl GateResult {
    fn blocked(reason: &'static str) -> Self {
        Self {
            safe: false,
            reason,
        }
    }
}

/// Conservative "safe to inject" gate.
///
/// Answers one question: if we inject a single line + Enter right now,
/// will it land as a fresh user turn without clobbering an approval
/// prompt, a running command, or the user's typing? Checks run in order;
/// the first failure names the block reason.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryGate {
    /// DB status must be `listening` (hooks set it at end-of-turn)
    pub require_idle: bool,
    /// Ready-prompt token must be visible (hidden while text is uncommitted
    /// or a submenu is open; Claude hides it in accept-edits mode and
    /// disables this check)
    pub require_ready_prompt: bool,
    /// Input region must be empty (Claude only)
    pub require_prompt_empty: bool,
    /// Screen unchanged for this long (zero disables)
    pub require_output_stable: Duration,
    pub block_on_user_activity: bool,
    pub block_on_approval: bool,
}

impl Default for DeliveryGate {
    fn default() -> Self {
        Self {
            require_idle: false,
            require_ready_prompt: true,
            require_prompt_empty: false,
            require_output_stable: Duration::from_secs(1),
            block_on_user_activity: true,
            block_on_approval: true,
        }
    }
}

impl DeliveryGate {
    /// Evaluate all predicates in order. Does not log; the loop handles
    /// that with debounce.
    pub fn evaluate(&self, screen: &dyn PtyScreen, is_idle: bool) -> GateResult {
        if self.require_idle && !is_idle {
            return GateResult::blocked("not_idle");
        }
        if self.block_on_approval && screen.is_waiting_approval() {
            return GateResult::blocked("approval");
        }
        if self.block_on_user_activity && screen.is_user_active() {
            return GateResult::blocked("user_active");
        }
        if self.require_ready_prompt && !screen.is_ready() {
            return GateResult::blocked("not_ready");
        }
        if self.require_prompt_empty && !screen.is_prompt_empty() {
            return GateResult::blocked("prompt_has_text");
        }
        if !self.require_output_stable.is_zero()
            && !screen.is_output_stable(self.require_output_stable)
        {
            return GateResult::blocked("output_unstable");
        }
        GateResult {
            safe: true,
            reason: "ok",
        }
    }
}

/// Two-phase exponential backoff: a low cap while delivery is freshly
/// pending, a higher cap once the tool has stayed unsafe for a while.
#[derive(Debug, Clone, Copy)]
pub struct TwoPhaseRetryPolicy {
    pub initial: Duration,
    pub multiplier: f64,
    pub warm_maximum: Duration,
    pub warm_window: Duration,
    pub cold_maximum: Duration,
}

impl Default for TwoPhaseRetryPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(250),
            multiplier: 2.0,
            warm_maximum: Duration::from_secs(2),
            warm_window: Duration::from_secs(60),
            cold_maximum: Duration::from_secs(5),
        }
    }
}

impl TwoPhaseRetryPolicy {
    pub fn from_config(config: &hcom_core::Config) -> Self {
        Self {
            initial: Duration::from_millis(config.retry_initial_ms),
            multiplier: config.retry_multiplier,
            warm_maximum: Duration::from_millis(config.retry_warm_maximum_ms),
            warm_window: Duration::from_secs(config.retry_warm_secs),
            cold_maximum: Duration::from_millis(config.retry_cold_maximum_ms),
        }
    }

    /// Delay before retry `attempt` (1-based); zero for attempt 0.
    pub fn delay(&self, attempt: u32, pending_for: Option<Duration>) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exp = self.initial.as_secs_f64() * self.multiplier.powi(attempt as i32 - 1);
        let cap = match pending_for {
            Some(p) if p >= self.warm_window => self.cold_maximum,
            _ => self.warm_maximum,
        };
        cap.min(Duration::from_secs_f64(exp))
    }
}

/// Everything one engine instance needs.
pub struct PushDeps<S, P, I, N>
where
    S: DeliveryStore,
    P: PtyScreen,
    I: Injector,
    N: Notifier,
{
    pub instance: String,
    pub store: S,
    pub screen: P,
    pub injector: I,
    pub notifier: N,
    pub gate: DeliveryGate,
    pub retry: TwoPhaseRetryPolicy,
    /// Cursor-advance confirmation window (Claude/Gemini 2s, Codex 10s)
    pub verify_timeout: Duration,
    pub max_verify_retries: u32,
    /// Idle park duration between wake checks
    pub idle_wait: Duration,
    pub start_pending: bool,
}

/// Handle for terminating a running loop.
#[derive(Clone)]
pub struct PushHandle {
    running: Arc<AtomicBool>,
}

impl PushHandle {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for PushHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Pending,
    Verifying,
}

/// Debounce bookkeeping for gate-block logging
#[derive(Default)]
struct BlockLog {
    last_reason: Option<&'static str>,
    last_logged: Option<Instant>,
}

impl BlockLog {
    fn log(&mut self, instance: &str, reason: &'static str) {
        let due = self.last_reason != Some(reason)
            || self
                .last_logged
                .is_none_or(|at| at.elapsed() >= GATE_LOG_DEBOUNCE);
        if due {
            info!(instance, reason, "gate blocked");
            self.last_reason = Some(reason);
            self.last_logged = Some(Instant::now());
        }
    }
}

fn gate_detail(reason: &str) -> &'static str {
    match reason {
        "not-idle" => "waiting for idle status",
        "user-active" => "user is typing",
        "not-ready" => "prompt not visible",
        "output-unstable" => "output still streaming",
        "prompt-has-text" => "uncommitted text in prompt",
        _ => "",
    }
}

/// Surface a persistent gate block in the instance row.
///
/// `tui:*` contexts are row-only (no event); approval is a real `blocked`
/// status because hooks treat approval the same way.
fn update_gate_block_status<S: DeliveryStore>(
    store: &mut S,
    reason: &'static str,
    block_since: Option<Instant>,
) -> Instant {
    let Some(since) = block_since else {
        return Instant::now();
    };

    let Some((status, context)) = store.status() else {
        return since;
    };
    // Only overlay a listening row; never clobber active/blocked
    if status != InstanceStatus::Listening {
        return since;
    }

    if since.elapsed() >= GATE_STATUS_AFTER {
        let hyphenated = reason.replace('_', "-");
        if hyphenated == "approval" {
            if context != "pty:approval" {
                store.set_status(
                    InstanceStatus::Blocked,
                    "pty:approval",
                    "waiting for user approval",
                );
            }
        } else {
            let tui_context = format!("tui:{hyphenated}");
            if context != tui_context {
                store.set_gate_status(&tui_context, gate_detail(&hyphenated));
            }
        }
    }
    since
}

/// Clear gate-block residue after a confirmed delivery.
fn clear_gate_block_status<S: DeliveryStore>(store: &mut S) {
    let Some((status, context)) = store.status() else {
        return;
    };
    if status == InstanceStatus::Listening && context.starts_with("tui:") {
        store.set_gate_status("", "");
    } else if status == InstanceStatus::Blocked && context == "pty:approval" {
        store.set_status(InstanceStatus::Listening, "ready", "");
    }
}

/// Run the delivery loop until the handle stops it.
///
/// The crash barrier lives in the caller (the PTY wrapper marks the
/// instance `error/pty:crash` and keeps the tool session running).
pub async fn run_push_loop<S, P, I, N>(mut deps: PushDeps<S, P, I, N>, handle: PushHandle)
where
    S: DeliveryStore,
    P: PtyScreen,
    I: Injector,
    N: Notifier,
{
    let instance = deps.instance.clone();
    let mut state = if deps.start_pending {
        State::Pending
    } else {
        State::Idle
    };
    let mut attempt: u32 = 0;
    let mut pending_since: Option<Instant> = if deps.start_pending {
        Some(Instant::now())
    } else {
        None
    };
    let mut block_since: Option<Instant> = None;
    let mut block_log = BlockLog::default();

    // Verification state
    let mut cursor_before: i64 = 0;
    let mut injected_at = Instant::now();
    let mut verify_retries: u32 = 0;

    while handle.is_running() {
        // Binding refresh: a deleted binding suspends delivery but keeps
        // the loop alive until the wrapper exits or a start rebinds.
        if !deps.store.refresh_binding() {
            deps.notifier.wait(Duration::from_secs(1)).await;
            continue;
        }

        match state {
            State::Idle => {
                deps.notifier.wait(deps.idle_wait).await;
                if !handle.is_running() {
                    break;
                }
                if deps.store.has_pending() {
                    state = State::Pending;
                    pending_since = Some(Instant::now());
                    debug!(instance = %instance, "delivery pending: messages arrived");
                }
            }

            State::Verifying => {
                let current = deps.store.get_cursor();
                if current > cursor_before {
                    // Delivery confirmed
                    clear_gate_block_status(&mut deps.store);
                    if deps.store.has_pending() {
                        state = State::Pending;
                        debug!(instance = %instance, "cursor advanced, more messages pending");
                    } else {
                        state = State::Idle;
                        pending_since = None;
                        debug!(instance = %instance, "cursor advanced, delivery confirmed");
                    }
                    attempt = 0;
                    block_since = None;
                    verify_retries = 0;
                    continue;
                }

                if injected_at.elapsed() > deps.verify_timeout {
                    warn!(instance = %instance, "delivery verify timeout");

                    if verify_retries >= deps.max_verify_retries {
                        error!(
                            instance = %instance,
                            retries = verify_retries,
                            "max verify retries exceeded, abandoning attempt"
                        );
                        state = State::Pending;
                        verify_retries = 0;
                        attempt += 1;
                        continue;
                    }

                    // Critical gates only: our own injection broke
                    // readiness/stability, so those are not re-checked
                    if deps.gate.block_on_approval && deps.screen.is_waiting_approval() {
                        deps.notifier.wait(Duration::from_millis(500)).await;
                        continue;
                    }
                    if deps.gate.block_on_user_activity && deps.screen.is_user_active() {
                        deps.notifier.wait(Duration::from_millis(500)).await;
                        continue;
                    }
                    if deps.gate.require_idle && !deps.store.is_idle() {
                        deps.notifier.wait(Duration::from_millis(500)).await;
                        continue;
                    }

                    cursor_before = deps.store.get_cursor();
                    let ok = if verify_retries == 0 {
                        // Text is likely buffered but unsubmitted: the
                        // cheap fix is a bare Enter
                        debug!(instance = %instance, "verify retry: enter only");
                        deps.injector.inject_enter()
                    } else {
                        debug!(instance = %instance, "verify retry: full trigger");
                        deps.injector.inject_trigger()
                    };
                    verify_retries += 1;
                    if ok {
                        injected_at = Instant::now();
                    } else {
                        state = State::Pending;
                        attempt += 1;
                    }
                    continue;
                }

                deps.notifier.wait(Duration::from_millis(250)).await;
            }

            State::Pending => {
                let is_idle = deps.store.is_idle();
                let result = deps.gate.evaluate(&deps.screen, is_idle);

                if result.safe {
                    cursor_before = deps.store.get_cursor();
                    if deps.injector.inject_trigger() {
                        injected_at = Instant::now();
                        verify_retries = 0;
                        state = State::Verifying;
                        debug!(instance = %instance, "trigger injected, verifying");
                        continue;
                    }
                    attempt += 1;
                } else {
                    block_log.log(&instance, result.reason);
                    block_since = Some(update_gate_block_status(
                        &mut deps.store,
                        result.reason,
                        block_since,
                    ));

                    // Stuck-active recovery: the user pressed Esc but the
                    // tool never emitted end-of-turn. Stable output for
                    // 10s while "active" means nothing is running.
                    if result.reason == "not_idle"
                        && deps
                            .store
                            .status()
                            .is_some_and(|(status, _)| status == InstanceStatus::Active)
                        && deps.screen.is_output_stable(RECOVERY_STABLE_WINDOW)
                    {
                        info!(instance = %instance, "stable output while active, forcing listening");
                        deps.store
                            .set_status(InstanceStatus::Listening, "pty:recovered", "");
                        attempt = 0;
                        continue;
                    }
                    attempt += 1;
                }

                let pending_for = pending_since.map(|since| since.elapsed());
                let delay = deps.retry.delay(attempt, pending_for);
                if delay.is_zero() {
                    continue;
                }
                let notified = deps.notifier.wait(delay).await;
                if notified {
                    // A wake snaps back to fast retries
                    attempt = 0;
                }
                if !handle.is_running() {
                    break;
                }
                if !deps.store.has_pending() {
                    state = State::Idle;
                    attempt = 0;
                    pending_since = None;
                    block_since = None;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "push_tests.rs"]
mod tests;

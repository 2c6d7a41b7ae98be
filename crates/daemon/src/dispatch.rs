// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request execution: hook dispatch and the CLI command surface.
//!
//! Output goes into per-request capture buffers, never the daemon's own
//! streams, so concurrent requests can't interleave.

use crate::protocol::{Request, RequestKind, Response};
use hcom_adapters::hook::{self, HookKind};
use hcom_adapters::{detect_tool, HookEnv};
use hcom_core::{format_age, Event, EventData, HookResult, Intent, ProcessId, Tool};
use hcom_engine::identity::ResolveInput;
use hcom_engine::{identity, lifecycle, pull, subscriptions, EngineError, NotifyBus, Runtime};
use hcom_storage::{parse_predicate, NotifyKind, Predicate};
use std::time::Duration;
use tracing::{debug, error};

/// Default `listen` timeout when none was given
const DEFAULT_LISTEN_TIMEOUT: Duration = Duration::from_secs(60);

/// Default `events --wait` timeout
const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-request output capture.
#[derive(Default)]
struct Capture {
    stdout: String,
    stderr: String,
}

impl Capture {
    fn out(&mut self, line: impl AsRef<str>) {
        self.stdout.push_str(line.as_ref());
        self.stdout.push('\n');
    }

    fn err(&mut self, line: impl AsRef<str>) {
        self.stderr.push_str(line.as_ref());
        self.stderr.push('\n');
    }
}

/// Execute one request against the engine.
pub async fn handle_request(runtime: &Runtime, request: &Request) -> Response {
    let result = match request.kind {
        RequestKind::Hook => handle_hook(runtime, request).await,
        RequestKind::Cli => handle_cli(runtime, request).await,
    };

    match result {
        Ok((exit_code, capture)) => {
            Response::for_request(&request.request_id, exit_code, capture.stdout, capture.stderr)
        }
        Err(error) => {
            error!(%error, argv = ?request.argv, "request failed");
            Response::for_request(&request.request_id, 1, String::new(), format!("{error}\n"))
        }
    }
}

async fn handle_hook(
    runtime: &Runtime,
    request: &Request,
) -> Result<(i32, Capture), EngineError> {
    let tool = detect_tool(&request.env);
    let env = HookEnv::from_map(&request.env);

    let Some(hook_type) = &request.hook_type else {
        // Not a routed hook invocation; stay silent
        return Ok((0, Capture::default()));
    };
    let Ok(kind) = HookKind::parse(hook_type) else {
        debug!(hook_type, "unknown hook type ignored");
        return Ok((0, Capture::default()));
    };

    // Codex carries its payload in argv; the rest use stdin
    let input = match tool {
        Tool::Codex => request.argv.last().cloned().unwrap_or_default(),
        _ => request.stdin.clone().unwrap_or_default(),
    };
    let payload = match hook::parse_payload(tool, &input) {
        Ok(payload) => payload,
        Err(e) => {
            // Pre-gate failure: exit 0, never leak into normal tool usage
            debug!(error = %e, "unparseable hook payload ignored");
            return Ok((0, Capture::default()));
        }
    };

    let result: HookResult = hook::dispatch(runtime, kind, &payload, &env).await;
    let mut capture = Capture::default();
    capture.stdout = result.stdout;
    capture.stderr = result.stderr;
    Ok((result.exit_code, capture))
}

async fn handle_cli(
    runtime: &Runtime,
    request: &Request,
) -> Result<(i32, Capture), EngineError> {
    let mut capture = Capture::default();
    let argv: Vec<&str> = request.argv.iter().map(String::as_str).collect();

    let code = match argv.split_first() {
        Some((&"send", rest)) => cmd_send(runtime, request, rest, &mut capture).await?,
        Some((&"listen", rest)) => cmd_listen(runtime, request, rest, &mut capture).await?,
        Some((&"events", rest)) => cmd_events(runtime, request, rest, &mut capture).await?,
        Some((&"start", rest)) => cmd_start(runtime, request, rest, &mut capture).await?,
        Some((&"stop", rest)) => cmd_stop(runtime, rest, &mut capture).await?,
        Some((&"kill", rest)) => cmd_stop(runtime, rest, &mut capture).await?,
        Some((&"list", rest)) => cmd_list(runtime, rest, &mut capture)?,
        Some((&"reset", rest)) => cmd_reset(runtime, rest, &mut capture).await?,
        Some((other, _)) => {
            capture.err(format!("unknown command '{other}'"));
            1
        }
        None => {
            capture.err("no command given");
            1
        }
    };
    Ok((code, capture))
}

/// Resolve the calling instance from the request environment.
fn caller(runtime: &Runtime, request: &Request) -> Option<String> {
    let process_id = request
        .env
        .get("HCOM_PROCESS_ID")
        .filter(|v| !v.is_empty())
        .map(|v| ProcessId::new(v.clone()))?;
    let mut guard = runtime.store().lock();
    identity::resolve(
        &mut guard,
        &ResolveInput {
            process_id: Some(process_id),
            session_id: None,
            transcript_path: None,
        },
    )
}

// --- send ---

async fn cmd_send(
    runtime: &Runtime,
    request: &Request,
    args: &[&str],
    capture: &mut Capture,
) -> Result<i32, EngineError> {
    let mut targets: Vec<String> = Vec::new();
    let mut text_parts: Vec<String> = Vec::new();
    let mut from: Option<String> = None;
    let mut intent = Intent::Inform;
    let mut reply_to: Option<i64> = None;
    let mut thread: Option<String> = None;

    let mut iter = args.iter();
    let mut after_separator = false;
    while let Some(&arg) = iter.next() {
        if after_separator {
            text_parts.push(arg.to_string());
            continue;
        }
        match arg {
            "--" => after_separator = true,
            "--from" | "--name" => {
                from = iter.next().map(|s| s.to_string());
            }
            "--intent" => {
                intent = match iter.next() {
                    Some(&"request") => Intent::Request,
                    Some(&"inform") => Intent::Inform,
                    Some(&"ack") => Intent::Ack,
                    other => {
                        capture.err(format!(
                            "--intent must be request|inform|ack, got {:?}",
                            other.unwrap_or(&"")
                        ));
                        return Ok(1);
                    }
                };
            }
            "--reply-to" => {
                reply_to = iter.next().and_then(|s| s.parse().ok());
            }
            "--thread" => {
                thread = iter.next().map(|s| s.to_string());
            }
            target if target.starts_with('@') => targets.push(target.to_string()),
            word => text_parts.push(word.to_string()),
        }
    }

    let text = text_parts.join(" ");
    let from = from
        .or_else(|| caller(runtime, request))
        .unwrap_or_else(|| "bigboss".to_string());

    match runtime
        .send(&from, &text, &targets, intent, reply_to, thread)
        .await
    {
        Ok(outcome) => {
            for warning in &outcome.warnings {
                capture.err(warning);
            }
            let delivered = match &outcome.event.data {
                EventData::Message(m) => m.delivered_to.len(),
                _ => 0,
            };
            capture.out(format!(
                "sent #{} to {} instance(s)",
                outcome.event.id, delivered
            ));
            Ok(0)
        }
        Err(EngineError::InvalidInput(message)) => {
            capture.err(message);
            Ok(1)
        }
        Err(e) => Err(e),
    }
}

// --- listen ---

async fn cmd_listen(
    runtime: &Runtime,
    request: &Request,
    args: &[&str],
    capture: &mut Capture,
) -> Result<i32, EngineError> {
    let mut timeout = DEFAULT_LISTEN_TIMEOUT;
    let mut predicate: Option<Predicate> = None;
    let mut json = false;

    let mut iter = args.iter();
    while let Some(&arg) = iter.next() {
        match arg {
            "--sql" => {
                let Some(expr) = iter.next() else {
                    capture.err("--sql needs an expression");
                    return Ok(1);
                };
                predicate = Some(parse_predicate(expr)?);
            }
            "--json" => json = true,
            value => {
                if let Ok(secs) = value.parse::<f64>() {
                    timeout = Duration::from_secs_f64(secs);
                } else {
                    capture.err(format!("unexpected argument '{value}'"));
                    return Ok(1);
                }
            }
        }
    }

    let Some(name) = caller(runtime, request) else {
        capture.err("not attached to an instance (listen needs an identity)");
        return Ok(1);
    };

    let outcome = pull::listen(runtime, &name, timeout, predicate.as_ref(), NotifyKind::Hook)
        .await?;

    for event in &outcome.messages {
        capture.out(render_event(event, json)?);
    }
    if outcome.timed_out {
        debug!(%name, "listen timed out");
    }
    Ok(0)
}

// --- events ---

async fn cmd_events(
    runtime: &Runtime,
    request: &Request,
    args: &[&str],
    capture: &mut Capture,
) -> Result<i32, EngineError> {
    match args.split_first() {
        Some((&"sub", rest)) => return cmd_events_sub(runtime, request, rest, capture),
        Some((&"unsub", rest)) => {
            let Some(id) = rest.first() else {
                capture.err("unsub needs a subscription id");
                return Ok(1);
            };
            return if subscriptions::remove(runtime, id)? {
                capture.out(format!("unsubscribed {id}"));
                Ok(0)
            } else {
                capture.err(format!("no subscription {id}"));
                Ok(1)
            };
        }
        Some((&"subs", _)) => {
            for sub in subscriptions::list(runtime) {
                capture.out(format!(
                    "{}  {}  once={}  {}",
                    sub.id, sub.caller, sub.once, sub.predicate
                ));
            }
            return Ok(0);
        }
        _ => {}
    }

    let mut last: usize = 20;
    let mut wait: Option<Duration> = None;
    let mut predicate: Option<Predicate> = None;
    let mut json = false;

    let mut iter = args.iter().peekable();
    while let Some(&arg) = iter.next() {
        match arg {
            "--last" => {
                last = iter.next().and_then(|s| s.parse().ok()).unwrap_or(20);
            }
            "--wait" => {
                let secs = iter.peek().and_then(|s| s.parse::<f64>().ok());
                if secs.is_some() {
                    iter.next();
                }
                wait = Some(
                    secs.map(Duration::from_secs_f64)
                        .unwrap_or(DEFAULT_WAIT_TIMEOUT),
                );
            }
            "--sql" => {
                let Some(expr) = iter.next() else {
                    capture.err("--sql needs an expression");
                    return Ok(1);
                };
                predicate = Some(parse_predicate(expr)?);
            }
            "--json" => json = true,
            other => {
                capture.err(format!("unexpected argument '{other}'"));
                return Ok(1);
            }
        }
    }

    let events = match wait {
        Some(timeout) => {
            let predicate = match predicate {
                Some(p) => p,
                None => parse_predicate("id > 0")?,
            };
            let instance = caller(runtime, request);
            pull::wait_events(runtime, instance.as_deref(), None, timeout, &predicate).await?
        }
        None => {
            let guard = runtime.store().lock();
            let all = guard.tail_events(last.max(1) * 4)?;
            let mut filtered: Vec<Event> = all
                .into_iter()
                .filter(|e| predicate.as_ref().is_none_or(|p| p.matches(e)))
                .collect();
            if filtered.len() > last {
                filtered.drain(..filtered.len() - last);
            }
            filtered
        }
    };

    for event in &events {
        capture.out(render_event(event, json)?);
    }
    Ok(0)
}

fn cmd_events_sub(
    runtime: &Runtime,
    request: &Request,
    args: &[&str],
    capture: &mut Capture,
) -> Result<i32, EngineError> {
    let mut once = false;
    let mut expr: Option<String> = None;
    for &arg in args {
        match arg {
            "--once" => once = true,
            value => {
                // Preset form: name or name:param
                let resolved = match value.split_once(':') {
                    Some((preset_name, param)) => subscriptions::preset(preset_name, param),
                    None => subscriptions::preset(value, ""),
                };
                expr = Some(resolved.unwrap_or_else(|| value.to_string()));
            }
        }
    }
    let Some(expr) = expr else {
        capture.err("sub needs a predicate or preset");
        return Ok(1);
    };
    let Some(name) = caller(runtime, request) else {
        capture.err("not attached to an instance (sub needs an identity)");
        return Ok(1);
    };

    let (id, warnings) = subscriptions::create(runtime, &name, &expr, once)?;
    for warning in warnings {
        capture.err(warning);
    }
    capture.out(format!("subscribed {id}"));
    Ok(0)
}

// --- start / stop ---

async fn cmd_start(
    runtime: &Runtime,
    request: &Request,
    args: &[&str],
    capture: &mut Capture,
) -> Result<i32, EngineError> {
    let env = HookEnv::from_map(&request.env);
    let tool = detect_tool(&request.env);

    let mut opts = lifecycle::StartOpts {
        tool,
        tag: env.tag.clone(),
        process_id: env.process_id.clone(),
        directory: Some(std::path::PathBuf::from(&request.cwd)),
        ..Default::default()
    };

    let mut iter = args.iter();
    while let Some(&arg) = iter.next() {
        match arg {
            "--as" => opts.as_name = iter.next().map(|s| s.to_string()),
            "--name" => opts.name = iter.next().map(|s| s.to_string()),
            "--tag" => opts.tag = iter.next().map(|s| s.to_string()),
            other => {
                capture.err(format!("unexpected argument '{other}'"));
                return Ok(1);
            }
        }
    }

    let outcome = {
        let mut guard = runtime.store().lock();
        let outcome = lifecycle::start(&mut guard, runtime.now(), opts)?;
        guard.flush()?;
        outcome
    };
    lifecycle::batch_ready_check(runtime, &outcome.name).await?;

    let verb = if outcome.reclaimed {
        "reclaimed"
    } else if outcome.created {
        "started"
    } else {
        "already"
    };
    capture.out(format!("{verb} {}", outcome.name));
    Ok(0)
}

async fn cmd_stop(
    runtime: &Runtime,
    args: &[&str],
    capture: &mut Capture,
) -> Result<i32, EngineError> {
    let names: Vec<String> = {
        let guard = runtime.store().lock();
        match args.first() {
            None | Some(&"all") => guard
                .registry()
                .instances
                .values()
                .filter(|row| !row.is_remote() && row.parent_name.is_none())
                .map(|row| row.name.clone())
                .collect(),
            Some(tag_arg) if tag_arg.starts_with("tag:") => {
                let tag = &tag_arg["tag:".len()..];
                guard
                    .registry()
                    .instances
                    .values()
                    .filter(|row| row.tag.as_deref() == Some(tag))
                    .map(|row| row.name.clone())
                    .collect()
            }
            _ => args.iter().map(|s| s.to_string()).collect(),
        }
    };

    if names.is_empty() {
        capture.out("nothing to stop");
        return Ok(0);
    }

    let mut code = 0;
    for name in names {
        match lifecycle::stop(runtime.store(), &NotifyBus, &name, "bigboss", None).await {
            Ok(stopped) => {
                for stopped_name in stopped {
                    capture.out(format!("stopped {stopped_name}"));
                }
            }
            Err(EngineError::IdentityMissing(_)) => {
                capture.err(format!("no instance named '{name}'"));
                code = 1;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(code)
}

// --- list ---

fn cmd_list(
    runtime: &Runtime,
    args: &[&str],
    capture: &mut Capture,
) -> Result<i32, EngineError> {
    let mut json = false;
    let mut sh = false;
    let mut verbose = false;
    let mut filter: Option<&str> = None;
    for &arg in args {
        match arg {
            "--json" => json = true,
            "--sh" => sh = true,
            "-v" | "--verbose" => verbose = true,
            name => filter = Some(name),
        }
    }

    // Opportunistic hygiene on every list
    {
        let mut guard = runtime.store().lock();
        lifecycle::promote_stale_listening(&mut guard, runtime.config(), runtime.now())?;
        lifecycle::cleanup_one_stale(&mut guard, runtime.config(), runtime.now())?;
    }

    let guard = runtime.store().lock();
    let mut rows: Vec<_> = guard.registry().instances.values().cloned().collect();
    rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));

    if let Some(filter) = filter.filter(|f| *f != "self") {
        rows.retain(|row| row.name == filter || row.full_name() == filter);
    }

    let now = runtime.now();
    for row in rows {
        if json {
            capture.out(
                serde_json::to_string(&row).map_err(|e| EngineError::invalid(e.to_string()))?,
            );
        } else if sh {
            capture.out(format!(
                "name={} status={} context={} cursor={}",
                row.full_name(),
                row.status.as_str(),
                row.status_context,
                row.last_event_id
            ));
        } else {
            let age = format_age(row.status_time, now);
            let mut line = format!(
                "{:<16} {:<10} {:<24} {}",
                row.full_name(),
                row.status.as_str(),
                row.status_context,
                age
            );
            if verbose {
                line.push_str(&format!(
                    "  tool={} cursor={} dir={}",
                    row.tool.as_str(),
                    row.last_event_id,
                    row.directory.display()
                ));
            }
            capture.out(line);
        }
    }
    Ok(0)
}

// --- reset ---

async fn cmd_reset(
    runtime: &Runtime,
    args: &[&str],
    capture: &mut Capture,
) -> Result<i32, EngineError> {
    let all = args.first() == Some(&"all");
    if all {
        let names: Vec<String> = {
            let guard = runtime.store().lock();
            guard
                .registry()
                .instances
                .values()
                .filter(|row| !row.is_remote() && row.parent_name.is_none())
                .map(|row| row.name.clone())
                .collect()
        };
        for name in names {
            let _ = lifecycle::stop(runtime.store(), &NotifyBus, &name, "bigboss", Some("reset".into()))
                .await;
        }
    }

    let archive = {
        let mut guard = runtime.store().lock();
        guard.reset()?
    };
    capture.out(format!("store archived to {}", archive.display()));
    Ok(0)
}

// --- rendering ---

fn render_event(event: &Event, json: bool) -> Result<String, EngineError> {
    if json {
        return serde_json::to_string(event).map_err(|e| EngineError::invalid(e.to_string()));
    }
    let summary = match &event.data {
        EventData::Message(m) => format!("[{}] {}", m.from, m.text),
        EventData::Status(s) => format!(
            "status {} {} {}",
            s.status.as_str(),
            s.context,
            s.detail.as_deref().unwrap_or("")
        ),
        EventData::Life(l) => format!(
            "life {:?} by {} {}",
            l.action,
            l.by,
            l.reason.as_deref().unwrap_or("")
        ),
    };
    Ok(format!(
        "#{} {} {}: {}",
        event.id,
        event.ts.format("%H:%M:%S"),
        event.instance,
        summary
    ))
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;

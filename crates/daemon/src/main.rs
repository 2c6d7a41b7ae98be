// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! hcom daemon (hcomd)
//!
//! Long-lived process owning the event store. Hooks and CLI calls connect
//! over the Unix socket; the daemon executes them in-process and returns
//! captured output.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod dispatch;
mod lifecycle;
mod listener;
mod protocol;

use crate::lifecycle::{DaemonConfig, LifecycleError};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

/// Store flush cadence (group commit durability window)
const FLUSH_INTERVAL: Duration = Duration::from_millis(10);

/// How often the idle timeout is evaluated
const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Drain window for in-flight requests on SIGTERM
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle info flags before any lock acquisition
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("hcomd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("hcomd {}", env!("CARGO_PKG_VERSION"));
                println!("hcom daemon - owns the event store and serves hook/CLI requests");
                println!();
                println!("USAGE:");
                println!("    hcomd");
                println!();
                println!("The daemon is typically started by the `hcom` CLI and should not");
                println!("be invoked directly. It listens on a Unix socket under HCOM_DIR.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: hcomd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = DaemonConfig::load()?;

    rotate_log_if_needed(&config.log_path);
    write_startup_marker(&config)?;
    let log_guard = setup_logging(&config)?;

    info!("starting hcomd");

    let startup = match lifecycle::startup(&config) {
        Ok(startup) => startup,
        Err(LifecycleError::LockFailed(_)) => {
            let pid = std::fs::read_to_string(&config.pid_path)
                .unwrap_or_default()
                .trim()
                .to_string();
            eprintln!("hcomd is already running");
            if !pid.is_empty() {
                eprintln!("  pid: {pid}");
            }
            std::process::exit(1);
        }
        Err(e) => {
            write_startup_error(&config, &e);
            error!("failed to start daemon: {e}");
            drop(log_guard);
            return Err(e.into());
        }
    };

    let runtime = startup.runtime.clone();
    let ctx = Arc::new(listener::ListenCtx::new(runtime.clone()));
    tokio::spawn(listener::run(startup.listener, Arc::clone(&ctx)));

    spawn_flush_task(runtime.clone());

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut idle_check = tokio::time::interval(IDLE_CHECK_INTERVAL);
    let idle_timeout = Duration::from_secs(runtime.config().daemon_idle_timeout_secs);

    info!(socket = %config.socket_path.display(), "daemon ready");

    // Signal ready for the spawning CLI
    println!("READY");

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                break;
            }
            _ = idle_check.tick() => {
                if ctx.idle_for() >= idle_timeout {
                    info!(idle_secs = ctx.idle_for().as_secs(), "idle timeout, shutting down");
                    break;
                }
            }
        }
    }

    drain_in_flight(&ctx).await;
    lifecycle::shutdown(&config, &runtime);
    Ok(())
}

/// Wait briefly for in-flight requests before exiting.
async fn drain_in_flight(ctx: &listener::ListenCtx) {
    let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;
    while ctx.in_flight.load(std::sync::atomic::Ordering::SeqCst) > 0 {
        if tokio::time::Instant::now() >= deadline {
            info!("drain timeout, exiting with requests in flight");
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Spawn the periodic store flush (log group commit + registry snapshot).
fn spawn_flush_task(runtime: hcom_engine::Runtime) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(FLUSH_INTERVAL);
        loop {
            interval.tick().await;
            let needs = {
                let store = runtime.store().lock();
                store.needs_flush()
            };
            if needs {
                let mut store = runtime.store().lock();
                if let Err(e) = store.flush() {
                    tracing::error!("store flush failed: {e}");
                }
            }
        }
    });
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep.
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the daemon log file if it exceeds [`MAX_LOG_SIZE`].
///
/// Best-effort: rotation failures are silently ignored so the daemon
/// still starts.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

/// Startup marker prefix written to the log before anything else; the CLI
/// uses it to find where the current startup attempt begins.
const STARTUP_MARKER_PREFIX: &str = "--- hcomd: starting (pid: ";

fn write_startup_marker(config: &DaemonConfig) -> Result<(), LifecycleError> {
    use std::io::Write;

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)?;
    writeln!(file, "{}{}) ---\n", STARTUP_MARKER_PREFIX, std::process::id())?;
    Ok(())
}

/// Write a startup error synchronously so it's visible to the CLI even if
/// the process exits before tracing flushes.
fn write_startup_error(config: &DaemonConfig, error: &LifecycleError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR failed to start daemon: {error}");
}

fn setup_logging(
    config: &DaemonConfig,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let parent = config
        .log_path
        .parent()
        .ok_or(LifecycleError::NoHomeDir)?;
    std::fs::create_dir_all(parent)?;

    let file_appender = tracing_appender::rolling::never(
        parent,
        config
            .log_path
            .file_name()
            .ok_or(LifecycleError::NoHomeDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}

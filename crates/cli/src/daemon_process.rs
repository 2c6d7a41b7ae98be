// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon process management: background spawn, liveness probe, stale
//! socket cleanup, startup error surfacing.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tokio::net::UnixStream;

/// Resolve the hcom root directory (`HCOM_DIR` or `~/.hcom`).
pub fn hcom_dir() -> Option<PathBuf> {
    match std::env::var("HCOM_DIR") {
        Ok(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::home_dir().map(|home| home.join(".hcom")),
    }
}

/// The hcomd binary lives next to the hcom binary.
fn hcomd_binary() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("hcomd")))
        .unwrap_or_else(|| PathBuf::from("hcomd"))
}

/// Spawn hcomd detached. The child inherits `HCOM_DIR` from this process.
pub fn start_daemon_background(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    Command::new(hcomd_binary())
        .env("HCOM_DIR", dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(())
}

/// True when something is accepting on the socket.
pub async fn probe_socket(socket_path: &Path) -> bool {
    UnixStream::connect(socket_path).await.is_ok()
}

/// A socket file nothing listens on is debris from a dead daemon.
pub fn cleanup_stale_socket(socket_path: &Path) {
    if socket_path.exists() {
        let _ = std::fs::remove_file(socket_path);
    }
}

/// Stop a running daemon by pid file. Returns whether one was stopped.
pub fn stop_daemon() -> std::io::Result<bool> {
    let Some(dir) = hcom_dir() else {
        return Ok(false);
    };
    let pid_path = dir.join("hcomd.pid");
    let Ok(pid_text) = std::fs::read_to_string(&pid_path) else {
        return Ok(false);
    };
    let Ok(pid) = pid_text.trim().parse::<i32>() else {
        return Ok(false);
    };

    // SIGTERM; the daemon drains in-flight requests itself
    Ok(send_sigterm(pid))
}

/// Send SIGTERM via the portable `kill` command (avoids a libc dependency
/// for this one call).
fn send_sigterm(pid: i32) -> bool {
    Command::new("kill")
        .arg(pid.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Pull the most recent startup error out of the daemon log, if any.
///
/// The daemon writes a startup marker before anything else, so scanning
/// back from the last marker finds only the current attempt's errors.
pub fn read_startup_error(dir: &Path) -> Option<String> {
    let log_path = dir.join(".tmp").join("logs").join("hcomd.log");
    let content = std::fs::read_to_string(log_path).ok()?;

    let marker_at = content.rfind("--- hcomd: starting")?;
    let tail = &content[marker_at..];
    tail.lines()
        .find(|line| line.contains("ERROR"))
        .map(|line| line.trim().to_string())
}

#[cfg(test)]
#[path = "daemon_process_tests.rs"]
mod tests;

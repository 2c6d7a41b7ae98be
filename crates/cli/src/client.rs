// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client for CLI commands

use crate::daemon_process::{
    cleanup_stale_socket, hcom_dir, probe_socket, read_startup_error, start_daemon_background,
};
use hcom_daemon::{protocol, ProtocolError, Request, Response};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::BufReader;
use tokio::net::UnixStream;

// Timeout configuration (env vars in milliseconds)
fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Timeout for writing a request
pub fn timeout_ipc() -> Duration {
    parse_duration_ms("HCOM_TIMEOUT_IPC_MS").unwrap_or(Duration::from_secs(5))
}

/// Timeout for waiting for the daemon to start
pub fn timeout_connect() -> Duration {
    parse_duration_ms("HCOM_TIMEOUT_CONNECT_MS").unwrap_or(Duration::from_secs(5))
}

/// Polling interval for connection retries
pub fn poll_interval() -> Duration {
    parse_duration_ms("HCOM_CONNECT_POLL_MS").unwrap_or(Duration::from_millis(50))
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("daemon not running (start it with: hcom daemon start)")]
    DaemonNotRunning,

    #[error("failed to start daemon: {0}")]
    DaemonStartFailed(String),

    #[error("connection timeout waiting for daemon to start")]
    DaemonStartTimeout,

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not determine hcom directory")]
    NoHcomDir,
}

/// Daemon client
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// For action commands: auto-start with version check, max one
    /// restart per process. Action commands mutate state (send, start,
    /// stop, ...) and should bring the daemon up on demand.
    pub async fn for_action() -> Result<Self, ClientError> {
        Self::connect_or_start_once().await
    }

    /// For query commands: connect only, never start. If there's no
    /// daemon there's nothing useful to query anyway.
    pub async fn for_query() -> Result<Self, ClientError> {
        Self::connect().await
    }

    async fn connect_or_start_once() -> Result<Self, ClientError> {
        static RESTARTED: AtomicBool = AtomicBool::new(false);

        // A stale daemon version gets one restart per client process
        let dir = hcom_dir().ok_or(ClientError::NoHcomDir)?;
        let version_path = dir.join(".tmp").join("daemon.version");
        if let Ok(daemon_version) = std::fs::read_to_string(&version_path) {
            let cli_version = env!("CARGO_PKG_VERSION");
            if daemon_version.trim() != cli_version
                && !RESTARTED.swap(true, Ordering::SeqCst)
                && probe_socket(&dir.join("hcomd.sock")).await
            {
                crate::daemon_process::stop_daemon()?;
            }
        }

        match Self::connect().await {
            Ok(client) => Ok(client),
            Err(ClientError::DaemonNotRunning) => Self::start_and_connect().await,
            Err(e) => Err(e),
        }
    }

    async fn connect() -> Result<Self, ClientError> {
        let dir = hcom_dir().ok_or(ClientError::NoHcomDir)?;
        let socket_path = dir.join("hcomd.sock");
        if !probe_socket(&socket_path).await {
            cleanup_stale_socket(&socket_path);
            return Err(ClientError::DaemonNotRunning);
        }
        Ok(Self { socket_path })
    }

    async fn start_and_connect() -> Result<Self, ClientError> {
        let dir = hcom_dir().ok_or(ClientError::NoHcomDir)?;
        let socket_path = dir.join("hcomd.sock");

        start_daemon_background(&dir).map_err(|e| ClientError::DaemonStartFailed(e.to_string()))?;

        // Poll until the socket accepts or the window closes
        let deadline = Instant::now() + timeout_connect();
        loop {
            if probe_socket(&socket_path).await {
                return Ok(Self { socket_path });
            }
            if Instant::now() >= deadline {
                let detail = read_startup_error(&dir).unwrap_or_default();
                return Err(if detail.is_empty() {
                    ClientError::DaemonStartTimeout
                } else {
                    ClientError::DaemonStartFailed(detail)
                });
            }
            tokio::time::sleep(poll_interval()).await;
        }
    }

    /// One request, one response. The write gets a deadline; the read
    /// does not — blocking commands (`listen`, `events --wait`) hold the
    /// connection legitimately.
    pub async fn request(&self, request: &Request) -> Result<Response, ClientError> {
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (read_half, mut write_half) = stream.into_split();

        let mut bytes = serde_json::to_vec(request)
            .map_err(|e| ClientError::Protocol(ProtocolError::Json(e)))?;
        bytes.push(b'\n');
        tokio::time::timeout(timeout_ipc(), async {
            use tokio::io::AsyncWriteExt;
            write_half.write_all(&bytes).await?;
            write_half.flush().await
        })
        .await
        .map_err(|_| ClientError::Protocol(ProtocolError::Timeout))??;

        let mut reader = BufReader::new(read_half);
        Ok(protocol::read_response(&mut reader).await?)
    }
}

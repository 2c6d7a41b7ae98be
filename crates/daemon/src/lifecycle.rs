// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: paths, single-instance lock, startup and shutdown.

use fs2::FileExt;
use hcom_core::Config;
use hcom_engine::Runtime;
use std::fs::File;
use std::io::Write as _;
use std::path::PathBuf;
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::info;

/// Errors from daemon startup/shutdown
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("another hcomd is already running")]
    LockFailed(#[source] std::io::Error),

    #[error("could not determine home directory")]
    NoHomeDir,

    #[error("engine error: {0}")]
    Engine(#[from] hcom_engine::EngineError),

    #[error("config error: {0}")]
    Config(#[from] hcom_core::ConfigError),
}

/// Daemon paths under the store root.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Root directory (HCOM_DIR, default ~/.hcom); also the store dir
    pub root: PathBuf,
    pub socket_path: PathBuf,
    pub pid_path: PathBuf,
    /// Version file under .tmp/, read by clients for mismatch detection
    pub version_path: PathBuf,
    pub log_path: PathBuf,
}

impl DaemonConfig {
    /// Resolve paths from `HCOM_DIR` (the daemon's own environment) or
    /// `~/.hcom`.
    pub fn load() -> Result<Self, LifecycleError> {
        let root = match std::env::var("HCOM_DIR") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::home_dir()
                .ok_or(LifecycleError::NoHomeDir)?
                .join(".hcom"),
        };
        Ok(Self::at(root))
    }

    /// Paths rooted at an explicit directory.
    pub fn at(root: PathBuf) -> Self {
        Self {
            socket_path: root.join("hcomd.sock"),
            pid_path: root.join("hcomd.pid"),
            version_path: root.join(".tmp").join("daemon.version"),
            log_path: root.join(".tmp").join("logs").join("hcomd.log"),
            root,
        }
    }
}

/// A started daemon: the engine runtime plus the socket to serve.
pub struct Startup {
    pub runtime: Runtime,
    pub listener: UnixListener,
    // NOTE(lifetime): held to maintain the exclusive pidfile lock
    #[allow(dead_code)]
    lock_file: File,
}

/// Acquire the lock, bind the socket, open the store.
pub fn startup(config: &DaemonConfig) -> Result<Startup, LifecycleError> {
    std::fs::create_dir_all(&config.root)?;
    std::fs::create_dir_all(config.root.join(".tmp").join("logs"))?;

    // Single-instance guarantee via pidfile lock
    let mut lock_file = File::options()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&config.pid_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    // A leftover socket from a dead daemon would fail the bind
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)?;

    // Version file lets a stale client force a restart
    if let Some(parent) = config.version_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&config.version_path, env!("CARGO_PKG_VERSION"))?;

    let app_config = Config::load(&config.root)?;
    let runtime = Runtime::open(&config.root, app_config)?;

    info!(root = %config.root.display(), "daemon started");
    Ok(Startup {
        runtime,
        listener,
        lock_file,
    })
}

/// Release runtime resources and remove the socket.
pub fn shutdown(config: &DaemonConfig, runtime: &Runtime) {
    {
        let mut store = runtime.store().lock();
        if let Err(e) = store.flush() {
            tracing::error!(error = %e, "final flush failed");
        }
    }
    let _ = std::fs::remove_file(&config.socket_path);
    let _ = std::fs::remove_file(&config.pid_path);
    info!("daemon stopped");
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;

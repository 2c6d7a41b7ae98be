// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon wire protocol: JSON-lines over a Unix stream socket.
//!
//! One JSON object per request, terminated by `\n`, max 16 MiB. The
//! response mirrors the request id so clients can sanity-check pipelined
//! traffic (in practice: one request per connection).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Protocol version clients must send
pub const PROTOCOL_VERSION: u32 = 1;

/// Maximum request size (16 MiB)
pub const MAX_REQUEST_SIZE: usize = 16 * 1024 * 1024;

/// Default I/O timeout for one request/response exchange
pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Request too large: {size} bytes (max {max})")]
    RequestTooLarge { size: usize, max: usize },

    #[error("Unsupported protocol version {0}")]
    VersionMismatch(u32),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout")]
    Timeout,
}

/// What kind of entry point produced this request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Hook,
    Cli,
}

/// One request from a hook or CLI shim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub version: u32,
    pub request_id: String,
    pub kind: RequestKind,
    pub argv: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub cwd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdin: Option<String>,
    #[serde(default)]
    pub stdin_is_tty: bool,
    #[serde(default)]
    pub stdout_is_tty: bool,
    /// Hook type from argv, for `kind = hook`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook_type: Option<String>,
}

impl Request {
    pub fn cli(argv: Vec<String>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            request_id: uuid::Uuid::new_v4().to_string(),
            kind: RequestKind::Cli,
            argv,
            env: HashMap::new(),
            cwd: String::new(),
            stdin: None,
            stdin_is_tty: false,
            stdout_is_tty: false,
            hook_type: None,
        }
    }
}

/// Captured outcome of one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub exit_code: i32,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    pub request_id: String,
}

impl Response {
    pub fn for_request(request_id: &str, exit_code: i32, stdout: String, stderr: String) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            request_id: request_id.to_string(),
        }
    }
}

/// Read one newline-terminated request, enforcing the size cap.
pub async fn read_request<R>(reader: &mut BufReader<R>) -> Result<Request, ProtocolError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    use tokio::io::AsyncReadExt;

    // The +1 lets an exactly-at-cap request through and detects overflow
    let mut limited = reader.take((MAX_REQUEST_SIZE + 1) as u64);
    let mut line = String::new();
    let n = limited.read_line(&mut line).await?;
    if n == 0 {
        return Err(ProtocolError::ConnectionClosed);
    }
    let trimmed = line.trim_end_matches('\n');
    if trimmed.len() > MAX_REQUEST_SIZE {
        return Err(ProtocolError::RequestTooLarge {
            size: trimmed.len(),
            max: MAX_REQUEST_SIZE,
        });
    }

    let request: Request = serde_json::from_str(trimmed)?;
    if request.version != PROTOCOL_VERSION {
        return Err(ProtocolError::VersionMismatch(request.version));
    }
    Ok(request)
}

/// Write one newline-terminated response.
pub async fn write_response<W>(writer: &mut W, response: &Response) -> Result<(), ProtocolError>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let mut bytes = serde_json::to_vec(response)?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one newline-terminated response (client side).
pub async fn read_response<R>(reader: &mut BufReader<R>) -> Result<Response, ProtocolError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(ProtocolError::ConnectionClosed);
    }
    Ok(serde_json::from_str(line.trim_end())?)
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;

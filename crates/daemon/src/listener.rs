// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task: accepts socket connections, one task per request.
//!
//! Blocking commands (`listen`, `events --wait`) hold their connection;
//! everything else answers in microseconds. The listener tracks in-flight
//! requests so shutdown can drain them, and stamps activity for the idle
//! timeout.

use crate::dispatch::handle_request;
use crate::protocol::{self, Response};
use hcom_engine::Runtime;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, warn};

/// Shared listener state: activity stamp + in-flight count.
pub struct ListenCtx {
    pub runtime: Runtime,
    pub last_request: Mutex<Instant>,
    pub in_flight: AtomicUsize,
}

impl ListenCtx {
    pub fn new(runtime: Runtime) -> Self {
        Self {
            runtime,
            last_request: Mutex::new(Instant::now()),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Seconds since the last request finished or arrived.
    pub fn idle_for(&self) -> Duration {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            return Duration::ZERO;
        }
        self.last_request.lock().elapsed()
    }
}

/// Accept loop. Runs until the surrounding select drops it.
pub async fn run(listener: UnixListener, ctx: Arc<ListenCtx>) {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    ctx.in_flight.fetch_add(1, Ordering::SeqCst);
                    if let Err(e) = handle_connection(stream, &ctx).await {
                        match e {
                            protocol::ProtocolError::ConnectionClosed => {
                                debug!("client disconnected")
                            }
                            protocol::ProtocolError::Timeout => warn!("connection timeout"),
                            _ => error!("connection error: {e}"),
                        }
                    }
                    ctx.in_flight.fetch_sub(1, Ordering::SeqCst);
                    *ctx.last_request.lock() = Instant::now();
                });
            }
            Err(e) => {
                error!("accept error: {e}");
            }
        }
    }
}

async fn handle_connection(
    stream: UnixStream,
    ctx: &ListenCtx,
) -> Result<(), protocol::ProtocolError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    // The read gets a deadline; the request itself may block (listen)
    let request = match tokio::time::timeout(
        protocol::DEFAULT_TIMEOUT,
        protocol::read_request(&mut reader),
    )
    .await
    {
        Ok(Ok(request)) => request,
        Ok(Err(protocol::ProtocolError::VersionMismatch(version))) => {
            // Old client: answer with an error instead of hanging it
            let response = Response::for_request(
                "",
                1,
                String::new(),
                format!("protocol version {version} not supported\n"),
            );
            protocol::write_response(&mut write_half, &response).await?;
            return Ok(());
        }
        Ok(Err(e)) => return Err(e),
        Err(_) => return Err(protocol::ProtocolError::Timeout),
    };

    debug!(request_id = %request.request_id, argv = ?request.argv, "request");
    let response = handle_request(&ctx.runtime, &request).await;
    protocol::write_response(&mut write_half, &response).await?;
    Ok(())
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;

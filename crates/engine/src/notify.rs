// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local TCP wake endpoints.
//!
//! Waking is "connect, send one byte, close". Readability is an advisory
//! signal, never a message carrier: a single wake byte may coalesce many
//! pending messages, so consumers re-check the store after every wake.
//! The endpoint table is advisory and self-pruning — any connect failure
//! deletes the row.

use crate::runtime::SharedStore;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

/// Connect timeout for a wake attempt; receivers are local
const WAKE_CONNECT_TIMEOUT: Duration = Duration::from_millis(250);

/// Receiver side: a listener on an ephemeral localhost port.
pub struct NotifyWaiter {
    listener: TcpListener,
    port: u16,
}

impl NotifyWaiter {
    /// Bind `127.0.0.1:0` and report the assigned port.
    pub async fn bind() -> io::Result<Self> {
        let listener =
            TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)).await?;
        let port = listener.local_addr()?.port();
        Ok(Self { listener, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Block until woken or timeout. Returns true when a wake arrived.
    /// The connection is drained and dropped; the byte carries nothing.
    pub async fn wait(&self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.listener.accept()).await {
            Ok(Ok((stream, _))) => {
                drop(stream);
                // Coalesce any wakes that queued up behind this one
                while let Ok(Ok((stream, _))) =
                    tokio::time::timeout(Duration::from_millis(1), self.listener.accept()).await
                {
                    drop(stream);
                }
                true
            }
            _ => false,
        }
    }
}

/// Sender side: wakes the registered endpoints of target instances.
#[derive(Clone, Copy, Default)]
pub struct NotifyBus;

impl NotifyBus {
    /// Wake every endpoint registered for `instance`. Best-effort: failed
    /// connects prune the endpoint row.
    pub async fn wake_instance(&self, store: &SharedStore, instance: &str) {
        let ports = {
            let store = store.lock();
            store.registry().list_notify_ports(instance)
        };
        if ports.is_empty() {
            return;
        }

        let mut dead = Vec::new();
        for port in ports {
            if !Self::send_wake(port).await {
                dead.push(port);
            }
        }

        if !dead.is_empty() {
            let mut store = store.lock();
            store.with_registry(|registry| {
                for port in &dead {
                    registry.delete_notify_endpoint(instance, None, Some(*port));
                }
            });
            debug!(instance, pruned = dead.len(), "pruned dead notify endpoints");
        }
    }

    /// One wake per delivered instance. Cross-device names (`name:DEV`)
    /// have no local endpoints and are skipped; the relay carries those.
    ///
    /// `delivered_to` carries full names; endpoints are keyed by base name.
    pub async fn wake_all(&self, store: &SharedStore, delivered_to: &[String]) {
        let base_names: Vec<String> = {
            let store = store.lock();
            delivered_to
                .iter()
                .filter(|name| !name.contains(':'))
                .filter_map(|name| store.registry().find_instance(name).map(|i| i.name.clone()))
                .collect()
        };
        for name in base_names {
            self.wake_instance(store, &name).await;
        }
    }

    /// Wake raw ports directly. Used after an instance row is deleted
    /// (stop), so listeners wake up and observe the row is gone.
    pub async fn wake_ports(&self, ports: &[u16]) {
        for &port in ports {
            let _ = Self::send_wake(port).await;
        }
    }

    async fn send_wake(port: u16) -> bool {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
        let connect = tokio::time::timeout(WAKE_CONNECT_TIMEOUT, TcpStream::connect(addr)).await;
        match connect {
            Ok(Ok(mut stream)) => {
                let _ = stream.write_all(&[1u8]).await;
                let _ = stream.shutdown().await;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;

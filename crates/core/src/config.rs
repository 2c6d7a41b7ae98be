// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed configuration with pass-through for unrecognised keys.
//!
//! Loaded from `HCOM_DIR/config.toml`. Recognised keys land in typed
//! fields with validation; everything else is kept verbatim in `extra`
//! for external tools that read the same file.

use indexmap::IndexMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors from config load/update
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
    #[error("staleness thresholds must keep tcp > adhoc ({tcp} <= {adhoc})")]
    StalenessOrder { tcp: u64, adhoc: u64 },
}

/// Recognised configuration keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    MaxMessagesPerDelivery,
    MaxMessageBytes,
    RelayEnabled,
    StaleListenTcpSecs,
    StaleListenAdhocSecs,
    StaleExitSecs,
    StaleListeningSecs,
    StaleInactiveSecs,
    RetryInitialMs,
    RetryMultiplier,
    RetryWarmMaximumMs,
    RetryWarmSecs,
    RetryColdMaximumMs,
    MaxVerifyRetries,
    UserActivityCooldownMs,
    OutputStableSecs,
    DaemonIdleTimeoutSecs,
}

impl ConfigKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::MaxMessagesPerDelivery => "max_messages_per_delivery",
            ConfigKey::MaxMessageBytes => "max_message_bytes",
            ConfigKey::RelayEnabled => "relay_enabled",
            ConfigKey::StaleListenTcpSecs => "stale_listen_tcp_secs",
            ConfigKey::StaleListenAdhocSecs => "stale_listen_adhoc_secs",
            ConfigKey::StaleExitSecs => "stale_exit_secs",
            ConfigKey::StaleListeningSecs => "stale_listening_secs",
            ConfigKey::StaleInactiveSecs => "stale_inactive_secs",
            ConfigKey::RetryInitialMs => "retry_initial_ms",
            ConfigKey::RetryMultiplier => "retry_multiplier",
            ConfigKey::RetryWarmMaximumMs => "retry_warm_maximum_ms",
            ConfigKey::RetryWarmSecs => "retry_warm_secs",
            ConfigKey::RetryColdMaximumMs => "retry_cold_maximum_ms",
            ConfigKey::MaxVerifyRetries => "max_verify_retries",
            ConfigKey::UserActivityCooldownMs => "user_activity_cooldown_ms",
            ConfigKey::OutputStableSecs => "output_stable_secs",
            ConfigKey::DaemonIdleTimeoutSecs => "daemon_idle_timeout_secs",
        }
    }

    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::MaxMessagesPerDelivery,
            ConfigKey::MaxMessageBytes,
            ConfigKey::RelayEnabled,
            ConfigKey::StaleListenTcpSecs,
            ConfigKey::StaleListenAdhocSecs,
            ConfigKey::StaleExitSecs,
            ConfigKey::StaleListeningSecs,
            ConfigKey::StaleInactiveSecs,
            ConfigKey::RetryInitialMs,
            ConfigKey::RetryMultiplier,
            ConfigKey::RetryWarmMaximumMs,
            ConfigKey::RetryWarmSecs,
            ConfigKey::RetryColdMaximumMs,
            ConfigKey::MaxVerifyRetries,
            ConfigKey::UserActivityCooldownMs,
            ConfigKey::OutputStableSecs,
            ConfigKey::DaemonIdleTimeoutSecs,
        ]
    }
}

impl FromStr for ConfigKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::all()
            .iter()
            .find(|k| k.as_str() == s)
            .copied()
            .ok_or(())
    }
}

/// Runtime configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Cap on one delivery batch; earlier messages stay unread for the next round
    pub max_messages_per_delivery: usize,
    /// Message text size cap in bytes
    pub max_message_bytes: usize,
    /// Whether cross-device targets are deliverable
    pub relay_enabled: bool,
    /// Listening heartbeat staleness with a TCP notify listener attached
    pub stale_listen_tcp_secs: u64,
    /// Listening heartbeat staleness without one (adhoc)
    pub stale_listen_adhoc_secs: u64,
    /// Cleanup age for instances in `exit:*` contexts
    pub stale_exit_secs: u64,
    /// Cleanup age for listening instances whose heartbeat died
    pub stale_listening_secs: u64,
    /// Cleanup age for other inactive instances
    pub stale_inactive_secs: u64,
    pub retry_initial_ms: u64,
    pub retry_multiplier: f64,
    pub retry_warm_maximum_ms: u64,
    pub retry_warm_secs: u64,
    pub retry_cold_maximum_ms: u64,
    pub max_verify_retries: u32,
    pub user_activity_cooldown_ms: u64,
    pub output_stable_secs: f64,
    pub daemon_idle_timeout_secs: u64,
    /// Unrecognised keys, preserved for pass-through
    pub extra: IndexMap<String, toml::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_messages_per_delivery: 50,
            max_message_bytes: 64 * 1024,
            relay_enabled: false,
            stale_listen_tcp_secs: 35,
            stale_listen_adhoc_secs: 10,
            stale_exit_secs: 60,
            stale_listening_secs: 3600,
            stale_inactive_secs: 12 * 3600,
            retry_initial_ms: 250,
            retry_multiplier: 2.0,
            retry_warm_maximum_ms: 2000,
            retry_warm_secs: 60,
            retry_cold_maximum_ms: 5000,
            max_verify_retries: 5,
            user_activity_cooldown_ms: 500,
            output_stable_secs: 1.0,
            daemon_idle_timeout_secs: 30 * 60,
            extra: IndexMap::new(),
        }
    }
}

impl Config {
    /// Load from `<dir>/config.toml`; a missing file is the defaults.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join("config.toml");
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let table: toml::Table = content.parse()?;
        Self::from_table(table)
    }

    pub fn from_table(table: toml::Table) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for (key, value) in table {
            match key.parse::<ConfigKey>() {
                Ok(known) => config.apply(known, &value)?,
                Err(()) => {
                    config.extra.insert(key, value);
                }
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Apply one recognised key. Type mismatches are `InvalidValue`.
    pub fn apply(&mut self, key: ConfigKey, value: &toml::Value) -> Result<(), ConfigError> {
        match key {
            ConfigKey::MaxMessagesPerDelivery => {
                self.max_messages_per_delivery = positive_int(key, value)? as usize;
            }
            ConfigKey::MaxMessageBytes => {
                self.max_message_bytes = positive_int(key, value)? as usize;
            }
            ConfigKey::RelayEnabled => {
                self.relay_enabled = value.as_bool().ok_or_else(|| invalid(key, "expected bool"))?;
            }
            ConfigKey::StaleListenTcpSecs => self.stale_listen_tcp_secs = positive_int(key, value)?,
            ConfigKey::StaleListenAdhocSecs => {
                self.stale_listen_adhoc_secs = positive_int(key, value)?;
            }
            ConfigKey::StaleExitSecs => self.stale_exit_secs = positive_int(key, value)?,
            ConfigKey::StaleListeningSecs => self.stale_listening_secs = positive_int(key, value)?,
            ConfigKey::StaleInactiveSecs => self.stale_inactive_secs = positive_int(key, value)?,
            ConfigKey::RetryInitialMs => self.retry_initial_ms = positive_int(key, value)?,
            ConfigKey::RetryMultiplier => {
                self.retry_multiplier = positive_float(key, value)?;
            }
            ConfigKey::RetryWarmMaximumMs => self.retry_warm_maximum_ms = positive_int(key, value)?,
            ConfigKey::RetryWarmSecs => self.retry_warm_secs = positive_int(key, value)?,
            ConfigKey::RetryColdMaximumMs => self.retry_cold_maximum_ms = positive_int(key, value)?,
            ConfigKey::MaxVerifyRetries => {
                self.max_verify_retries = positive_int(key, value)? as u32;
            }
            ConfigKey::UserActivityCooldownMs => {
                self.user_activity_cooldown_ms = positive_int(key, value)?;
            }
            ConfigKey::OutputStableSecs => self.output_stable_secs = positive_float(key, value)?,
            ConfigKey::DaemonIdleTimeoutSecs => {
                self.daemon_idle_timeout_secs = positive_int(key, value)?;
            }
        }
        Ok(())
    }

    /// Cross-field validation. The TCP-attached staleness threshold must
    /// stay above the adhoc one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stale_listen_tcp_secs <= self.stale_listen_adhoc_secs {
            return Err(ConfigError::StalenessOrder {
                tcp: self.stale_listen_tcp_secs,
                adhoc: self.stale_listen_adhoc_secs,
            });
        }
        Ok(())
    }
}

fn invalid(key: ConfigKey, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.as_str().to_string(),
        message: message.to_string(),
    }
}

fn positive_int(key: ConfigKey, value: &toml::Value) -> Result<u64, ConfigError> {
    match value.as_integer() {
        Some(n) if n > 0 => Ok(n as u64),
        Some(_) => Err(invalid(key, "must be positive")),
        None => Err(invalid(key, "expected integer")),
    }
}

fn positive_float(key: ConfigKey, value: &toml::Value) -> Result<f64, ConfigError> {
    let n = value
        .as_float()
        .or_else(|| value.as_integer().map(|i| i as f64))
        .ok_or_else(|| invalid(key, "expected number"))?;
    if n <= 0.0 {
        return Err(invalid(key, "must be positive"));
    }
    Ok(n)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

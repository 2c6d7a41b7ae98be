// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn parse(toml_src: &str) -> Result<Config, ConfigError> {
    let table: toml::Table = toml_src.parse().unwrap();
    Config::from_table(table)
}

#[test]
fn defaults_are_spec_values() {
    let config = Config::default();
    assert_eq!(config.max_messages_per_delivery, 50);
    assert_eq!(config.stale_listen_tcp_secs, 35);
    assert_eq!(config.stale_listen_adhoc_secs, 10);
    assert_eq!(config.retry_warm_maximum_ms, 2000);
    assert_eq!(config.retry_cold_maximum_ms, 5000);
    assert_eq!(config.max_verify_retries, 5);
    assert!(config.validate().is_ok());
}

#[test]
fn recognised_keys_are_typed() {
    let config = parse("max_messages_per_delivery = 10\nrelay_enabled = true\n").unwrap();
    assert_eq!(config.max_messages_per_delivery, 10);
    assert!(config.relay_enabled);
}

#[test]
fn unknown_keys_pass_through() {
    let config = parse("launcher_terminal = \"kitty\"\nmax_message_bytes = 1024\n").unwrap();
    assert_eq!(config.max_message_bytes, 1024);
    assert_eq!(
        config.extra.get("launcher_terminal").and_then(|v| v.as_str()),
        Some("kitty")
    );
}

#[test]
fn type_mismatch_is_an_error() {
    let err = parse("max_messages_per_delivery = \"many\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }));
}

#[test]
fn zero_is_rejected_for_counts() {
    let err = parse("max_verify_retries = 0\n").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }));
}

#[test]
fn staleness_must_stay_monotone() {
    let err = parse("stale_listen_tcp_secs = 5\nstale_listen_adhoc_secs = 10\n").unwrap_err();
    assert!(matches!(err, ConfigError::StalenessOrder { .. }));
}

#[test]
fn float_accepts_integer_literals() {
    let config = parse("output_stable_secs = 2\n").unwrap();
    assert_eq!(config.output_stable_secs, 2.0);
}

#[test]
fn missing_file_is_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(dir.path()).unwrap();
    assert_eq!(config, Config::default());
}

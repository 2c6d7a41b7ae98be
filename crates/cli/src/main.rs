// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! hcom - inter-agent messaging CLI
//!
//! A thin shim: commands are forwarded to the daemon (started on demand),
//! which executes them against the store and returns captured output.
//! Only daemon management itself runs locally.

mod client;
mod daemon_process;

use anyhow::Result;
use clap::{Parser, Subcommand};
use client::{ClientError, DaemonClient};
use hcom_daemon::{Request, RequestKind};
use std::collections::HashMap;
use std::io::{IsTerminal, Read, Write};

#[derive(Parser)]
#[command(
    name = "hcom",
    version,
    about = "hcom - typed messaging between co-resident AI coding assistants",
    after_help = "\
EXAMPLES:
    hcom send @luna -- review the diff      message one instance
    hcom send -- stand-up in 5              broadcast
    hcom listen 30                          wait for messages
    hcom events --last 20                   recent events
    hcom start --name nora                  join as a named instance
    hcom list                               who's here"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Daemon management
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
    /// Everything else executes in the daemon (send, listen, events,
    /// start, stop, kill, list, reset, hook)
    #[command(external_subcommand)]
    Forward(Vec<String>),
}

#[derive(Subcommand)]
enum DaemonAction {
    /// Start the daemon if it isn't running
    Start,
    /// Stop a running daemon
    Stop,
    /// Report whether the daemon is up
    Status,
}

/// Commands that mutate state auto-start the daemon; queries connect only.
fn is_action_command(name: &str) -> bool {
    !matches!(name, "list" | "events")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Daemon { action } => run_daemon_action(action).await?,
        Commands::Forward(argv) => run_forwarded(argv).await?,
    };
    std::process::exit(code);
}

async fn run_daemon_action(action: DaemonAction) -> Result<i32> {
    match action {
        DaemonAction::Start => match DaemonClient::for_action().await {
            Ok(_) => {
                println!("daemon running");
                Ok(0)
            }
            Err(e) => {
                eprintln!("{e}");
                Ok(1)
            }
        },
        DaemonAction::Stop => {
            let stopped = daemon_process::stop_daemon()?;
            println!("{}", if stopped { "daemon stopped" } else { "daemon not running" });
            Ok(0)
        }
        DaemonAction::Status => match DaemonClient::for_query().await {
            Ok(_) => {
                println!("daemon running");
                Ok(0)
            }
            Err(ClientError::DaemonNotRunning) => {
                println!("daemon not running");
                Ok(1)
            }
            Err(e) => {
                eprintln!("{e}");
                Ok(1)
            }
        },
    }
}

async fn run_forwarded(argv: Vec<String>) -> Result<i32> {
    let Some(first) = argv.first().cloned() else {
        eprintln!("no command given (try --help)");
        return Ok(1);
    };

    let client = if is_action_command(&first) {
        DaemonClient::for_action().await
    } else {
        DaemonClient::for_query().await
    };
    let client = match client {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{e}");
            return Ok(1);
        }
    };

    let request = build_request(argv);
    let response = match client.request(&request).await {
        Ok(response) => response,
        Err(e) => {
            eprintln!("{e}");
            return Ok(1);
        }
    };

    // Replay captured output verbatim
    if !response.stdout.is_empty() {
        print!("{}", response.stdout);
        let _ = std::io::stdout().flush();
    }
    if !response.stderr.is_empty() {
        eprint!("{}", response.stderr);
    }
    Ok(response.exit_code)
}

/// Build the daemon request from raw argv. `hook <type>` requests carry
/// stdin and the hook type; everything else is a CLI request.
fn build_request(argv: Vec<String>) -> Request {
    let is_hook = argv.first().map(String::as_str) == Some("hook");

    let stdin_is_tty = std::io::stdin().is_terminal();
    let stdin = if is_hook && !stdin_is_tty {
        let mut buffer = String::new();
        let _ = std::io::stdin().read_to_string(&mut buffer);
        Some(buffer)
    } else {
        None
    };

    let mut request = Request::cli(argv.clone());
    request.env = forwarded_env();
    request.cwd = std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    request.stdin_is_tty = stdin_is_tty;
    request.stdout_is_tty = std::io::stdout().is_terminal();

    if is_hook {
        request.kind = RequestKind::Hook;
        request.hook_type = argv.get(1).cloned();
        request.stdin = stdin;
    }
    request
}

/// Environment the daemon needs to resolve identity and tool.
fn forwarded_env() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| {
            key.starts_with("HCOM_")
                || key.starts_with("CODEX_SANDBOX")
                || key == "CLAUDECODE"
                || key == "CLAUDE_ENV_FILE"
                || key == "GEMINI_CLI"
        })
        .collect()
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;

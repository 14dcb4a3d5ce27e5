// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! quay — node daemon for containerized application instances.
//!
//! Running without a subcommand starts the daemon. Exit codes: 0 on
//! clean shutdown, 1 for fatal configuration problems, 2 when the
//! control plane is unreachable at startup.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod diagnostics;

use clap::{Parser, Subcommand};
use quay_daemon::{serve, DaemonConfig, DaemonError};
use std::path::PathBuf;
use std::process::ExitCode;

const EXIT_CONFIG: u8 = 1;
const EXIT_REMOTE_UNREACHABLE: u8 = 2;

#[derive(Parser)]
#[command(name = "quay", version, about = "Node daemon for containerized application instances")]
struct Cli {
    /// Path to the daemon configuration file.
    #[arg(long, global = true, default_value = "/etc/quay/config.yml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the node daemon (the default).
    Daemon,
    /// Print version information.
    Version,
    /// Print a redacted snapshot of the local configuration.
    Diagnostics,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Daemon) {
        Command::Version => {
            println!("quay {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Command::Diagnostics => diagnostics::run(&cli.config),
        Command::Daemon => run_daemon(&cli.config),
    }
}

fn run_daemon(config_path: &std::path::Path) -> ExitCode {
    let config = match DaemonConfig::load(config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("quay: configuration error: {err}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let _log_guard = match quay_daemon::boot::init_logging(&config) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("quay: could not open log directory: {err}");
            None
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("quay: failed to start async runtime: {err}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    match runtime.block_on(serve(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(DaemonError::RemoteUnreachable(err)) => {
            eprintln!("quay: control plane unreachable: {err}");
            ExitCode::from(EXIT_REMOTE_UNREACHABLE)
        }
        Err(DaemonError::Config(err)) => {
            eprintln!("quay: configuration error: {err}");
            ExitCode::from(EXIT_CONFIG)
        }
        Err(err) => {
            eprintln!("quay: {err}");
            ExitCode::from(EXIT_CONFIG)
        }
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Election Management Service
//!
//! The `election-mgmt` binary hosts the secured election management API and
//! ships the operator tooling for its security envelope.
//!
//! ## Commands
//!
//! - `election-mgmt serve` - Run the HTTP service behind the request guard
//! - `election-mgmt keys check` - Load and report the configured key material
//! - `election-mgmt envelope seal|open` - Produce or inspect security envelopes
//!
//! Settings are read from the environment; a `.env` file in the working
//! directory is loaded first when present.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use election_mgmt::commands::{self, EnvelopeCommand, KeysCommand, ServeArgs};

/// Election management service with signed, encrypted request envelopes
#[derive(Parser)]
#[command(name = "election-mgmt")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "ELECTION_MGMT_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    #[command(name = "serve")]
    Serve(ServeArgs),

    /// Key material diagnostics
    #[command(name = "keys")]
    Keys {
        #[command(subcommand)]
        command: KeysCommand,
    },

    /// Security envelope tooling
    #[command(name = "envelope")]
    Envelope {
        #[command(subcommand)]
        command: EnvelopeCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine; the process environment still applies.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Serve(args)) => commands::serve::execute(args).await,
        Some(Commands::Keys { command }) => commands::keys::handle_command(command).await,
        Some(Commands::Envelope { command }) => commands::envelope::handle_command(command).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    Ok(())
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `fly` - the agent's command-line surface

mod commands;
mod exit_error;
mod logging;
mod output;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use fa_client::ClientError;

use crate::commands::agent::{self, AgentArgs, AgentCommand};
use crate::exit_error::ExitError;
use crate::logging::LogTarget;
use crate::output::OutputFormat;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_GIT_HASH"), ")");

#[derive(Parser)]
#[command(name = "fly", version = VERSION, about = "Shared tunnels and credentials for fly")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the background agent
    Agent(AgentArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let target = match &cli.command {
        Commands::Agent(AgentArgs { command: AgentCommand::Run { log: Some(path) } }) => {
            LogTarget::File(path.clone())
        }
        Commands::Agent(AgentArgs { command: AgentCommand::Run { log: None } }) => {
            LogTarget::Stderr { default_level: "info" }
        }
        Commands::Agent(_) => LogTarget::Stderr { default_level: "warn" },
    };
    // Flushes buffered log lines when dropped
    let _guard = match logging::init(&target) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to set up logging: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Agent(args) => agent::agent(args, cli.output).await,
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(e),
    }
}

fn report(err: anyhow::Error) -> ExitCode {
    if let Some(exit) = err.downcast_ref::<ExitError>() {
        if !exit.message.is_empty() {
            eprintln!("{}", exit.message);
        }
        return ExitCode::from(exit.code);
    }
    if let Some(ClientError::Start(start)) = err.downcast_ref::<ClientError>().map(|e| e.root()) {
        eprintln!("{}", start.description());
        return ExitCode::FAILURE;
    }
    eprintln!("Error: {err:#}");
    ExitCode::FAILURE
}

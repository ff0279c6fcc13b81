// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `fly agent` - run, start, stop and inspect the background agent

mod run;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use fa_client::{default_transport, latest_log, Client, ClientError, Supervisor};
use fa_core::{Paths, TokenSet};
use tokio_util::sync::CancellationToken;

use crate::exit_error::ExitError;
use crate::output::{format_or_json, read_last_lines, tail_file, OutputFormat};

/// How long `restart` waits for the old agent to stop answering
const STOP_TIMEOUT: Duration = Duration::from_secs(5);
const STOP_POLL: Duration = Duration::from_millis(50);

#[derive(Args)]
pub struct AgentArgs {
    #[command(subcommand)]
    pub command: AgentCommand,
}

#[derive(Subcommand)]
pub enum AgentCommand {
    /// Run the agent in this process
    Run {
        /// Log to this file; agents started with a log file report
        /// themselves as background agents
        log: Option<PathBuf>,
    },
    /// Start the background agent, replacing an out-of-date one
    Start,
    /// Stop the running agent
    Stop,
    /// Stop the running agent and start a new one
    Restart,
    /// Report the running agent's PID and version
    Ping,
    /// View the most recent agent log
    Logs {
        /// Number of recent lines to show
        #[arg(short = 'n', long, default_value = "200")]
        limit: usize,
        /// Show all lines (no limit)
        #[arg(long, conflicts_with = "limit")]
        no_limit: bool,
        /// Follow log output
        #[arg(long, short)]
        follow: bool,
    },
}

pub async fn agent(args: AgentArgs, format: OutputFormat) -> Result<()> {
    match args.command {
        AgentCommand::Run { log } => run::run(log.is_some()).await,
        AgentCommand::Start => start(format).await,
        AgentCommand::Stop => stop(format).await,
        AgentCommand::Restart => restart(format).await,
        AgentCommand::Ping => ping(format).await,
        AgentCommand::Logs { limit, no_limit, follow } => {
            logs((!no_limit).then_some(limit), follow, format).await
        }
    }
}

/// This binary's version, as reported to and compared with agents.
pub(crate) fn build_version() -> Result<semver::Version> {
    Ok(semver::Version::parse(env!("CARGO_PKG_VERSION"))?)
}

fn supervisor(paths: Paths) -> Result<Supervisor> {
    let tokens = TokenSet::load(&paths.config_file())?;
    Ok(Supervisor::new(paths, build_version()?, tokens)?)
}

async fn start(format: OutputFormat) -> Result<()> {
    let cancel = CancellationToken::new();
    let client = supervisor(Paths::load()?)?.establish(&cancel).await?;
    let running = client.ping(&cancel).await?;
    format_or_json(format, &running, || {
        println!("Agent running (PID {}, v{})", running.pid, running.version)
    })
}

async fn stop(format: OutputFormat) -> Result<()> {
    let paths = Paths::load()?;
    let client = Client::new(default_transport(&paths));
    let stopped = kill(&client).await?;
    let obj = serde_json::json!({ "stopped": stopped });
    format_or_json(format, &obj, || {
        if stopped {
            println!("Agent stopped");
        } else {
            println!("Agent not running");
        }
    })
}

async fn restart(format: OutputFormat) -> Result<()> {
    let paths = Paths::load()?;
    let client = Client::new(default_transport(&paths));
    if kill(&client).await? {
        wait_until_stopped(&client, &paths).await?;
    }
    start(format).await
}

async fn ping(format: OutputFormat) -> Result<()> {
    let paths = Paths::load()?;
    let client = Client::new(default_transport(&paths));
    let running = match client.ping(&CancellationToken::new()).await {
        Ok(running) => running,
        Err(e) if matches!(e.root(), ClientError::NotRunning) => {
            return Err(ExitError::not_running().into())
        }
        Err(e) => return Err(e.into()),
    };
    format_or_json(format, &running, || {
        println!("PID: {}", running.pid);
        println!("Version: {}", running.version);
        println!("Background: {}", running.background);
    })
}

async fn logs(limit: Option<usize>, follow: bool, format: OutputFormat) -> Result<()> {
    let paths = Paths::load()?;
    let Some(log_path) = latest_log(&paths.log_dir) else {
        let empty: Vec<String> = vec![];
        let obj = serde_json::json!({ "log_path": null, "lines": empty });
        return format_or_json(format, &obj, || {
            println!("No agent logs found in {}", paths.log_dir.display())
        });
    };

    let lines = read_last_lines(&log_path, limit)?;
    let obj = serde_json::json!({
        "log_path": log_path.to_string_lossy().into_owned(),
        "lines": &lines,
    });
    format_or_json(format, &obj, || {
        for line in &lines {
            println!("{line}");
        }
    })?;
    if follow && format == OutputFormat::Text {
        tail_file(&log_path).await?;
    }
    Ok(())
}

/// Ask the agent to exit. `false` when none was running.
async fn kill(client: &Client) -> Result<bool> {
    match client.kill(&CancellationToken::new()).await {
        Ok(()) => Ok(true),
        Err(e) if matches!(e.root(), ClientError::NotRunning) => Ok(false),
        Err(e) => Err(anyhow!("Failed to stop agent: {e}")),
    }
}

/// Poll until the old agent stops answering and gives up its socket.
#[cfg_attr(not(unix), allow(unused_variables))]
async fn wait_until_stopped(client: &Client, paths: &Paths) -> Result<()> {
    let cancel = CancellationToken::new();
    let stopped = tokio::time::timeout(STOP_TIMEOUT, async {
        while client.ping(&cancel).await.is_ok() {
            tokio::time::sleep(STOP_POLL).await;
        }
        // The exiting agent removes the socket file last
        #[cfg(unix)]
        while paths.socket_path.exists() {
            tokio::time::sleep(STOP_POLL).await;
        }
    })
    .await;
    stopped.map_err(|_| anyhow!("agent still running after {}s", STOP_TIMEOUT.as_secs()))
}

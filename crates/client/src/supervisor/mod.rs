// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Finding, replacing and starting the agent on behalf of a CLI command.
//!
//! Agent starts are serialized across processes by an exclusive lock on
//! `flyctl.agent.start.lock`; a caller that loses the race fails fast
//! rather than forking a second agent.

mod launcher;
mod logs;

pub use launcher::{DaemonLauncher, ExecLauncher, LaunchRequest};
#[cfg(any(test, feature = "test-support"))]
pub use launcher::FakeLauncher;
pub use logs::latest_log;

use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fa_core::{LogTelemetry, Paths, Telemetry, TelemetryEvent, TokenSet};
use fs2::FileExt;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::client::Client;
use crate::error::ClientError;
use crate::transport::{default_transport, Transport};

/// How long a stale agent gets to exit after `kill`
const KILL_GRACE: Duration = Duration::from_secs(1);

const STOP_MESSAGE: &str = "The out-of-date agent will be shut down along with existing \
    wireguard connections. The new agent will start automatically as needed.";

/// Readiness poll interval while a new agent starts
const START_POLL: Duration = Duration::from_millis(50);

/// The agent was started but never answered.
#[derive(Debug, Error)]
#[error("agent: failed to start")]
pub struct StartError {
    pub log_path: PathBuf,
    /// Leading excerpt of the agent's log
    pub log: String,
    #[source]
    pub cause: Box<ClientError>,
}

impl StartError {
    /// Multi-line explanation for the user, including the agent's log.
    pub fn description(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "The agent failed to start with the following error log:");
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", self.log);
        let _ = writeln!(out);
        let _ = write!(out, "A copy of this log has been saved at {}", self.log_path.display());
        out
    }
}

/// Locates or starts the agent for this process.
pub struct Supervisor {
    paths: Paths,
    transport: Arc<dyn Transport>,
    /// Build version; a background agent reporting anything else is
    /// replaced
    version: semver::Version,
    tokens: TokenSet,
    launcher: Arc<dyn DaemonLauncher>,
    telemetry: Arc<dyn Telemetry>,
    start_timeout: Duration,
    kill_grace: Duration,
}

impl Supervisor {
    /// Supervisor for the platform transport, re-executing the current
    /// binary to start agents.
    pub fn new(
        paths: Paths,
        version: semver::Version,
        tokens: TokenSet,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            transport: default_transport(&paths),
            paths,
            version,
            tokens,
            launcher: Arc::new(ExecLauncher::current_exe()?),
            telemetry: Arc::new(LogTelemetry),
            start_timeout: fa_core::env::start_timeout(),
            kill_grace: KILL_GRACE,
        })
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn DaemonLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout = timeout;
        self
    }

    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    /// A client for whatever agent is (or will be) listening.
    pub fn client(&self) -> Client {
        Client::new(Arc::clone(&self.transport)).with_tokens(&self.tokens)
    }

    /// Return a client to a running agent of this build, starting one if
    /// none answers. A background agent of another build is stopped and
    /// replaced; a foreground one is kept.
    pub async fn establish(&self, cancel: &CancellationToken) -> Result<Client, ClientError> {
        let client = self.client();
        let running = match client.ping(cancel).await {
            Ok(running) => running,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                debug!(error = %e, "no agent answered");
                return self.start_daemon(cancel).await;
            }
        };
        if running.version == self.version {
            return Ok(client);
        }

        warn!(
            "The running flyctl agent (v{}) is older than the current flyctl (v{}).",
            running.version, self.version
        );
        if !running.background {
            return Ok(client);
        }

        warn!("{STOP_MESSAGE}");
        if let Err(e) = client.kill(cancel).await {
            let e = e.context("failed stopping agent");
            error!(error = %e, "kill failed");
            return Err(e);
        }
        tokio::select! {
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            _ = sleep(self.kill_grace) => {}
        }
        self.start_daemon(cancel).await
    }

    /// Start a new agent and wait for it to answer.
    pub async fn start_daemon(&self, cancel: &CancellationToken) -> Result<Client, ClientError> {
        let log_path = {
            let _lock = self.lock(cancel)?;
            let log_path = logs::create_log_file(&self.paths.log_dir)?;
            let request = LaunchRequest { log_path, api_token: self.tokens.graphql() };
            match self.launcher.launch(&request).await {
                Ok(pid) => debug!(pid, log = %request.log_path.display(), "started agent process"),
                Err(e) => {
                    let e = ClientError::Launch(e);
                    self.telemetry.capture(TelemetryEvent::new("agent_fork", e.to_string()));
                    return Err(e);
                }
            }
            request.log_path
        };

        match self.wait_for_agent(cancel).await {
            Ok(client) => Ok(client),
            Err(e) if e.is_cancelled() => Err(e),
            Err(cause) => {
                let log = logs::read_excerpt(&log_path);
                let err = StartError { log_path, log, cause: Box::new(cause) };
                let mut event = TelemetryEvent::new("agent_start", err.to_string());
                if !err.log.is_empty() {
                    event = event.extra(err.log.clone());
                }
                self.telemetry.capture(event);
                Err(err.into())
            }
        }
    }

    /// Poll until the new agent answers `ping`, up to the start timeout.
    async fn wait_for_agent(&self, cancel: &CancellationToken) -> Result<Client, ClientError> {
        let deadline = Instant::now() + self.start_timeout;
        let client = self.client();
        let mut last = ClientError::NotRunning;
        while Instant::now() < deadline {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                _ = sleep(START_POLL) => {}
            }
            match tokio::time::timeout_at(deadline, client.ping(cancel)).await {
                Ok(Ok(_)) => return Ok(client),
                Ok(Err(e)) if e.is_cancelled() => return Err(e),
                Ok(Err(e)) => last = e,
                Err(_) => break,
            }
        }
        Err(last.context(format!("agent did not answer within {:?}", self.start_timeout)))
    }

    /// Take the start lock, failing fast when another process holds it.
    fn lock(&self, cancel: &CancellationToken) -> Result<StartLock, ClientError> {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        if let Some(parent) = self.paths.start_lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.paths.start_lock_path)?;
        if let Err(e) = file.try_lock_exclusive() {
            let e = ClientError::AlreadyStarting(e);
            self.telemetry.capture(TelemetryEvent::new("agent_start_lock", e.to_string()));
            return Err(e);
        }
        Ok(StartLock { file })
    }
}

/// Held start lock, released on drop
struct StartLock {
    file: File,
}

impl Drop for StartLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(all(test, unix))]
#[path = "supervisor_tests.rs"]
mod tests;

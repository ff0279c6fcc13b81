// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Starting the agent process.

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use async_trait::async_trait;
use fa_core::env::{API_TOKEN_ENV, NO_UPDATE_CHECK_ENV};

/// What a new agent process is started with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub log_path: PathBuf,
    /// Token the agent uses for its own API calls
    pub api_token: String,
}

/// Starts a detached agent and returns its pid.
#[async_trait]
pub trait DaemonLauncher: Send + Sync {
    async fn launch(&self, request: &LaunchRequest) -> io::Result<u32>;
}

/// Re-executes a program (normally the current executable) as
/// `<program> agent run <log-path>`.
#[derive(Debug, Clone)]
pub struct ExecLauncher {
    program: PathBuf,
}

impl ExecLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }

    pub fn current_exe() -> io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    fn command(&self, request: &LaunchRequest) -> io::Result<Command> {
        let log = OpenOptions::new().create(true).append(true).open(&request.log_path)?;

        let mut cmd = Command::new(&self.program);
        cmd.arg("agent")
            .arg("run")
            .arg(&request.log_path)
            .env(NO_UPDATE_CHECK_ENV, "1")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(log);
        if !request.api_token.is_empty() {
            cmd.env(API_TOKEN_ENV, &request.api_token);
        }
        detach(&mut cmd);
        Ok(cmd)
    }
}

#[async_trait]
impl DaemonLauncher for ExecLauncher {
    async fn launch(&self, request: &LaunchRequest) -> io::Result<u32> {
        let child = self.command(request)?.spawn()?;
        Ok(child.id())
    }
}

/// Put the child in its own process group so it outlives this one and
/// doesn't receive the terminal's signals.
#[cfg(unix)]
fn detach(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(windows)]
fn detach(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;
    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use std::io;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::{DaemonLauncher, LaunchRequest};

    type OnLaunch = Arc<dyn Fn(&LaunchRequest) + Send + Sync>;

    #[derive(Default)]
    struct FakeLauncherState {
        launches: Vec<LaunchRequest>,
        error: Option<String>,
        delay: Option<Duration>,
    }

    /// Launcher that records requests and runs a hook instead of a process
    #[derive(Clone, Default)]
    pub struct FakeLauncher {
        inner: Arc<Mutex<FakeLauncherState>>,
        on_launch: Option<OnLaunch>,
    }

    impl FakeLauncher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Run `hook` for each launch, e.g. to serve an in-process agent.
        pub fn on_launch(mut self, hook: impl Fn(&LaunchRequest) + Send + Sync + 'static) -> Self {
            self.on_launch = Some(Arc::new(hook));
            self
        }

        /// Hold each launch for `delay` before it returns.
        pub fn slow(self, delay: Duration) -> Self {
            self.inner.lock().delay = Some(delay);
            self
        }

        pub fn fail(&self, message: &str) {
            self.inner.lock().error = Some(message.to_string());
        }

        pub fn launches(&self) -> Vec<LaunchRequest> {
            self.inner.lock().launches.clone()
        }
    }

    #[async_trait]
    impl DaemonLauncher for FakeLauncher {
        async fn launch(&self, request: &LaunchRequest) -> io::Result<u32> {
            let (delay, error) = {
                let mut inner = self.inner.lock();
                inner.launches.push(request.clone());
                (inner.delay, inner.error.clone())
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(message) = error {
                return Err(io::Error::other(message));
            }
            if let Some(hook) = &self.on_launch {
                hook(request);
            }
            Ok(std::process::id())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeLauncher;

#[cfg(all(test, unix))]
#[path = "launcher_tests.rs"]
mod tests;

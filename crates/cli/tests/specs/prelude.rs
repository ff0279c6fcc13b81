// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Helpers for driving the `fly` binary against a scratch config dir.

use std::process::Output;
use std::time::{Duration, Instant};

use assert_cmd::Command;
use tempfile::TempDir;

/// Upper bound for waits on the background agent
pub const SPEC_WAIT_MAX_MS: u64 = 10_000;

/// A `fly` invocation not tied to any config dir.
pub fn cli() -> CliBuilder {
    CliBuilder::new()
}

/// A scratch `FLY_CONFIG_DIR`. Any agent started under it is stopped
/// on drop.
pub struct FlyHome {
    dir: TempDir,
}

impl FlyHome {
    pub fn new() -> Self {
        Self { dir: tempfile::tempdir().unwrap() }
    }

    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }

    pub fn fly(&self) -> CliBuilder {
        CliBuilder::new().env("FLY_CONFIG_DIR", self.path().to_str().unwrap())
    }

    /// Contents of the most recent agent log.
    pub fn agent_log(&self) -> String {
        let dir = self.path().join("agent-logs");
        let Ok(entries) = std::fs::read_dir(dir) else {
            return String::new();
        };
        let mut logs: Vec<_> = entries.flatten().map(|e| e.path()).collect();
        logs.sort();
        logs.last().and_then(|p| std::fs::read_to_string(p).ok()).unwrap_or_default()
    }
}

impl Drop for FlyHome {
    fn drop(&mut self) {
        let _ = self.fly().args(&["agent", "stop"]).output();
    }
}

pub struct CliBuilder {
    cmd: Command,
}

impl CliBuilder {
    fn new() -> Self {
        let mut cmd = Command::cargo_bin("fly").unwrap();
        cmd.env_remove("FLY_API_TOKEN")
            .env_remove("FLY_LOG")
            .env("FLY_AGENT_START_TIMEOUT_MS", SPEC_WAIT_MAX_MS.to_string())
            .timeout(Duration::from_millis(SPEC_WAIT_MAX_MS * 2));
        Self { cmd }
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn env(mut self, key: &str, value: impl AsRef<std::ffi::OsStr>) -> Self {
        self.cmd.env(key, value);
        self
    }

    pub fn output(mut self) -> Output {
        self.cmd.output().unwrap()
    }

    /// Run and assert a zero exit.
    pub fn passes(self) -> RunAssert {
        let run = RunAssert { output: self.output() };
        assert!(
            run.output.status.success(),
            "expected success, got {}\nstdout:\n{}\nstderr:\n{}",
            run.output.status,
            run.stdout(),
            run.stderr()
        );
        run
    }

    /// Run and assert a non-zero exit.
    pub fn fails(self) -> RunAssert {
        let run = RunAssert { output: self.output() };
        assert!(!run.output.status.success(), "expected failure\nstdout:\n{}", run.stdout());
        run
    }
}

pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn stdout_has(self, needle: &str) -> Self {
        let stdout = self.stdout();
        assert!(stdout.contains(needle), "stdout missing {needle:?}:\n{stdout}");
        self
    }

    pub fn stderr_has(self, needle: &str) -> Self {
        let stderr = self.stderr();
        assert!(stderr.contains(needle), "stderr missing {needle:?}:\n{stderr}");
        self
    }

    pub fn code_is(self, code: i32) -> Self {
        assert_eq!(self.output.status.code(), Some(code), "stderr:\n{}", self.stderr());
        self
    }
}

/// Poll `check` every 50ms for up to `max_ms`.
pub fn wait_for(max_ms: u64, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(max_ms);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    false
}

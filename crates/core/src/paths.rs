// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Well-known filesystem locations under the config directory.

use std::path::{Path, PathBuf};

use crate::config_file::{ConfigError, ConfigFile};

/// Filesystem layout shared by the agent and every client process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// Root config directory (e.g. ~/.fly)
    pub config_dir: PathBuf,
    /// Unix socket the agent listens on
    pub socket_path: PathBuf,
    /// Config file holding tokens and wireguard peers
    pub config_path: PathBuf,
    /// Lock serializing config file read-modify-write
    pub config_lock_path: PathBuf,
    /// Lock serializing agent starts
    pub start_lock_path: PathBuf,
    /// One log file per agent launch
    pub log_dir: PathBuf,
}

impl Paths {
    /// Layout for the current user (`$FLY_CONFIG_DIR` or `~/.fly`).
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self::new(crate::env::config_dir()?))
    }

    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        let config_dir = config_dir.into();
        Self {
            socket_path: config_dir.join("fly-agent.sock"),
            config_path: config_dir.join("config.toml"),
            config_lock_path: config_dir.join("flyctl.config.lock"),
            start_lock_path: config_dir.join("flyctl.agent.start.lock"),
            log_dir: config_dir.join("agent-logs"),
            config_dir,
        }
    }

    pub fn config_file(&self) -> ConfigFile {
        ConfigFile::new(&self.config_path, &self.config_lock_path)
    }

    /// Named pipe the agent listens on where Unix sockets are unavailable.
    pub fn pipe_name(&self) -> String {
        pipe_name_for(&self.config_dir)
    }
}

fn pipe_name_for(config_dir: &Path) -> String {
    // Pipe names are global, so fold the config dir in to keep separate
    // config dirs from sharing one agent.
    let mut hash: u32 = 2166136261;
    for byte in config_dir.to_string_lossy().bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(16777619);
    }
    format!(r"\\.\pipe\fly-agent-{hash:08x}")
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;

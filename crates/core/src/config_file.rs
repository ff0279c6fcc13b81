// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The CLI config file (`config.toml`), shared by the agent and foreground
//! commands.
//!
//! Every read holds a shared lock and every write an exclusive lock on a
//! sibling lock file. Writes are read-modify-write so keys this crate does
//! not know about survive.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use fs2::FileExt;
use thiserror::Error;

use crate::tunnel::TunnelState;

const ACCESS_TOKEN_KEY: &str = "access_token";
const WIRE_GUARD_STATE_KEY: &str = "wire_guard_state";

/// Config file errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,

    #[error("failed to lock {0}: {1}")]
    Lock(PathBuf, #[source] io::Error),

    #[error("failed to parse {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("failed to encode config: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("invalid {key} in {path}: {source}")]
    InvalidValue {
        key: &'static str,
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Handle on a config file and its lock file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    path: PathBuf,
    lock_path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: impl Into<PathBuf>, lock_path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock_path: lock_path.into() }
    }

    /// Handle for a config file with the lock file beside it.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = path.with_file_name("flyctl.config.lock");
        Self { path, lock_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw `access_token` value; empty when the file or key is missing.
    pub fn read_access_token(&self) -> Result<String, ConfigError> {
        let table = self.read()?;
        Ok(table.get(ACCESS_TOKEN_KEY).and_then(|v| v.as_str()).unwrap_or_default().to_string())
    }

    pub fn set_access_token(&self, token: &str) -> Result<(), ConfigError> {
        self.update(|table| {
            table.insert(ACCESS_TOKEN_KEY.to_string(), toml::Value::String(token.to_string()));
            Ok(())
        })
    }

    /// Wireguard peers keyed by tunnel key (`slug` or `slug/network`).
    pub fn wire_guard_state(&self) -> Result<BTreeMap<String, TunnelState>, ConfigError> {
        let table = self.read()?;
        match table.get(WIRE_GUARD_STATE_KEY) {
            Some(value) => value.clone().try_into::<BTreeMap<String, TunnelState>>().map_err(
                |source| ConfigError::InvalidValue {
                    key: WIRE_GUARD_STATE_KEY,
                    path: self.path.clone(),
                    source,
                },
            ),
            None => Ok(BTreeMap::new()),
        }
    }

    pub fn set_wire_guard_state(
        &self,
        peers: &BTreeMap<String, TunnelState>,
    ) -> Result<(), ConfigError> {
        let value = toml::Value::try_from(peers)?;
        self.update(|table| {
            table.insert(WIRE_GUARD_STATE_KEY.to_string(), value);
            Ok(())
        })
    }

    /// Modification time, or `None` when the file does not exist.
    pub fn modified(&self) -> Result<Option<SystemTime>, ConfigError> {
        match std::fs::metadata(&self.path) {
            Ok(meta) => Ok(Some(meta.modified()?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read-modify-write the whole file under the exclusive lock.
    pub fn update<F>(&self, f: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut toml::Table) -> Result<(), ConfigError>,
    {
        let lock = self.open_lock()?;
        lock.lock_exclusive().map_err(|e| ConfigError::Lock(self.lock_path.clone(), e))?;
        let mut table = self.read_unlocked()?;
        f(&mut table)?;
        let encoded = toml::to_string(&table)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, encoded)?;
        // Released when `lock` is dropped
        Ok(())
    }

    fn read(&self) -> Result<toml::Table, ConfigError> {
        let lock = self.open_lock()?;
        lock.lock_shared().map_err(|e| ConfigError::Lock(self.lock_path.clone(), e))?;
        self.read_unlocked()
    }

    fn read_unlocked(&self) -> Result<toml::Table, ConfigError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(toml::Table::new()),
            Err(e) => return Err(e.into()),
        };
        raw.parse::<toml::Table>().map_err(|e| ConfigError::Parse(self.path.clone(), e))
    }

    fn open_lock(&self) -> Result<File, ConfigError> {
        if let Some(parent) = self.lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)?;
        Ok(file)
    }
}

#[cfg(test)]
#[path = "config_file_tests.rs"]
mod tests;

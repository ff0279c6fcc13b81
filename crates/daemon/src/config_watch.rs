// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::SystemTime;

use fa_core::{ConfigError, ConfigFile};
use parking_lot::Mutex;

/// Detects config file changes by modification time.
///
/// A missing file has no baseline; creating it later counts as a change.
pub(crate) struct ConfigWatch {
    config: ConfigFile,
    seen: Mutex<Option<SystemTime>>,
}

impl ConfigWatch {
    pub fn new(config: ConfigFile) -> Result<Self, ConfigError> {
        let seen = config.modified()?;
        Ok(Self { config, seen: Mutex::new(seen) })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Whether the file changed since the last call, recording the new
    /// baseline when it did.
    pub fn changed(&self) -> Result<bool, ConfigError> {
        let current = self.config.modified()?;
        let mut seen = self.seen.lock();
        let changed = match (*seen, current) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(before), Some(now)) => now > before,
        };
        if changed {
            *seen = current;
        }
        Ok(changed)
    }
}

#[cfg(test)]
#[path = "config_watch_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access.

use std::path::PathBuf;
use std::time::Duration;

use crate::config_file::ConfigError;

/// Scoped API token handed to the agent process.
pub const API_TOKEN_ENV: &str = "FLY_API_TOKEN";

/// Marker injected into the agent's environment to disable update checks.
pub const NO_UPDATE_CHECK_ENV: &str = "FLY_NO_UPDATE_CHECK";

/// Resolve config directory: FLY_CONFIG_DIR > ~/.fly
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = std::env::var("FLY_CONFIG_DIR").ok().filter(|s| !s.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(home.join(".fly"))
}

/// API token from the environment, if any.
pub fn api_token() -> Option<String> {
    std::env::var(API_TOKEN_ENV).ok().filter(|s| !s.trim().is_empty())
}

/// Whether update checks were disabled for this process.
pub fn update_checks_disabled() -> bool {
    std::env::var(NO_UPDATE_CHECK_ENV).map(|v| !v.is_empty() && v != "0").unwrap_or(false)
}

/// How long a caller waits for a freshly started agent (default 5s,
/// configurable via `FLY_AGENT_START_TIMEOUT_MS`).
pub fn start_timeout() -> Duration {
    std::env::var("FLY_AGENT_START_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}

/// Log filter directive (`FLY_LOG`), e.g. `debug` or `fa_daemon=trace`.
pub fn log_filter() -> Option<String> {
    std::env::var("FLY_LOG").ok().filter(|s| !s.is_empty())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;

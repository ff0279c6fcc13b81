// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscriber setup. The agent writes to the log file it was started
//! with; every other command logs to stderr.

use std::fs::OpenOptions;
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub enum LogTarget {
    File(PathBuf),
    Stderr { default_level: &'static str },
}

/// Install the global subscriber. The returned guard must outlive every
/// log call so buffered lines reach the file.
pub fn init(target: &LogTarget) -> anyhow::Result<Option<WorkerGuard>> {
    match target {
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt()
                .with_env_filter(env_filter("info"))
                .with_writer(writer)
                .with_ansi(false)
                .try_init()
                .map_err(|e| anyhow!(e))?;
            Ok(Some(guard))
        }
        LogTarget::Stderr { default_level } => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter(default_level))
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time()
                .try_init()
                .map_err(|e| anyhow!(e))?;
            Ok(None)
        }
    }
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_new(directive(fa_core::env::log_filter(), default_level))
        .unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// `FLY_LOG` wins over the command's default level.
fn directive(configured: Option<String>, default_level: &str) -> String {
    configured.unwrap_or_else(|| default_level.to_string())
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;

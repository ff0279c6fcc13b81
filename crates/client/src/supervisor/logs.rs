// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-launch agent log files.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::debug;

/// Logs older than this are deleted on each launch
const MAX_LOG_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Cap on the log excerpt attached to a start failure
const EXCERPT_LIMIT: usize = 10 * 1024;

/// Create the log directory if needed, prune old logs, and create an
/// empty log file for a new launch.
pub(crate) fn create_log_file(dir: &Path) -> io::Result<PathBuf> {
    create_dir(dir)?;
    prune(dir, SystemTime::now());

    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3f");
    let path = dir.join(format!("{stamp}-{}.log", std::process::id()));
    std::fs::File::create(&path)?;
    Ok(path)
}

#[cfg(unix)]
fn create_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_dir(dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dir)
}

/// Delete regular files last modified before `now - MAX_LOG_AGE`.
pub(crate) fn prune(dir: &Path, now: SystemTime) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let cutoff = now.checked_sub(MAX_LOG_AGE).unwrap_or(SystemTime::UNIX_EPOCH);
    for entry in entries.flatten() {
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        if meta.modified().is_ok_and(|modified| modified < cutoff) {
            let path = entry.path();
            debug!(path = %path.display(), "removing old agent log");
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Up to the first 10KB of a log, lossily decoded; empty when unreadable.
pub(crate) fn read_excerpt(path: &Path) -> String {
    let Ok(file) = std::fs::File::open(path) else {
        return String::new();
    };
    let mut data = Vec::with_capacity(EXCERPT_LIMIT);
    if file.take(EXCERPT_LIMIT as u64).read_to_end(&mut data).is_err() {
        return String::new();
    }
    String::from_utf8_lossy(&data).into_owned()
}

/// Most recent agent log in `dir`.
pub fn latest_log(dir: &Path) -> Option<PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .flatten()
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "log"))
        .filter_map(|e| Some((e.metadata().ok()?.modified().ok()?, e.path())))
        .max()
        .map(|(_, path)| path)
}

#[cfg(test)]
#[path = "logs_tests.rs"]
mod tests;

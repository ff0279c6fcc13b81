// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Long-running token maintenance for a process that shares one token set.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fa_core::{ConfigFile, TokenSet};
use parking_lot::Mutex;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::refresher::{persist, Refresher};

/// Loop periods for [`monitor_tokens`].
#[derive(Debug, Clone, Copy)]
pub struct MonitorOptions {
    /// How often the config file is re-read
    pub watch_interval: Duration,
    /// How often org tokens and discharges are refreshed
    pub refresh_interval: Duration,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self { watch_interval: Duration::from_secs(15), refresh_interval: Duration::from_secs(60) }
    }
}

/// Handle to the background loops started by [`monitor_tokens`].
pub struct TokenMonitor {
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl TokenMonitor {
    /// Stop both loops and wait for them to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.tracker.wait().await;
    }
}

/// Prepare `tokens` once, then keep them current until `cancel` fires or
/// the returned handle is shut down.
///
/// When the set is backed by a config file, a watcher re-reads it and
/// replaces the shared set wholesale. A second loop refreshes a copy and
/// installs it only if nobody replaced the shared set in the meantime.
pub async fn monitor_tokens(
    refresher: Arc<Refresher>,
    tokens: Arc<Mutex<TokenSet>>,
    options: MonitorOptions,
    cancel: &CancellationToken,
) -> TokenMonitor {
    let mut prepared = tokens.lock().clone();
    if refresher.prepare(&mut prepared).await {
        tokens.lock().replace(prepared);
    }

    let file = tokens.lock().file().map(PathBuf::from);
    let cancel = cancel.child_token();
    let tracker = TaskTracker::new();

    match &file {
        Some(path) => {
            debug!(path = %path.display(), "monitoring tokens");
            tracker.spawn(watch_config_tokens(
                path.clone(),
                Arc::clone(&tokens),
                options.watch_interval,
                cancel.clone(),
            ));
        }
        None => debug!("monitoring tokens in memory"),
    }
    tracker.spawn(keep_tokens_fresh(
        refresher,
        tokens,
        file,
        options.refresh_interval,
        cancel.clone(),
    ));
    tracker.close();

    TokenMonitor { cancel, tracker }
}

/// Replace the shared set with the file's tokens on every tick. A read
/// failure ends the loop.
async fn watch_config_tokens(
    path: PathBuf,
    tokens: Arc<Mutex<TokenSet>>,
    period: Duration,
    cancel: CancellationToken,
) {
    let config = ConfigFile::at(&path);
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }
        match TokenSet::from_file(&config) {
            Ok(current) => tokens.lock().replace(current),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to read tokens, no longer watching"
                );
                return;
            }
        }
    }
}

/// Refresh a private copy on every tick and install it only if the
/// shared set still equals the snapshot taken before the refresh.
async fn keep_tokens_fresh(
    refresher: Arc<Refresher>,
    tokens: Arc<Mutex<TokenSet>>,
    file: Option<PathBuf>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut persisting = file.is_some();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let before = tokens.lock().clone();
        let mut refreshed = before.clone();
        let changed = tokio::select! {
            _ = cancel.cancelled() => return,
            changed = refresher.refresh(&mut refreshed) => changed,
        };
        if !changed {
            continue;
        }

        install(&tokens, &before, refreshed, &mut persisting).await;
    }
}

/// Swap in `refreshed` if the shared set still equals `before`, then
/// write it out with the lock released.
async fn install(
    tokens: &Mutex<TokenSet>,
    before: &TokenSet,
    refreshed: TokenSet,
    persisting: &mut bool,
) {
    let mut snapshot = {
        let mut live = tokens.lock();
        if *live != *before {
            debug!("tokens replaced during refresh, discarding refreshed copy");
            return;
        }
        live.replace(refreshed);
        live.clone()
    };
    if !*persisting {
        return;
    }

    let written = tokio::task::spawn_blocking(move || persist(&mut snapshot).map(|()| snapshot))
        .await
        .map_err(|e| e.to_string())
        .and_then(|result| result.map_err(|e| e.to_string()));
    match written {
        Ok(written) => {
            let mut live = tokens.lock();
            if *live == written {
                live.mark_clean();
            }
        }
        Err(e) => {
            warn!(error = %e, "failed to persist refreshed tokens, keeping them in memory only");
            *persisting = false;
        }
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;

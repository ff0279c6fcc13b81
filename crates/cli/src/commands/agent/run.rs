// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `fly agent run` - serve the agent until killed

use std::sync::Arc;

use anyhow::Result;
use fa_core::{Paths, TokenSet};
use fa_credentials::{monitor_tokens, MonitorOptions, NoAuthority, Refresher};
use fa_daemon::{Backends, ConfigPeers, ServeOptions, UnavailableEngine};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::build_version;

/// Serve on the agent socket until a `kill` request or a shutdown signal.
/// Background agents are the ones started by the supervisor.
pub async fn run(background: bool) -> Result<()> {
    let paths = Paths::load()?;
    let config = paths.config_file();
    let tokens = Arc::new(Mutex::new(TokenSet::load(&config)?));
    if tokens.lock().is_empty() {
        warn!("no access token configured; tunnels will be unavailable");
    }

    let cancel = CancellationToken::new();
    cancel_on_signal(cancel.clone());

    let authority = Arc::new(NoAuthority);
    let refresher = Arc::new(Refresher::new(authority.clone(), authority));
    let monitor =
        monitor_tokens(refresher, Arc::clone(&tokens), MonitorOptions::default(), &cancel).await;

    let backends = Backends {
        engine: Arc::new(UnavailableEngine),
        peers: Arc::new(ConfigPeers::new(config)),
        tokens,
    };
    let options = ServeOptions::new(build_version()?).background(background);
    let result = fa_daemon::run(&paths, options, backends, cancel).await;

    monitor.shutdown().await;
    result?;
    Ok(())
}

fn cancel_on_signal(cancel: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = shutdown_signal() => {
                info!("received shutdown signal");
                cancel.cancel();
            }
        }
    });
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = term.recv() => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "cannot listen for SIGTERM");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Accept loop, peer sweep and per-connection sessions.
//!
//! Every task observes the shared shutdown token. Sessions are tracked so
//! the listener only returns once all of them have finished.

mod handlers;
mod incoming;
mod relay;
mod session;

pub(crate) use incoming::Incoming;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use fa_core::TokenSet;
use parking_lot::Mutex;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::adapters::{PeerError, PeerStore, TunnelEngine};
use crate::config_watch::ConfigWatch;
use crate::lifecycle::{DaemonError, ServeOptions};
use crate::registry::TunnelRegistry;

use session::SessionId;

/// Shared agent context for all sessions.
pub(crate) struct ListenCtx {
    pub registry: TunnelRegistry,
    pub engine: Arc<dyn TunnelEngine>,
    pub peers: Arc<dyn PeerStore>,
    pub tokens: Arc<Mutex<TokenSet>>,
    pub watch: ConfigWatch,
    pub options: ServeOptions,
    /// Cancelled on `kill` and on process shutdown
    pub shutdown: CancellationToken,
}

impl ListenCtx {
    /// Close tunnels whose peer no longer exists.
    pub async fn validate_tunnels(&self) -> Result<(), PeerError> {
        let valid = self.peers.current().await?;
        self.registry.revalidate(&valid).await;
        Ok(())
    }

    /// Revalidate tunnels when the config file changed since last seen.
    pub async fn check_config_change(&self) -> Result<(), PeerError> {
        if self.watch.changed()? {
            self.validate_tunnels().await?;
            info!(config = %self.watch.config().path().display(), "config changed");
        }
        Ok(())
    }
}

/// Listener task for accepting connections.
pub(crate) struct Listener {
    incoming: Incoming,
    ctx: Arc<ListenCtx>,
}

impl Listener {
    pub fn new(incoming: Incoming, ctx: Arc<ListenCtx>) -> Self {
        Self { incoming, ctx }
    }

    /// Accept connections until shutdown or a terminal accept error, then
    /// wait for the sweep and every session to finish.
    pub async fn run(mut self) -> Result<(), DaemonError> {
        let shutdown = self.ctx.shutdown.clone();
        let tracker = TaskTracker::new();
        tracker.spawn(sweep(Arc::clone(&self.ctx)));

        info!("OK {}", std::process::id());
        let mut last_id = 0u64;
        let result = loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("shutting down ...");
                    break Ok(());
                }
                accepted = self.incoming.accept() => accepted,
            };
            match accepted {
                Ok(stream) => {
                    last_id += 1;
                    let id = SessionId(last_id);
                    let ctx = Arc::clone(&self.ctx);
                    tracker.spawn(
                        session::run(ctx, stream).instrument(info_span!("session", id = %id)),
                    );
                }
                Err(e) if is_temporary(&e) => {
                    warn!(error = %e, "temporary accept error");
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                Err(e) => {
                    error!(error = %e, "encountered terminal error");
                    break Err(DaemonError::Accept(e));
                }
            }
        };

        // Give up the endpoint before draining so a replacement agent can
        // bind while sessions finish
        self.incoming.close();

        // Stops the sweep and any session still running
        shutdown.cancel();
        tracker.close();
        tracker.wait().await;
        info!("QUIT");
        result
    }
}

/// Periodically prune upstream peers and revalidate tunnels.
async fn sweep(ctx: Arc<ListenCtx>) {
    let period = ctx.options.sweep_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ctx.shutdown.cancelled() => return,
            _ = ticker.tick() => {}
        }

        tokio::select! {
            _ = ctx.shutdown.cancelled() => return,
            _ = sweep_once(&ctx) => {}
        }
    }
}

async fn sweep_once(ctx: &ListenCtx) {
    let tokens = ctx.tokens.lock().clone();
    if let Err(e) = ctx.peers.prune_invalid(&tokens).await {
        warn!(error = %e, "failed pruning invalid peers");
    }
    if let Err(e) = ctx.validate_tunnels().await {
        warn!(error = %e, "failed validating tunnels");
    }
    if let Err(e) = ctx.check_config_change().await {
        warn!(error = %e, "failed checking config");
    }
    debug!("validated wireguard peers");
}

/// Accept errors worth retrying: resource exhaustion and connections that
/// died before they were accepted.
fn is_temporary(e: &io::Error) -> bool {
    if matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    ) {
        return true;
    }
    #[cfg(unix)]
    {
        use nix::errno::Errno;
        if let Some(code) = e.raw_os_error() {
            return matches!(
                Errno::from_raw(code),
                Errno::EMFILE | Errno::ENFILE | Errno::ENOBUFS | Errno::ENOMEM
            );
        }
    }
    false
}

#[cfg(all(test, unix))]
#[path = "../listener_tests.rs"]
mod tests;

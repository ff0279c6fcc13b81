// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent lifecycle: bind, serve, shut down.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fa_core::{ConfigError, Paths, TokenSet};
use parking_lot::Mutex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::adapters::{PeerStore, TunnelEngine};
use crate::config_watch::ConfigWatch;
use crate::listener::{Incoming, ListenCtx, Listener};
use crate::registry::TunnelRegistry;

/// How often upstream peers are pruned and tunnels revalidated
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(2 * 60);

/// Agent settings
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// Build version reported by `ping`
    pub version: semver::Version,
    /// Whether this agent was detached from a CLI invocation
    pub background: bool,
    pub sweep_interval: Duration,
}

impl ServeOptions {
    pub fn new(version: semver::Version) -> Self {
        Self { version, background: false, sweep_interval: SWEEP_INTERVAL }
    }

    pub fn background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

/// External collaborators of the agent
#[derive(Clone)]
pub struct Backends {
    pub engine: Arc<dyn TunnelEngine>,
    pub peers: Arc<dyn PeerStore>,
    /// Process-wide tokens, used by sessions that don't install their own
    pub tokens: Arc<Mutex<TokenSet>>,
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("failed binding {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("failed removing existing socket: {0} is not a socket")]
    NotASocket(PathBuf),

    #[error("can't stat config file: {0}")]
    Config(#[from] ConfigError),

    #[error("encountered terminal error: {0}")]
    Accept(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bind the agent's endpoint under `paths` and serve until `cancel`
/// fires or a client sends `kill`. `kill` cancels `cancel`.
pub async fn run(
    paths: &Paths,
    options: ServeOptions,
    backends: Backends,
    cancel: CancellationToken,
) -> Result<(), DaemonError> {
    let incoming = bind(paths)?;
    let watch = ConfigWatch::new(paths.config_file())?;
    serve(incoming, watch, options, backends, cancel).await
}

/// Serve connections from an already bound endpoint.
pub(crate) async fn serve(
    incoming: Incoming,
    watch: ConfigWatch,
    options: ServeOptions,
    backends: Backends,
    cancel: CancellationToken,
) -> Result<(), DaemonError> {
    let ctx = Arc::new(ListenCtx {
        registry: TunnelRegistry::new(),
        engine: backends.engine,
        peers: backends.peers,
        tokens: backends.tokens,
        watch,
        options,
        shutdown: cancel,
    });

    let result = Listener::new(incoming, Arc::clone(&ctx)).run().await;
    ctx.registry.close_all().await;
    result
}

/// Bind the agent's endpoint: the Unix socket, or a named pipe where
/// Unix sockets are unavailable.
pub(crate) fn bind(paths: &Paths) -> Result<Incoming, DaemonError> {
    #[cfg(unix)]
    {
        bind_socket(&paths.socket_path)
    }
    #[cfg(windows)]
    {
        let name = paths.pipe_name();
        Incoming::bind(&name).map_err(|e| DaemonError::BindFailed(PathBuf::from(name), e))
    }
}

#[cfg(unix)]
pub(crate) fn bind_socket(socket_path: &Path) -> Result<Incoming, DaemonError> {
    remove_stale_socket(socket_path)?;
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let incoming = Incoming::bind(socket_path)
        .map_err(|e| DaemonError::BindFailed(socket_path.to_path_buf(), e))?;
    info!(socket = %socket_path.display(), "bound");
    Ok(incoming)
}

/// Remove a leftover socket file, refusing to delete anything that is
/// not a socket.
#[cfg(unix)]
fn remove_stale_socket(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::FileTypeExt;

    match std::fs::symlink_metadata(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
        Ok(meta) if !meta.file_type().is_socket() => {
            Err(DaemonError::NotASocket(path.to_path_buf()))
        }
        Ok(_) => {
            std::fs::remove_file(path)?;
            Ok(())
        }
    }
}

#[cfg(all(test, unix))]
#[path = "lifecycle_tests.rs"]
mod tests;

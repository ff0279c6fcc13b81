// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tunnels owned by the agent, at most one per key.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use fa_core::{TokenSet, TunnelKey};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::adapters::{EngineError, Tunnel, TunnelEngine};

/// Lock-guarded table of live tunnels.
///
/// The lock is held across negotiation so concurrent establishes for a
/// key share a single negotiation.
#[derive(Default)]
pub struct TunnelRegistry {
    tunnels: Mutex<HashMap<TunnelKey, Arc<dyn Tunnel>>>,
}

impl TunnelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the tunnel for `key`, negotiating one when there is none or
    /// when `recycle` asks for a replacement. A replaced tunnel is closed
    /// after the new one is installed.
    pub async fn establish(
        &self,
        engine: &dyn TunnelEngine,
        tokens: &TokenSet,
        key: &TunnelKey,
        recycle: bool,
    ) -> Result<Arc<dyn Tunnel>, EngineError> {
        let mut tunnels = self.tunnels.lock().await;
        if !recycle {
            if let Some(tunnel) = tunnels.get(key) {
                return Ok(Arc::clone(tunnel));
            }
        }

        let tunnel = engine.negotiate(tokens, key, recycle).await?;
        let replaced = tunnels.insert(key.clone(), Arc::clone(&tunnel));
        drop(tunnels);

        info!(tunnel = %key, "tunnel established");
        if let Some(old) = replaced {
            if let Err(e) = old.close().await {
                warn!(tunnel = %key, error = %e, "failed closing replaced tunnel");
            }
        }
        Ok(tunnel)
    }

    pub async fn get(&self, key: &TunnelKey) -> Option<Arc<dyn Tunnel>> {
        self.tunnels.lock().await.get(key).cloned()
    }

    /// Keys of every live tunnel, sorted.
    pub async fn keys(&self) -> Vec<TunnelKey> {
        let mut keys: Vec<TunnelKey> = self.tunnels.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Drop and close every tunnel whose key is not in `valid`. Returns
    /// the removed keys, sorted.
    pub async fn revalidate(&self, valid: &HashSet<TunnelKey>) -> Vec<TunnelKey> {
        let mut removed: Vec<(TunnelKey, Arc<dyn Tunnel>)> = {
            let mut tunnels = self.tunnels.lock().await;
            let stale: Vec<TunnelKey> =
                tunnels.keys().filter(|key| !valid.contains(*key)).cloned().collect();
            stale
                .into_iter()
                .filter_map(|key| tunnels.remove(&key).map(|tunnel| (key, tunnel)))
                .collect()
        };
        removed.sort_by(|a, b| a.0.cmp(&b.0));

        for (key, tunnel) in &removed {
            info!(tunnel = %key, "no peer in config, closing tunnel");
            if let Err(e) = tunnel.close().await {
                warn!(tunnel = %key, error = %e, "failed closing tunnel");
            }
        }
        removed.into_iter().map(|(key, _)| key).collect()
    }

    /// Close every tunnel; used on shutdown.
    pub async fn close_all(&self) {
        let drained: Vec<(TunnelKey, Arc<dyn Tunnel>)> =
            self.tunnels.lock().await.drain().collect();
        for (key, tunnel) in drained {
            if let Err(e) = tunnel.close().await {
                warn!(tunnel = %key, error = %e, "failed closing tunnel");
            }
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;

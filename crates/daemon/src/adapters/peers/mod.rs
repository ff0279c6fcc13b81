// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upstream peer records and their validation.

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakePeers;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use fa_core::{ConfigError, ConfigFile, TokenSet, TunnelKey, TunnelState};
use thiserror::Error;
use tracing::{debug, info};

/// Errors from peer store operations
#[derive(Debug, Error)]
pub enum PeerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed validating peers: {0}")]
    Validate(String),
}

/// Source of truth for which tunnels still have a backing peer
#[async_trait]
pub trait PeerStore: Send + Sync {
    /// Drop peers the platform no longer recognizes.
    async fn prune_invalid(&self, tokens: &TokenSet) -> Result<(), PeerError>;

    /// Keys of every peer currently configured.
    async fn current(&self) -> Result<HashSet<TunnelKey>, PeerError>;
}

/// Asks the platform which of the configured peers are gone.
#[async_trait]
pub trait PeerValidator: Send + Sync {
    /// Config keys of the peers in `peers` that are no longer valid.
    async fn invalid_peers(
        &self,
        tokens: &TokenSet,
        peers: &BTreeMap<String, TunnelState>,
    ) -> Result<Vec<String>, PeerError>;
}

const WIRE_GUARD_STATE_KEY: &str = "wire_guard_state";

/// Peers recorded in the config file's `wire_guard_state` table
#[derive(Clone)]
pub struct ConfigPeers {
    config: ConfigFile,
    validator: Option<Arc<dyn PeerValidator>>,
}

impl ConfigPeers {
    pub fn new(config: ConfigFile) -> Self {
        Self { config, validator: None }
    }

    pub fn with_validator(mut self, validator: Arc<dyn PeerValidator>) -> Self {
        self.validator = Some(validator);
        self
    }
}

#[async_trait]
impl PeerStore for ConfigPeers {
    async fn prune_invalid(&self, tokens: &TokenSet) -> Result<(), PeerError> {
        let Some(validator) = &self.validator else {
            debug!("no peer validator configured, skipping prune");
            return Ok(());
        };
        let peers = self.config.wire_guard_state()?;
        if peers.is_empty() {
            return Ok(());
        }
        let invalid = validator.invalid_peers(tokens, &peers).await?;
        if invalid.is_empty() {
            return Ok(());
        }

        self.config.update(|table| {
            if let Some(toml::Value::Table(peers)) = table.get_mut(WIRE_GUARD_STATE_KEY) {
                for key in &invalid {
                    peers.remove(key);
                }
            }
            Ok(())
        })?;
        info!(peers = %invalid.join(", "), "pruned invalid peers");
        Ok(())
    }

    async fn current(&self) -> Result<HashSet<TunnelKey>, PeerError> {
        let peers = self.config.wire_guard_state()?;
        Ok(peers.keys().map(|key| TunnelKey::parse(key)).collect())
    }
}

#[cfg(test)]
#[path = "peers_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake peer store for testing

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fa_core::{TokenSet, TunnelKey};
use parking_lot::Mutex;

use super::{PeerError, PeerStore};

#[derive(Default)]
struct FakePeersState {
    keys: HashSet<TunnelKey>,
    prune_calls: usize,
    error: Option<String>,
    prune_delay: Option<Duration>,
}

/// Peer store backed by an in-memory key set
#[derive(Clone, Default)]
pub struct FakePeers {
    inner: Arc<Mutex<FakePeersState>>,
}

impl FakePeers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: TunnelKey) {
        self.inner.lock().keys.insert(key);
    }

    pub fn remove(&self, key: &TunnelKey) {
        self.inner.lock().keys.remove(key);
    }

    pub fn fail(&self, message: &str) {
        self.inner.lock().error = Some(message.to_string());
    }

    /// Hold each prune for `delay`, like a slow platform API.
    pub fn slow_prune(&self, delay: Duration) {
        self.inner.lock().prune_delay = Some(delay);
    }

    pub fn prune_calls(&self) -> usize {
        self.inner.lock().prune_calls
    }
}

#[async_trait]
impl PeerStore for FakePeers {
    async fn prune_invalid(&self, _tokens: &TokenSet) -> Result<(), PeerError> {
        let (delay, error) = {
            let mut inner = self.inner.lock();
            inner.prune_calls += 1;
            (inner.prune_delay, inner.error.clone())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match error {
            Some(message) => Err(PeerError::Validate(message)),
            None => Ok(()),
        }
    }

    async fn current(&self) -> Result<HashSet<TunnelKey>, PeerError> {
        let inner = self.inner.lock();
        match &inner.error {
            Some(message) => Err(PeerError::Validate(message.clone())),
            None => Ok(inner.keys.clone()),
        }
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use fa_core::{TunnelConfig, TunnelState};
use fa_wire::EstablishResponse;
use tokio_util::sync::CancellationToken;

use crate::client::Client;
use crate::error::ClientError;
use crate::transport::Connection;

/// Opens streams through an established tunnel, one agent connection per
/// dial.
#[derive(Clone)]
pub struct Dialer {
    client: Client,
    slug: String,
    network: Option<String>,
    /// Zero means no timeout
    timeout: Duration,
    state: TunnelState,
    config: TunnelConfig,
}

impl Dialer {
    pub(crate) fn new(
        client: Client,
        slug: &str,
        network: Option<&str>,
        established: EstablishResponse,
    ) -> Self {
        Self {
            client,
            slug: slug.to_string(),
            network: network.map(str::to_string),
            timeout: Duration::ZERO,
            state: established.state,
            config: established.config,
        }
    }

    /// Bound each dial the agent performs.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn state(&self) -> &TunnelState {
        &self.state
    }

    pub fn config(&self) -> &TunnelConfig {
        &self.config
    }

    /// Connect to `addr` (`host:port`) inside the tunnel. The returned
    /// connection carries the tunneled bytes.
    pub async fn dial(
        &self,
        cancel: &CancellationToken,
        addr: &str,
    ) -> Result<Connection, ClientError> {
        let timeout_ms = self.timeout.as_millis().to_string();
        let mut args = vec![self.slug.as_str(), addr, timeout_ms.as_str()];
        args.extend(self.network.as_deref());
        self.client.upgrade(cancel, "connect", &args).await
    }
}

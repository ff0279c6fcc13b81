// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Instance discovery from two sources: the agent's tunnel DNS and the
//! platform API.

use async_trait::async_trait;
use fa_core::{Telemetry, TelemetryEvent};
use fa_wire::Instances;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::client::Client;
use crate::error::ClientError;

/// Platform API view of an app's running instances.
#[async_trait]
pub trait InstanceApi: Send + Sync {
    async fn instances(&self, org: &str, app: &str) -> Result<Instances, ClientError>;
}

impl Client {
    /// Look `app` up through the agent and the API at once.
    ///
    /// The API answer wins when both succeed; the agent's is only a cross
    /// check. When one source fails the other is used. When both fail the
    /// API error is returned. Failures other than cancellation are
    /// reported to `telemetry`.
    pub async fn instances(
        &self,
        cancel: &CancellationToken,
        api: &dyn InstanceApi,
        telemetry: &dyn Telemetry,
        org: &str,
        app: &str,
    ) -> Result<Instances, ClientError> {
        let from_api = async {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ClientError::Cancelled),
                result = api.instances(org, app) => result,
            }
        };
        let (from_agent, from_api) = tokio::join!(self.agent_instances(cancel, org, app), from_api);

        let report = |source: &'static str, e: &ClientError| {
            if !e.is_cancelled() {
                telemetry.capture(
                    TelemetryEvent::new("instances", format!("{source} lookup failed: {e}"))
                        .tag("org", org)
                        .tag("app", app),
                );
            }
        };

        match (from_agent, from_api) {
            (Ok(agent), Ok(api)) => {
                if agent.sorted_addresses() != api.sorted_addresses() {
                    warn!(
                        org,
                        app,
                        agent = ?agent.addresses,
                        api = ?api.addresses,
                        "instance lookups disagree"
                    );
                    telemetry.capture(
                        TelemetryEvent::new("instances_mismatch", "agent and API instances differ")
                            .tag("org", org)
                            .tag("app", app),
                    );
                }
                Ok(api)
            }
            (Ok(agent), Err(e)) => {
                report("api", &e);
                Ok(agent)
            }
            (Err(e), Ok(api)) => {
                report("agent", &e);
                Ok(api)
            }
            (Err(agent_err), Err(api_err)) => {
                report("agent", &agent_err);
                report("api", &api_err);
                Err(api_err)
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use std::sync::Arc;

    use async_trait::async_trait;
    use fa_wire::Instances;
    use parking_lot::Mutex;

    use super::InstanceApi;
    use crate::error::ClientError;

    #[derive(Default)]
    struct FakeInstanceApiState {
        instances: Instances,
        error: Option<String>,
        calls: Vec<(String, String)>,
    }

    /// Instance API answering from a fixed list
    #[derive(Clone, Default)]
    pub struct FakeInstanceApi {
        inner: Arc<Mutex<FakeInstanceApiState>>,
    }

    impl FakeInstanceApi {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn instance(self, label: &str, addr: &str) -> Self {
            self.inner.lock().instances.push(label, addr);
            self
        }

        pub fn fail(&self, message: &str) {
            self.inner.lock().error = Some(message.to_string());
        }

        pub fn calls(&self) -> Vec<(String, String)> {
            self.inner.lock().calls.clone()
        }
    }

    #[async_trait]
    impl InstanceApi for FakeInstanceApi {
        async fn instances(&self, org: &str, app: &str) -> Result<Instances, ClientError> {
            let mut inner = self.inner.lock();
            inner.calls.push((org.to_string(), app.to_string()));
            match &inner.error {
                Some(message) => Err(ClientError::Api(message.clone())),
                None => Ok(inner.instances.clone()),
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeInstanceApi;

#[cfg(all(test, unix))]
#[path = "instances_tests.rs"]
mod tests;

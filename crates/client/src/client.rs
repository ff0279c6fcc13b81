// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One command per connection, optionally preceded by a `set-token`
//! handshake.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fa_core::{Credentials, TokenSet};
use fa_wire::{
    read_frame, write_frame, EstablishResponse, Instances, PingResponse, ProtocolError, Reply,
};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::dialer::Dialer;
use crate::error::ClientError;
use crate::pinger::Pinger;
use crate::transport::{Connection, Transport};
use crate::wait::{poll, WaitOptions};

/// Handle on the agent.
///
/// Cloning shares the transport and the refused-tokens flag. Separate
/// `Client::new` calls get independent flags.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    credentials: Option<Credentials>,
    /// Set once the agent rejects our `set-token`; later commands skip it
    refused: Arc<AtomicBool>,
    waits: WaitOptions,
}

impl Client {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            credentials: None,
            refused: Arc::new(AtomicBool::new(false)),
            waits: WaitOptions::default(),
        }
    }

    /// Hand `tokens` to the agent ahead of every command.
    pub fn with_tokens(mut self, tokens: &TokenSet) -> Self {
        self.credentials = Credentials::from_tokens(tokens);
        self
    }

    pub fn with_waits(mut self, waits: WaitOptions) -> Self {
        self.waits = waits;
        self
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub async fn ping(&self, cancel: &CancellationToken) -> Result<PingResponse, ClientError> {
        let reply = self.request(cancel, "ping", &[]).await?;
        json_payload(reply)
    }

    /// Ask the agent to shut down. The agent may close the connection
    /// before its acknowledgement arrives.
    pub async fn kill(&self, cancel: &CancellationToken) -> Result<(), ClientError> {
        with_cancel(cancel, async {
            let mut conn = self.open().await?;
            write_frame(&mut conn, "kill", &[]).await?;
            match read_frame(&mut conn).await {
                Ok(frame) => empty_payload(Reply::parse(&frame)?),
                Err(ProtocolError::ConnectionClosed | ProtocolError::Io(_)) => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    pub async fn establish(
        &self,
        cancel: &CancellationToken,
        slug: &str,
        network: Option<&str>,
    ) -> Result<EstablishResponse, ClientError> {
        let reply = self.request(cancel, "establish", &scoped(slug, &[], network)).await?;
        json_payload(reply)
    }

    /// Like [`establish`](Self::establish), but always negotiates a new
    /// tunnel.
    pub async fn reestablish(
        &self,
        cancel: &CancellationToken,
        slug: &str,
        network: Option<&str>,
    ) -> Result<EstablishResponse, ClientError> {
        let reply = self.request(cancel, "reestablish", &scoped(slug, &[], network)).await?;
        json_payload(reply)
    }

    pub async fn probe(
        &self,
        cancel: &CancellationToken,
        slug: &str,
        network: Option<&str>,
    ) -> Result<(), ClientError> {
        let reply = self.request(cancel, "probe", &scoped(slug, &[], network)).await?;
        empty_payload(reply)
    }

    /// Resolve `host` through the tunnel; a bare `ok` is
    /// [`ClientError::NoSuchHost`].
    pub async fn resolve(
        &self,
        cancel: &CancellationToken,
        slug: &str,
        host: &str,
        network: Option<&str>,
    ) -> Result<String, ClientError> {
        match self.request(cancel, "resolve", &scoped(slug, &[host], network)).await? {
            Reply::Ok(Some(addr)) => Ok(addr),
            Reply::Ok(None) => Err(ClientError::NoSuchHost),
            Reply::Err(message) => Err(ClientError::from_agent(message)),
        }
    }

    pub async fn lookup_txt(
        &self,
        cancel: &CancellationToken,
        slug: &str,
        name: &str,
        network: Option<&str>,
    ) -> Result<Vec<String>, ClientError> {
        let reply = self.request(cancel, "lookupTxt", &scoped(slug, &[name], network)).await?;
        json_payload(reply)
    }

    /// Instances of `app` as seen through the tunnel's internal DNS.
    pub async fn agent_instances(
        &self,
        cancel: &CancellationToken,
        org: &str,
        app: &str,
    ) -> Result<Instances, ClientError> {
        let reply = self.request(cancel, "instances", &[org, app]).await?;
        json_payload(reply)
    }

    /// Establish a tunnel and return a dialer through it.
    pub async fn dialer(
        &self,
        cancel: &CancellationToken,
        slug: &str,
        network: Option<&str>,
    ) -> Result<Dialer, ClientError> {
        let established = self.establish(cancel, slug, network).await?;
        Ok(Dialer::new(self.clone(), slug, network, established))
    }

    /// [`dialer`](Self::dialer), then wait for the tunnel to answer probes.
    pub async fn connect_to_tunnel(
        &self,
        cancel: &CancellationToken,
        slug: &str,
        network: Option<&str>,
    ) -> Result<Dialer, ClientError> {
        let dialer = self.dialer(cancel, slug, network).await?;
        self.wait_for_tunnel(cancel, slug, network)
            .await
            .map_err(|e| e.context(format!("tunnel unavailable for organization {slug}")))?;
        Ok(dialer)
    }

    /// Establish a tunnel and upgrade a fresh connection to relay pings.
    pub async fn pinger(
        &self,
        cancel: &CancellationToken,
        slug: &str,
        network: Option<&str>,
    ) -> Result<Pinger, ClientError> {
        self.establish(cancel, slug, network).await.map_err(|e| e.context("pinger"))?;
        let conn = self
            .upgrade(cancel, "ping6", &scoped(slug, &[], network))
            .await
            .map_err(|e| e.context("pinger"))?;
        Ok(Pinger::new(conn))
    }

    /// Poll `probe` until the tunnel answers, for up to the wait deadline.
    pub async fn wait_for_tunnel(
        &self,
        cancel: &CancellationToken,
        slug: &str,
        network: Option<&str>,
    ) -> Result<(), ClientError> {
        poll(
            cancel,
            self.waits,
            || ClientError::TunnelUnavailable,
            |e| matches!(e, ClientError::TunnelUnavailable),
            || self.probe(cancel, slug, network),
        )
        .await
    }

    /// Poll `resolve` until `host` has an address, for up to the wait
    /// deadline.
    pub async fn wait_for_dns(
        &self,
        cancel: &CancellationToken,
        slug: &str,
        host: &str,
        network: Option<&str>,
    ) -> Result<String, ClientError> {
        debug!(host, "waiting for host");
        poll(
            cancel,
            self.waits,
            || ClientError::NoSuchHost,
            |e| matches!(e, ClientError::NoSuchHost),
            || self.resolve(cancel, slug, host, network),
        )
        .await
    }

    /// Send one command and read its reply.
    pub(crate) async fn request(
        &self,
        cancel: &CancellationToken,
        verb: &str,
        args: &[&str],
    ) -> Result<Reply, ClientError> {
        with_cancel(cancel, async {
            let mut conn = self.open().await?;
            write_frame(&mut conn, verb, args).await?;
            Ok(Reply::parse(&read_frame(&mut conn).await?)?)
        })
        .await
    }

    /// Send a command that turns the connection into a stream, and hand
    /// the connection back once the agent accepts it.
    pub(crate) async fn upgrade(
        &self,
        cancel: &CancellationToken,
        verb: &str,
        args: &[&str],
    ) -> Result<Connection, ClientError> {
        with_cancel(cancel, async {
            let mut conn = self.open().await?;
            write_frame(&mut conn, verb, args).await?;
            empty_payload(Reply::parse(&read_frame(&mut conn).await?)?)?;
            Ok(conn)
        })
        .await
    }

    /// Connect and hand over our tokens. When the agent refuses them, the
    /// flag is latched and we reconnect without them.
    async fn open(&self) -> Result<Connection, ClientError> {
        loop {
            let mut conn = self.transport.connect().await?;
            let Some(credentials) = self.credentials.as_ref() else {
                return Ok(conn);
            };
            if self.refused.load(Ordering::Acquire) {
                return Ok(conn);
            }

            let [kind, value] = credentials.to_args();
            write_frame(&mut conn, "set-token", &[kind.as_str(), value.as_str()]).await?;
            match Reply::parse(&read_frame(&mut conn).await?)? {
                Reply::Ok(_) => return Ok(conn),
                Reply::Err(message) => {
                    warn!(error = %message, "agent refused tokens");
                    self.refused.store(true, Ordering::Release);
                }
            }
        }
    }
}

/// Run `op` unless `cancel` fires first. Dropping the losing operation
/// closes its connection.
async fn with_cancel<T>(
    cancel: &CancellationToken,
    op: impl Future<Output = Result<T, ClientError>>,
) -> Result<T, ClientError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ClientError::Cancelled),
        result = op => result,
    }
}

/// `slug`, then `extra`, then the network when one is named.
fn scoped<'a>(slug: &'a str, extra: &[&'a str], network: Option<&'a str>) -> Vec<&'a str> {
    let mut args = vec![slug];
    args.extend_from_slice(extra);
    args.extend(network);
    args
}

fn json_payload<T: DeserializeOwned>(reply: Reply) -> Result<T, ClientError> {
    match reply {
        Reply::Ok(Some(payload)) => Ok(Reply::decode(&payload)?),
        Reply::Ok(None) => Err(ProtocolError::InvalidResponse(b"ok".to_vec()).into()),
        Reply::Err(message) => Err(ClientError::from_agent(message)),
    }
}

fn empty_payload(reply: Reply) -> Result<(), ClientError> {
    match reply {
        Reply::Ok(None) => Ok(()),
        Reply::Ok(Some(payload)) => {
            Err(ProtocolError::InvalidResponse(format!("ok {payload}").into_bytes()).into())
        }
        Reply::Err(message) => Err(ClientError::from_agent(message)),
    }
}

#[cfg(all(test, unix))]
#[path = "client_tests.rs"]
mod tests;

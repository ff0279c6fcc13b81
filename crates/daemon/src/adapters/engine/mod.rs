// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tunnel engine seam.
//!
//! The engine owns key exchange and packet encryption. The agent only
//! negotiates tunnels through it and uses the resulting handles for name
//! lookups, dialing and ICMP relay.

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeEngine, FakeTunnel};

use std::net::Ipv6Addr;
use std::sync::Arc;

use async_trait::async_trait;
use fa_core::{TokenSet, TunnelConfig, TunnelKey, TunnelState};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// Errors from tunnel engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no tunnel engine is configured")]
    Unavailable,

    #[error("no such organization")]
    NoSuchOrg,

    #[error("failed negotiating tunnel: {0}")]
    Negotiate(String),

    #[error("lookup {name}: {message}")]
    Lookup { name: String, message: String },

    #[error("dial {addr}: {message}")]
    Dial { addr: String, message: String },

    #[error("tunnel closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Byte stream dialed through a tunnel
pub trait TunnelStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> TunnelStream for T {}

/// ICMPv6 endpoint inside a tunnel
#[async_trait]
pub trait PingSocket: Send + Sync {
    async fn send_to(&self, payload: &[u8], addr: Ipv6Addr) -> Result<(), EngineError>;

    /// Receive one echo reply into `buf`, returning its length and sender.
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, Ipv6Addr), EngineError>;
}

/// A negotiated tunnel
#[async_trait]
pub trait Tunnel: Send + Sync {
    fn state(&self) -> &TunnelState;

    fn config(&self) -> &TunnelConfig;

    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, EngineError>;

    async fn lookup_aaaa(&self, name: &str) -> Result<Vec<Ipv6Addr>, EngineError>;

    /// Open a TCP stream to `addr` (`host:port`) through the tunnel.
    async fn dial(&self, addr: &str) -> Result<Box<dyn TunnelStream>, EngineError>;

    async fn listen_ping(&self) -> Result<Arc<dyn PingSocket>, EngineError>;

    async fn close(&self) -> Result<(), EngineError>;
}

/// Negotiates tunnels for an organization's network
#[async_trait]
pub trait TunnelEngine: Send + Sync {
    /// Negotiate a tunnel for `key` using `tokens`. With `recycle`, any
    /// cached peer for the key is discarded and a fresh one created.
    async fn negotiate(
        &self,
        tokens: &TokenSet,
        key: &TunnelKey,
        recycle: bool,
    ) -> Result<Arc<dyn Tunnel>, EngineError>;
}

/// Engine used when no tunnel implementation is linked in. Every
/// negotiation fails; commands that need no tunnel keep working.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnavailableEngine;

#[async_trait]
impl TunnelEngine for UnavailableEngine {
    async fn negotiate(
        &self,
        _tokens: &TokenSet,
        _key: &TunnelKey,
        _recycle: bool,
    ) -> Result<Arc<dyn Tunnel>, EngineError> {
        Err(EngineError::Unavailable)
    }
}

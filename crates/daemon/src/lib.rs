// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! fly agent daemon library
//!
//! Binds the agent socket and serves the wire protocol: one session per
//! connection, a tunnel registry keyed by organization and network, and a
//! periodic sweep that closes tunnels whose peers are gone.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
mod config_watch;
mod lifecycle;
mod listener;
mod registry;

pub use adapters::{
    ConfigPeers, EngineError, PeerError, PeerStore, PeerValidator, PingSocket, Tunnel,
    TunnelEngine, TunnelStream, UnavailableEngine,
};
#[cfg(any(test, feature = "test-support"))]
pub use adapters::{FakeEngine, FakePeers, FakeTunnel};
pub use lifecycle::{run, Backends, DaemonError, ServeOptions, SWEEP_INTERVAL};
pub use registry::TunnelRegistry;

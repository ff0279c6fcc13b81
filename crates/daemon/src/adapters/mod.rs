// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapters for the tunnel engine and upstream peer validation

pub mod engine;
pub mod peers;

pub use engine::{EngineError, PingSocket, Tunnel, TunnelEngine, TunnelStream, UnavailableEngine};
pub use peers::{ConfigPeers, PeerError, PeerStore, PeerValidator};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use engine::{FakeEngine, FakeTunnel};
#[cfg(any(test, feature = "test-support"))]
pub use peers::FakePeers;

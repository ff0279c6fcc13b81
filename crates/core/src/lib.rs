// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fa-core: shared types for the fly agent and its clients

pub mod config_file;
pub mod credentials;
pub mod env;
pub mod paths;
pub mod telemetry;
pub mod tokens;
pub mod tunnel;

pub use config_file::{ConfigError, ConfigFile};
pub use credentials::Credentials;
pub use paths::Paths;
#[cfg(any(test, feature = "test-support"))]
pub use telemetry::RecordingTelemetry;
pub use telemetry::{LogTelemetry, Telemetry, TelemetryEvent};
pub use tokens::{TokenSet, TokenSource};
pub use tunnel::{PeerConfig, TunnelConfig, TunnelKey, TunnelState};

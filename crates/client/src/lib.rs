// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fa-client: talks to the fly agent on behalf of short-lived CLI commands.
//!
//! [`Client`] issues one command per connection. [`Supervisor`] finds a
//! running agent, replaces a stale one, or starts a fresh one.

mod client;
mod dialer;
mod error;
mod instances;
mod pinger;
mod supervisor;
mod transport;
mod wait;

#[cfg(all(test, unix))]
mod test_agent;

pub use client::Client;
pub use dialer::Dialer;
pub use error::ClientError;
#[cfg(any(test, feature = "test-support"))]
pub use instances::FakeInstanceApi;
pub use instances::InstanceApi;
pub use pinger::{Pinger, PingerError};
#[cfg(any(test, feature = "test-support"))]
pub use supervisor::FakeLauncher;
pub use supervisor::{
    latest_log, DaemonLauncher, ExecLauncher, LaunchRequest, StartError, Supervisor,
};
pub use transport::{default_transport, AgentStream, Connection, Transport, UnixTransport};
#[cfg(windows)]
pub use transport::PipeTransport;
pub use wait::WaitOptions;

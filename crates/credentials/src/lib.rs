// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background credential refresh.
//!
//! Keeps a shared [`TokenSet`] valid for the life of a process: mints
//! macaroons for organizations the user has joined, prunes ones for
//! organizations they left, refreshes expired discharges and keeps the
//! in-memory set in step with the config file.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod authority;
mod monitor;
mod org_tokens;
mod refresher;

pub use authority::{Discharger, NoAuthority, RefreshError, TokenAuthority, UserUrlCallback};
#[cfg(any(test, feature = "test-support"))]
pub use authority::{FakeAuthority, FakeDischarger};
pub use monitor::{monitor_tokens, MonitorOptions, TokenMonitor};
pub use org_tokens::fetch_org_tokens;
pub use refresher::{Outcome, Refresher};

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded polling for conditions that settle on their own (a tunnel
//! coming up, a DNS entry registering).

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::ClientError;

/// Polling cadence and overall deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub interval: Duration,
    pub deadline: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self { interval: Duration::from_millis(50), deadline: Duration::from_secs(4 * 60) }
    }
}

/// Call `attempt` until it returns something other than a `retry` error.
///
/// When our own deadline passes first the result is `expired()`; the
/// caller's cancellation is reported as [`ClientError::Cancelled`].
pub(crate) async fn poll<T, Fut>(
    cancel: &CancellationToken,
    options: WaitOptions,
    expired: impl Fn() -> ClientError,
    retry: impl Fn(&ClientError) -> bool,
    mut attempt: impl FnMut() -> Fut,
) -> Result<T, ClientError>
where
    Fut: Future<Output = Result<T, ClientError>>,
{
    let deadline = Instant::now() + options.deadline;
    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            _ = sleep_until(deadline) => return Err(expired()),
            result = attempt() => result,
        };
        match result {
            Err(e) if retry(&e) => {}
            other => return other,
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            _ = sleep_until(deadline) => return Err(expired()),
            _ = sleep(options.interval) => {}
        }
    }
}

#[cfg(test)]
#[path = "wait_tests.rs"]
mod tests;

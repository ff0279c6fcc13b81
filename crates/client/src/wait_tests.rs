// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;

fn options() -> WaitOptions {
    WaitOptions { interval: Duration::from_millis(50), deadline: Duration::from_secs(4 * 60) }
}

async fn unavailable_until(calls: &AtomicUsize, succeed_on: usize) -> Result<u32, ClientError> {
    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
    if n >= succeed_on {
        Ok(7)
    } else {
        Err(ClientError::TunnelUnavailable)
    }
}

fn is_unavailable(e: &ClientError) -> bool {
    matches!(e, ClientError::TunnelUnavailable)
}

#[tokio::test(start_paused = true)]
async fn returns_after_the_first_success() {
    let calls = AtomicUsize::new(0);
    let cancel = CancellationToken::new();

    let result = poll(
        &cancel,
        options(),
        || ClientError::TunnelUnavailable,
        is_unavailable,
        || unavailable_until(&calls, 3),
    )
    .await;

    assert_eq!(result.unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn expires_at_the_deadline_and_not_before() {
    let calls = AtomicUsize::new(0);
    let cancel = CancellationToken::new();
    let started = Instant::now();

    let result = poll(
        &cancel,
        options(),
        || ClientError::NoSuchHost,
        is_unavailable,
        || unavailable_until(&calls, usize::MAX),
    )
    .await;

    assert!(matches!(result, Err(ClientError::NoSuchHost)));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(4 * 60), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(4 * 60) + Duration::from_millis(100), "{elapsed:?}");
    assert!(calls.load(Ordering::SeqCst) > 1000);
}

#[tokio::test(start_paused = true)]
async fn other_errors_end_the_wait() {
    let cancel = CancellationToken::new();

    let result: Result<(), _> = poll(
        &cancel,
        options(),
        || ClientError::TunnelUnavailable,
        is_unavailable,
        || async { Err(ClientError::Agent("no such organization".into())) },
    )
    .await;

    assert!(matches!(result, Err(ClientError::Agent(ref m)) if m == "no such organization"));
}

#[tokio::test(start_paused = true)]
async fn caller_cancellation_is_not_a_semantic_error() {
    let calls = AtomicUsize::new(0);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let result = poll(
        &cancel,
        options(),
        || ClientError::TunnelUnavailable,
        is_unavailable,
        || unavailable_until(&calls, usize::MAX),
    )
    .await;

    assert!(matches!(result, Err(ClientError::Cancelled)));
}

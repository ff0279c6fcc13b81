// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One session per accepted connection.

use std::fmt;
use std::sync::Arc;

use fa_core::{Credentials, TokenSet};
use fa_wire::{read_frame, write_err, write_json, write_ok, Command, ProtocolError};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::{handlers, relay, ListenCtx};

/// Diagnostic id, rendered `#<hex>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:x}", self.0)
    }
}

/// Byte stream a session runs over
pub(crate) trait Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> Stream for T {}

pub(crate) async fn run<S: Stream>(ctx: Arc<ListenCtx>, stream: S) {
    debug!("connected ...");
    let shutdown = ctx.shutdown.clone();
    tokio::select! {
        _ = shutdown.cancelled() => {}
        _ = serve(&ctx, stream) => {}
    }
    debug!("dropped.");
}

/// Read commands until one that isn't `set-token`, and dispatch it.
async fn serve<S: Stream>(ctx: &ListenCtx, mut stream: S) {
    if let Err(e) = ctx.check_config_change().await {
        err(&mut stream, &e.to_string()).await;
        return;
    }

    let mut session_tokens: Option<TokenSet> = None;
    loop {
        let frame = match read_frame(&mut stream).await {
            Ok(frame) => frame,
            Err(ProtocolError::ConnectionClosed) => return,
            Err(e) => {
                debug!(error = %e, "failed reading");
                return;
            }
        };
        debug!(len = frame.len(), "<- {:?}", String::from_utf8_lossy(&frame));

        let command = Command::parse(&frame);
        if command.verb == "set-token" {
            match session_token_set(&command) {
                Ok(tokens) => {
                    session_tokens = Some(tokens);
                    ok(&mut stream, None).await;
                    continue;
                }
                Err(message) => {
                    err(&mut stream, &message).await;
                    return;
                }
            }
        }

        let tokens = session_tokens.unwrap_or_else(|| ctx.tokens.lock().clone());
        dispatch(ctx, stream, command, tokens).await;
        return;
    }
}

async fn dispatch<S: Stream>(ctx: &ListenCtx, mut stream: S, command: Command, tokens: TokenSet) {
    let args: Vec<&str> = command.args.iter().map(String::as_str).collect();
    match command.verb.as_str() {
        "ping" => handlers::ping(ctx, &mut stream, &args).await,
        "kill" => handlers::kill(ctx, &mut stream, &args).await,
        "establish" => handlers::establish(ctx, &mut stream, &args, &tokens, false).await,
        "reestablish" => handlers::establish(ctx, &mut stream, &args, &tokens, true).await,
        "probe" => handlers::probe(ctx, &mut stream, &args).await,
        "resolve" => handlers::resolve(ctx, &mut stream, &args).await,
        "lookupTxt" => handlers::lookup_txt(ctx, &mut stream, &args).await,
        "instances" => handlers::instances(ctx, &mut stream, &args).await,
        "connect" => relay::connect(ctx, stream, &args).await,
        "ping6" => relay::ping6(ctx, stream, &args).await,
        _ => {
            err(&mut stream, "unsupported command").await;
        }
    }
}

/// Tokens named by `set-token cfg <path>` or `set-token str <tokens>`.
fn session_token_set(command: &Command) -> Result<TokenSet, String> {
    let credentials = match (command.arg(0), command.arg(1), command.args.len()) {
        (Some(kind), Some(value), 2) => Credentials::from_args(kind, value),
        _ => None,
    };
    let Some(credentials) = credentials else {
        return Err("malformed set-token command".to_string());
    };
    credentials.load().map_err(|e| e.to_string())
}

/// Write `ok` or `ok <payload>`. Write failures only end the session.
pub(super) async fn ok<S: Stream>(stream: &mut S, payload: Option<&str>) -> bool {
    debug!(len = payload.map_or(2, |p| p.len() + 3), "-> ok");
    log_write(write_ok(stream, payload).await)
}

pub(super) async fn err<S: Stream>(stream: &mut S, message: &str) -> bool {
    debug!(len = message.len() + 4, "-> err {message}");
    log_write(write_err(stream, message).await)
}

pub(super) async fn json<S: Stream, T: Serialize>(stream: &mut S, value: &T) -> bool {
    log_write(write_json(stream, value).await)
}

fn log_write(result: Result<(), ProtocolError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            debug!(error = %e, "failed writing");
            false
        }
    }
}

/// Reject argument lists outside `min..=max` with `malformed <verb> command`.
pub(super) async fn arity<S: Stream>(
    stream: &mut S,
    verb: &str,
    args: &[&str],
    min: usize,
    max: usize,
) -> bool {
    if (min..=max).contains(&args.len()) {
        return true;
    }
    err(stream, &format!("malformed {verb} command")).await;
    false
}

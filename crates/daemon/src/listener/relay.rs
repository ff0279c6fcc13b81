// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Commands that turn the connection into a relay after their reply.

use std::time::Duration;

use fa_wire::{PingMessage, ProtocolError, MAX_PING_PAYLOAD};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::handlers::{resolve_addr, tunnel_for, NO_SUCH_HOST, TUNNEL_UNAVAILABLE};
use super::session::{arity, err, ok, Stream};
use super::ListenCtx;

/// `connect <org> <addr> <timeout-ms> [network]`: dial through the tunnel,
/// reply `ok`, then copy bytes both ways until either side closes.
pub(super) async fn connect<S: Stream>(ctx: &ListenCtx, mut stream: S, args: &[&str]) {
    if !arity(&mut stream, "connect", args, 3, 4).await {
        return;
    }
    let Ok(timeout_ms) = args[2].parse::<u64>() else {
        err(&mut stream, "invalid timeout").await;
        return;
    };
    let Some(tunnel) = tunnel_for(ctx, args[0], args.get(3).copied()).await else {
        err(&mut stream, TUNNEL_UNAVAILABLE).await;
        return;
    };

    let addr = match resolve_addr(tunnel.as_ref(), args[1]).await {
        Ok(Some(addr)) => addr,
        Ok(None) => {
            err(&mut stream, NO_SUCH_HOST).await;
            return;
        }
        Err(e) => {
            err(&mut stream, &e.to_string()).await;
            return;
        }
    };

    let dialed = if timeout_ms > 0 {
        match tokio::time::timeout(Duration::from_millis(timeout_ms), tunnel.dial(&addr)).await {
            Ok(dialed) => dialed.map_err(|e| e.to_string()),
            Err(_) => Err(format!("dial {addr}: timed out")),
        }
    } else {
        tunnel.dial(&addr).await.map_err(|e| e.to_string())
    };
    let mut outconn = match dialed {
        Ok(outconn) => outconn,
        Err(message) => {
            err(&mut stream, &message).await;
            return;
        }
    };

    if !ok(&mut stream, None).await {
        return;
    }
    match tokio::io::copy_bidirectional(&mut stream, &mut outconn).await {
        Ok((sent, received)) => debug!(addr = %addr, sent, received, "connection closed"),
        Err(e) => debug!(addr = %addr, error = %e, "connection dropped"),
    }
    let _ = outconn.shutdown().await;
}

/// `ping6 <org> [network]`: reply `ok`, then relay ping messages between
/// the connection and the tunnel's ICMP socket until either side fails.
pub(super) async fn ping6<S: Stream>(ctx: &ListenCtx, mut stream: S, args: &[&str]) {
    if !arity(&mut stream, "ping6", args, 1, 2).await {
        return;
    }
    let Some(tunnel) = tunnel_for(ctx, args[0], args.get(1).copied()).await else {
        err(&mut stream, TUNNEL_UNAVAILABLE).await;
        return;
    };
    let socket = match tunnel.listen_ping().await {
        Ok(socket) => socket,
        Err(e) => {
            err(&mut stream, &format!("ping6: {e}")).await;
            return;
        }
    };
    if !ok(&mut stream, None).await {
        return;
    }

    let (mut reader, mut writer) = tokio::io::split(stream);

    let replies = async {
        let mut buf = vec![0u8; MAX_PING_PAYLOAD];
        loop {
            let (n, from) = match socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    debug!(error = %e, "ping6: socket read error");
                    return;
                }
            };
            let Ok(message) = PingMessage::new(from, &buf[..n]).encode() else {
                debug!(len = n, "ping6: dropping oversized reply");
                continue;
            };
            if writer.write_all(&message).await.is_err() {
                return;
            }
        }
    };

    let requests = async {
        loop {
            let message = match PingMessage::read_from(&mut reader).await {
                Ok(message) => message,
                Err(ProtocolError::ConnectionClosed) => return,
                Err(e) => {
                    debug!(error = %e, "ping6: connection read error");
                    return;
                }
            };
            if let Err(e) = socket.send_to(&message.payload, message.addr).await {
                debug!(error = %e, "ping6: socket write error");
                return;
            }
        }
    };

    tokio::select! {
        _ = replies => {}
        _ = requests => {}
    }
}

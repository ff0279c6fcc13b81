// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ICMP relay over an agent connection upgraded with `ping6`.
//!
//! Each message in either direction is a 16-byte IPv6 address, a 2-byte
//! big-endian length and the ICMP message. The agent's netstack only
//! answers echo requests with code 0 and computes checksums itself.

use std::net::{IpAddr, Ipv6Addr};
use std::time::Duration;

use fa_wire::{PingMessage, ProtocolError, MAX_PING_PAYLOAD};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::Instant;

use crate::transport::Connection;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PingerError {
    /// No complete message arrived in time; the pinger stays usable
    #[error("icmp read: timed out")]
    Timeout,

    #[error("icmp write: too large ({0} >= 1500 bytes)")]
    TooLarge(usize),

    #[error("icmp write: bad address type {0}")]
    BadAddress(IpAddr),

    /// The connection failed; every later call returns this again
    #[error("{0}")]
    Fatal(String),
}

pub struct Pinger {
    conn: Connection,
    /// Bytes of a message not yet complete
    pending: Vec<u8>,
    err: Option<PingerError>,
}

impl Pinger {
    pub(crate) fn new(conn: Connection) -> Self {
        Self { conn, pending: Vec::new(), err: None }
    }

    /// The latched fatal error, if any.
    pub fn err(&self) -> Option<&PingerError> {
        self.err.as_ref()
    }

    /// Send one ICMP message to `addr`, which must be an IPv6 address.
    pub async fn write_to(&mut self, payload: &[u8], addr: IpAddr) -> Result<usize, PingerError> {
        if let Some(e) = &self.err {
            return Err(e.clone());
        }
        if payload.len() >= MAX_PING_PAYLOAD {
            return Err(PingerError::TooLarge(payload.len()));
        }
        let IpAddr::V6(v6) = addr else {
            return Err(PingerError::BadAddress(addr));
        };

        let message = PingMessage::new(v6, payload)
            .encode()
            .map_err(|_| PingerError::TooLarge(payload.len()))?;
        if let Err(e) = self.conn.write_all(&message).await {
            return Err(self.latch(format!("icmp write: {e}")));
        }
        Ok(payload.len())
    }

    /// Receive one ICMP message into `buf`, returning the bytes copied and
    /// the sender. With a `timeout`, [`PingerError::Timeout`] is returned
    /// when no whole message arrives in time; partial bytes are kept for
    /// the next call.
    pub async fn read_from(
        &mut self,
        buf: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<(usize, Ipv6Addr), PingerError> {
        if let Some(e) = &self.err {
            return Err(e.clone());
        }
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            match PingMessage::decode(&self.pending) {
                Ok(Some((message, used))) => {
                    self.pending.drain(..used);
                    let n = message.payload.len().min(buf.len());
                    buf[..n].copy_from_slice(&message.payload[..n]);
                    return Ok((n, message.addr));
                }
                Ok(None) => {}
                Err(e) => return Err(self.latch(format!("icmp read: {e}"))),
            }

            let mut chunk = [0u8; 2048];
            let read = self.conn.read(&mut chunk);
            let result = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, read).await {
                    Ok(result) => result,
                    Err(_) => return Err(PingerError::Timeout),
                },
                None => read.await,
            };
            match result {
                Ok(0) => {
                    let e = ProtocolError::ConnectionClosed;
                    return Err(self.latch(format!("icmp read: {e}")));
                }
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) => return Err(self.latch(format!("icmp read: {e}"))),
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.conn.shutdown().await;
    }

    fn latch(&mut self, message: String) -> PingerError {
        let e = PingerError::Fatal(message);
        self.err = Some(e.clone());
        e
    }
}

#[cfg(test)]
#[path = "pinger_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Framing for ICMP messages relayed over a `ping6` connection.
//!
//! Each message is a 16-byte IPv6 address, a 2-byte big-endian length and
//! the ICMP payload, in both directions.

use std::net::Ipv6Addr;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::frame::ProtocolError;

/// Payloads must be strictly shorter than this
pub const MAX_PING_PAYLOAD: usize = 1500;

/// Address plus length prefix
pub const PING_HEADER_LEN: usize = 18;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingMessage {
    pub addr: Ipv6Addr,
    pub payload: Vec<u8>,
}

impl PingMessage {
    pub fn new(addr: Ipv6Addr, payload: impl Into<Vec<u8>>) -> Self {
        Self { addr, payload: payload.into() }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let len = self.payload.len();
        if len >= MAX_PING_PAYLOAD {
            return Err(ProtocolError::PayloadTooLarge(len));
        }
        let mut buf = Vec::with_capacity(PING_HEADER_LEN + len);
        buf.extend_from_slice(&self.addr.octets());
        buf.extend_from_slice(&(len as u16).to_be_bytes());
        buf.extend_from_slice(&self.payload);
        Ok(buf)
    }

    /// Decode one message from the front of `buf`.
    ///
    /// Returns the message and the bytes it occupied, or `None` while `buf`
    /// holds less than a whole message.
    pub fn decode(buf: &[u8]) -> Result<Option<(Self, usize)>, ProtocolError> {
        if buf.len() < PING_HEADER_LEN {
            return Ok(None);
        }
        let len = u16::from_be_bytes([buf[16], buf[17]]) as usize;
        if len >= MAX_PING_PAYLOAD {
            return Err(ProtocolError::PayloadTooLarge(len));
        }
        let end = PING_HEADER_LEN + len;
        if buf.len() < end {
            return Ok(None);
        }
        let mut octets = [0u8; 16];
        octets.copy_from_slice(&buf[..16]);
        Ok(Some((Self::new(Ipv6Addr::from(octets), &buf[PING_HEADER_LEN..end]), end)))
    }

    /// Read exactly one message. A stream ending cleanly between messages
    /// yields `ConnectionClosed`.
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, ProtocolError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut header = [0u8; PING_HEADER_LEN];
        let mut filled = 0;
        while filled < header.len() {
            match reader.read(&mut header[filled..]).await? {
                0 if filled == 0 => return Err(ProtocolError::ConnectionClosed),
                0 => {
                    return Err(ProtocolError::ShortRead {
                        expected: PING_HEADER_LEN,
                        received: filled,
                    })
                }
                n => filled += n,
            }
        }
        let len = u16::from_be_bytes([header[16], header[17]]) as usize;
        if len >= MAX_PING_PAYLOAD {
            return Err(ProtocolError::PayloadTooLarge(len));
        }
        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload).await?;
        let mut octets = [0u8; 16];
        octets.copy_from_slice(&header[..16]);
        Ok(Self { addr: Ipv6Addr::from(octets), payload })
    }
}

#[cfg(test)]
#[path = "ping_tests.rs"]
mod tests;

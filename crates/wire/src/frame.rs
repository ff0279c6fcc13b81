// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Length-prefixed frame codec.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest frame body the 16-bit length prefix can describe
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection closed")]
    ConnectionClosed,

    #[error("short read: expected {expected} bytes, received {received}")]
    ShortRead { expected: usize, received: usize },

    #[error("frame too large: {0} bytes (max 65535)")]
    FrameTooLarge(usize),

    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("invalid server response: {:?}", String::from_utf8_lossy(.0))]
    InvalidResponse(Vec<u8>),

    #[error("failed decoding response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A received frame split into verb and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub verb: String,
    pub args: Vec<String>,
}

impl Command {
    /// Split a frame body on single spaces. No unescaping is performed.
    pub fn parse(frame: &[u8]) -> Self {
        let text = String::from_utf8_lossy(frame);
        let mut parts = text.split(' ').map(str::to_string);
        let verb = parts.next().unwrap_or_default();
        Self { verb, args: parts.collect() }
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}

/// Encode `verb( arg)*` behind its length prefix.
///
/// Arguments are joined verbatim; callers must keep spaces out of them.
pub fn encode_frame(verb: &str, args: &[&str]) -> Result<Vec<u8>, ProtocolError> {
    let len = verb.len() + args.iter().map(|a| a.len() + 1).sum::<usize>();
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    let mut buf = Vec::with_capacity(2 + len);
    buf.extend_from_slice(&(len as u16).to_le_bytes());
    buf.extend_from_slice(verb.as_bytes());
    for arg in args {
        buf.push(b' ');
        buf.extend_from_slice(arg.as_bytes());
    }
    Ok(buf)
}

/// Write one frame in a single write.
pub async fn write_frame<W>(writer: &mut W, verb: &str, args: &[&str]) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let buf = encode_frame(verb, args)?;
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame and return its body verbatim.
///
/// A stream that ends before the first byte yields `ConnectionClosed`; one
/// that ends anywhere later yields `ShortRead`.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, ProtocolError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut len_buf = [0u8; 2];
    let received = read_full(reader, &mut len_buf).await?;
    if received == 0 {
        return Err(ProtocolError::ConnectionClosed);
    }
    if received < len_buf.len() {
        return Err(ProtocolError::ShortRead { expected: len_buf.len(), received });
    }

    let len = u16::from_le_bytes(len_buf) as usize;
    let mut body = vec![0u8; len];
    let received = read_full(reader, &mut body).await?;
    if received < len {
        return Err(ProtocolError::ShortRead { expected: len, received });
    }
    Ok(body)
}

/// Fill `buf` unless the stream ends first; returns the bytes received.
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> Result<usize, ProtocolError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `ok`/`err` reply convention layered on top of frames.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncWrite;

use crate::frame::{write_frame, ProtocolError};

const OK: &[u8] = b"ok";
const OK_PREFIX: &[u8] = b"ok ";
const ERR_PREFIX: &[u8] = b"err ";

/// A decoded reply frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `ok` with an optional payload
    Ok(Option<String>),
    /// `err <message>`
    Err(String),
}

impl Reply {
    /// Classify a reply frame; anything without a recognized prefix is an
    /// `InvalidResponse` carrying the raw bytes.
    pub fn parse(data: &[u8]) -> Result<Self, ProtocolError> {
        if data == OK {
            return Ok(Reply::Ok(None));
        }
        if let Some(rest) = data.strip_prefix(OK_PREFIX) {
            return Ok(Reply::Ok(Some(String::from_utf8_lossy(rest).into_owned())));
        }
        if let Some(rest) = data.strip_prefix(ERR_PREFIX) {
            return Ok(Reply::Err(String::from_utf8_lossy(rest).into_owned()));
        }
        Err(ProtocolError::InvalidResponse(data.to_vec()))
    }

    /// Decode a JSON payload.
    pub fn decode<T: DeserializeOwned>(payload: &str) -> Result<T, ProtocolError> {
        Ok(serde_json::from_str(payload)?)
    }
}

pub async fn write_ok<W>(writer: &mut W, payload: Option<&str>) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    match payload {
        Some(payload) => write_frame(writer, "ok", &[payload]).await,
        None => write_frame(writer, "ok", &[]).await,
    }
}

/// Reply `ok <json>`.
pub async fn write_json<W, T>(writer: &mut W, value: &T) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin + ?Sized,
    T: Serialize + ?Sized,
{
    let json = serde_json::to_string(value)?;
    write_frame(writer, "ok", &[json.as_str()]).await
}

pub async fn write_err<W>(writer: &mut W, message: &str) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    write_frame(writer, "err", &[message]).await
}

#[cfg(test)]
#[path = "reply_tests.rs"]
mod tests;

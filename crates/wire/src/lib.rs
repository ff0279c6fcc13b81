// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent wire protocol.
//!
//! Wire format: 2-byte length prefix (little-endian) + `verb( arg)*`.
//! Replies follow the `ok`, `ok <payload>`, `err <message>` convention.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod frame;
mod ping;
mod reply;
mod types;

pub use frame::{encode_frame, read_frame, write_frame, Command, ProtocolError, MAX_FRAME_LEN};
pub use ping::{PingMessage, MAX_PING_PAYLOAD, PING_HEADER_LEN};
pub use reply::{write_err, write_json, write_ok, Reply};
pub use types::{EstablishResponse, Instances, PingResponse};

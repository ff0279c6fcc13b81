// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::frame::read_frame;
use crate::PingResponse;

#[yare::parameterized(
    bare_ok = { b"ok", Reply::Ok(None) },
    ok_payload = { b"ok fdaa::3:443", Reply::Ok(Some("fdaa::3:443".into())) },
    ok_empty_payload = { b"ok ", Reply::Ok(Some(String::new())) },
    err_message = { b"err tunnel unavailable", Reply::Err("tunnel unavailable".into()) },
)]
fn parse_reply(data: &[u8], expected: Reply) {
    assert_eq!(Reply::parse(data).unwrap(), expected);
}

#[yare::parameterized(
    unknown = { b"maybe" },
    ok_without_space = { b"okay" },
    bare_err = { b"err" },
    empty = { b"" },
)]
fn parse_rejects_unprefixed(data: &[u8]) {
    match Reply::parse(data) {
        Err(ProtocolError::InvalidResponse(raw)) => assert_eq!(raw, data),
        other => panic!("expected InvalidResponse, got {other:?}"),
    }
}

#[test]
fn invalid_response_message_shows_raw_bytes() {
    let err = Reply::parse(b"nope").unwrap_err();
    assert_eq!(err.to_string(), "invalid server response: \"nope\"");
}

#[tokio::test]
async fn ping_reply_end_to_end() {
    let (mut a, mut b) = tokio::io::duplex(256);
    let sent = PingResponse { pid: 1234, version: semver::Version::new(1, 0, 0), background: true };
    write_json(&mut a, &sent).await.unwrap();

    let frame = read_frame(&mut b).await.unwrap();
    assert_eq!(frame, br#"ok {"PID":1234,"Version":"1.0.0","Background":true}"#);
    let Reply::Ok(Some(payload)) = Reply::parse(&frame).unwrap() else {
        panic!("expected ok payload");
    };
    assert_eq!(Reply::decode::<PingResponse>(&payload).unwrap(), sent);
}

#[tokio::test]
async fn write_err_and_bare_ok() {
    let (mut a, mut b) = tokio::io::duplex(64);
    write_err(&mut a, "no such host").await.unwrap();
    write_ok(&mut a, None).await.unwrap();
    assert_eq!(read_frame(&mut b).await.unwrap(), b"err no such host");
    assert_eq!(read_frame(&mut b).await.unwrap(), b"ok");
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::net::Ipv4Addr;

use tokio::io::DuplexStream;

use super::*;

const ADDR: Ipv6Addr = Ipv6Addr::new(0xfdaa, 0, 0x12, 0xa7b, 0, 0, 0, 2);

fn pinger() -> (Pinger, DuplexStream) {
    let (local, remote) = tokio::io::duplex(8192);
    (Pinger::new(Box::new(local)), remote)
}

#[tokio::test]
async fn writes_address_length_and_payload() {
    let (mut pinger, mut remote) = pinger();

    let n = pinger.write_to(b"echo", IpAddr::V6(ADDR)).await.unwrap();

    assert_eq!(n, 4);
    let received = PingMessage::read_from(&mut remote).await.unwrap();
    assert_eq!(received, PingMessage::new(ADDR, b"echo".to_vec()));
}

#[tokio::test]
async fn rejects_oversized_payloads_without_latching() {
    let (mut pinger, _remote) = pinger();

    let result = pinger.write_to(&[0u8; 1500], IpAddr::V6(ADDR)).await;

    assert_eq!(result, Err(PingerError::TooLarge(1500)));
    assert!(pinger.err().is_none());
    assert!(pinger.write_to(&[0u8; 1499], IpAddr::V6(ADDR)).await.is_ok());
}

#[tokio::test]
async fn rejects_ipv4_destinations() {
    let (mut pinger, _remote) = pinger();
    let v4 = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));

    assert_eq!(pinger.write_to(b"echo", v4).await, Err(PingerError::BadAddress(v4)));
}

#[tokio::test]
async fn reads_a_message_split_across_writes() {
    let (mut pinger, mut remote) = pinger();
    let encoded = PingMessage::new(ADDR, b"reply".to_vec()).encode().unwrap();
    let (head, tail) = encoded.split_at(10);

    remote.write_all(head).await.unwrap();
    let timeout = Some(Duration::from_millis(20));
    let mut buf = [0u8; 64];
    assert_eq!(pinger.read_from(&mut buf, timeout).await, Err(PingerError::Timeout));
    assert!(pinger.err().is_none());

    remote.write_all(tail).await.unwrap();
    let (n, from) = pinger.read_from(&mut buf, timeout).await.unwrap();

    assert_eq!(&buf[..n], b"reply");
    assert_eq!(from, ADDR);
}

#[tokio::test]
async fn reads_back_to_back_messages() {
    let (mut pinger, mut remote) = pinger();
    for payload in [&b"one"[..], &b"two"[..]] {
        remote.write_all(&PingMessage::new(ADDR, payload).encode().unwrap()).await.unwrap();
    }

    let mut buf = [0u8; 64];
    let (n, _) = pinger.read_from(&mut buf, None).await.unwrap();
    assert_eq!(&buf[..n], b"one");
    let (n, _) = pinger.read_from(&mut buf, None).await.unwrap();
    assert_eq!(&buf[..n], b"two");
}

#[tokio::test]
async fn closed_connection_latches_a_fatal_error() {
    let (mut pinger, remote) = pinger();
    drop(remote);

    let mut buf = [0u8; 64];
    let first = pinger.read_from(&mut buf, None).await;

    assert!(matches!(first, Err(PingerError::Fatal(_))), "{first:?}");
    assert_eq!(pinger.err().cloned(), first.err());
    let write = pinger.write_to(b"echo", IpAddr::V6(ADDR)).await;
    assert!(matches!(write, Err(PingerError::Fatal(_))));
}

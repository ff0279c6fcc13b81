// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn ping_response_uses_capitalized_field_names() {
    let json = r#"{"PID":1234,"Version":"1.0.0","Background":true}"#;
    let ping: PingResponse = serde_json::from_str(json).unwrap();

    assert_eq!(
        ping,
        PingResponse { pid: 1234, version: semver::Version::new(1, 0, 0), background: true }
    );
    assert_eq!(serde_json::to_string(&ping).unwrap(), json);
}

#[test]
fn ping_response_rejects_a_bad_version() {
    let json = r#"{"PID":1,"Version":"latest","Background":false}"#;
    assert!(serde_json::from_str::<PingResponse>(json).is_err());
}

#[test]
fn instances_default_missing_lists() {
    let instances: Instances = serde_json::from_str("{}").unwrap();
    assert!(instances.is_empty());
}

#[test]
fn instances_push_keeps_lists_parallel() {
    let mut instances = Instances::default();
    instances.push("web", "fdaa::3");
    instances.push("worker", "fdaa::2");

    assert_eq!(instances.labels, vec!["web", "worker"]);
    assert_eq!(instances.addresses, vec!["fdaa::3", "fdaa::2"]);
}

#[test]
fn sorted_addresses_ignore_order() {
    let mut a = Instances::default();
    a.push("one", "fdaa::2");
    a.push("two", "fdaa::1");
    let mut b = Instances::default();
    b.push("two", "fdaa::1");
    b.push("one", "fdaa::2");

    assert_eq!(a.sorted_addresses(), b.sorted_addresses());
    assert_eq!(a.sorted_addresses(), vec!["fdaa::1", "fdaa::2"]);
}

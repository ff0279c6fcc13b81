// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    default_network = { "personal", "personal", "" },
    named_network = { "acme/staging", "acme", "staging" },
)]
fn parse_config_key(raw: &str, org: &str, network: &str) {
    let key = TunnelKey::parse(raw);
    assert_eq!(key, TunnelKey::new(org, network));
    assert_eq!(key.to_string(), raw);
}

#[test]
fn empty_network_is_default() {
    assert_eq!(TunnelKey::from_args("acme", None), TunnelKey::org("acme"));
    assert_eq!(TunnelKey::org("acme").network(), None);
    assert_eq!(TunnelKey::from_args("acme", Some("dev")).network(), Some("dev"));
}

#[test]
fn state_knows_its_key() {
    let state = TunnelState { org: "acme".into(), network: "dev".into(), ..Default::default() };
    assert_eq!(state.key(), TunnelKey::new("acme", "dev"));
}

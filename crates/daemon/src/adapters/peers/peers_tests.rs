// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

fn state(org: &str, network: &str) -> TunnelState {
    TunnelState { org: org.to_string(), network: network.to_string(), ..TunnelState::default() }
}

fn seeded(dir: &std::path::Path) -> ConfigFile {
    let config = ConfigFile::at(dir.join("config.toml"));
    let mut peers = BTreeMap::new();
    peers.insert("personal".to_string(), state("personal", ""));
    peers.insert("acme/staging".to_string(), state("acme", "staging"));
    config.set_wire_guard_state(&peers).unwrap();
    config.set_access_token("fm2_a").unwrap();
    config
}

/// Rejects a fixed list of peers
struct Rejecting(Vec<&'static str>);

#[async_trait]
impl PeerValidator for Rejecting {
    async fn invalid_peers(
        &self,
        _tokens: &TokenSet,
        peers: &BTreeMap<String, TunnelState>,
    ) -> Result<Vec<String>, PeerError> {
        Ok(peers.keys().filter(|k| self.0.iter().any(|r| k.as_str() == *r)).cloned().collect())
    }
}

#[tokio::test]
async fn current_parses_config_keys() {
    let dir = tempdir().unwrap();
    let peers = ConfigPeers::new(seeded(dir.path()));

    let keys = peers.current().await.unwrap();

    assert_eq!(keys.len(), 2);
    assert!(keys.contains(&TunnelKey::org("personal")));
    assert!(keys.contains(&TunnelKey::new("acme", "staging")));
}

#[tokio::test]
async fn current_is_empty_without_config() {
    let dir = tempdir().unwrap();
    let peers = ConfigPeers::new(ConfigFile::at(dir.path().join("config.toml")));

    assert!(peers.current().await.unwrap().is_empty());
}

#[tokio::test]
async fn prune_without_validator_keeps_everything() {
    let dir = tempdir().unwrap();
    let config = seeded(dir.path());
    let peers = ConfigPeers::new(config.clone());

    peers.prune_invalid(&TokenSet::empty()).await.unwrap();

    assert_eq!(config.wire_guard_state().unwrap().len(), 2);
}

#[tokio::test]
async fn prune_removes_rejected_peers_and_keeps_other_keys() {
    let dir = tempdir().unwrap();
    let config = seeded(dir.path());
    let peers =
        ConfigPeers::new(config.clone()).with_validator(Arc::new(Rejecting(vec!["acme/staging"])));

    peers.prune_invalid(&TokenSet::empty()).await.unwrap();

    let remaining = config.wire_guard_state().unwrap();
    assert_eq!(remaining.keys().collect::<Vec<_>>(), ["personal"]);
    assert_eq!(config.read_access_token().unwrap(), "fm2_a");
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tunnel identity and negotiated tunnel parameters.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one tunnel within an agent process.
///
/// Region is not part of the key: it is fixed for the lifetime of an agent.
/// An empty network means the organization's default network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TunnelKey {
    pub org: String,
    pub network: String,
}

impl TunnelKey {
    pub fn new(org: impl Into<String>, network: impl Into<String>) -> Self {
        Self { org: org.into(), network: network.into() }
    }

    /// Key for an org's default network.
    pub fn org(org: impl Into<String>) -> Self {
        Self::new(org, "")
    }

    /// Parse the config-file form: `slug` or `slug/network`.
    pub fn parse(s: &str) -> Self {
        match s.split_once('/') {
            Some((org, network)) => Self::new(org, network),
            None => Self::org(s),
        }
    }

    /// Key from protocol arguments, where the network is optional.
    pub fn from_args(org: &str, network: Option<&str>) -> Self {
        Self::new(org, network.unwrap_or_default())
    }

    pub fn network(&self) -> Option<&str> {
        if self.network.is_empty() {
            None
        } else {
            Some(&self.network)
        }
    }
}

impl fmt::Display for TunnelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.network() {
            Some(network) => write!(f, "{}/{}", self.org, network),
            None => f.write_str(&self.org),
        }
    }
}

/// Remote end of a negotiated peer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    pub peer_ip: String,
    pub endpoint: String,
    pub public_key: String,
}

/// Peer state negotiated for an organization, persisted in the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelState {
    pub org: String,
    #[serde(default)]
    pub network: String,
    pub name: String,
    pub region: String,
    pub local_public: String,
    pub local_private: String,
    pub dns: String,
    pub peer: PeerConfig,
}

impl TunnelState {
    pub fn key(&self) -> TunnelKey {
        TunnelKey::new(&self.org, &self.network)
    }
}

/// Interface configuration the engine derived from a [`TunnelState`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelConfig {
    pub local_network: String,
    pub local_private_key: String,
    pub remote_public_key: String,
    pub remote_network: String,
    pub endpoint: String,
    pub dns_server: String,
    #[serde(default)]
    pub keep_alive_secs: u32,
    #[serde(default)]
    pub mtu: u16,
}

#[cfg(test)]
#[path = "tunnel_tests.rs"]
mod tests;

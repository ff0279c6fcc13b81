// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON payloads carried after `ok `.

use fa_core::{TunnelConfig, TunnelState};
use serde::{Deserialize, Serialize};

/// Reply to `ping`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingResponse {
    #[serde(rename = "PID")]
    pub pid: u32,
    #[serde(rename = "Version")]
    pub version: semver::Version,
    /// True when the agent was detached from a CLI invocation
    #[serde(rename = "Background")]
    pub background: bool,
}

/// Reply to `establish` and `reestablish`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstablishResponse {
    #[serde(rename = "WireGuardState")]
    pub state: TunnelState,
    #[serde(rename = "TunnelConfig")]
    pub config: TunnelConfig,
}

/// Reply to `instances`: parallel label and address lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instances {
    #[serde(rename = "Labels", default)]
    pub labels: Vec<String>,
    #[serde(rename = "Addresses", default)]
    pub addresses: Vec<String>,
}

impl Instances {
    pub fn push(&mut self, label: impl Into<String>, address: impl Into<String>) {
        self.labels.push(label.into());
        self.addresses.push(address.into());
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Addresses sorted, for comparing lookups that may order results
    /// differently.
    pub fn sorted_addresses(&self) -> Vec<&str> {
        let mut addrs: Vec<&str> = self.addresses.iter().map(String::as_str).collect();
        addrs.sort_unstable();
        addrs
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;

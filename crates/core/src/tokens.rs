// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bearer token set shared by the agent and its clients.

use std::path::{Path, PathBuf};

use crate::config_file::{ConfigError, ConfigFile};

const MACAROON_PREFIXES: [&str; 3] = ["fm1r_", "fm1a_", "fm2_"];

/// Where a [`TokenSet`] was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    /// The `access_token` key of a config file
    File(PathBuf),
    /// An environment variable or a literal handed over the wire
    Env,
}

/// Bearer credentials: zero or one user token plus any number of
/// organization macaroons and their discharges.
///
/// Equality compares the tokens and their provenance; the dirty flag is
/// bookkeeping and does not participate.
#[derive(Debug, Clone)]
pub struct TokenSet {
    macaroons: Vec<String>,
    user: Option<String>,
    source: TokenSource,
    dirty: bool,
}

impl PartialEq for TokenSet {
    fn eq(&self, other: &Self) -> bool {
        self.macaroons == other.macaroons && self.user == other.user && self.source == other.source
    }
}

impl Eq for TokenSet {}

impl TokenSet {
    /// An empty set with no backing file.
    pub fn empty() -> Self {
        Self { macaroons: Vec::new(), user: None, source: TokenSource::Env, dirty: false }
    }

    /// Parse a comma-separated token string, optionally prefixed with an
    /// authorization scheme (`Bearer` or `FlyV1`).
    pub fn parse(raw: &str, source: TokenSource) -> Self {
        let mut set = Self { source, ..Self::empty() };
        for token in raw.split(',').map(strip_scheme).filter(|t| !t.is_empty()) {
            if is_macaroon(token) {
                set.macaroons.push(token.to_string());
            } else if set.user.is_none() {
                set.user = Some(token.to_string());
            } else {
                tracing::debug!("ignoring additional user token");
            }
        }
        set
    }

    /// Tokens from the environment (`FLY_API_TOKEN`) or, failing that, the
    /// config file's `access_token`.
    pub fn load(config: &ConfigFile) -> Result<Self, ConfigError> {
        if let Some(token) = crate::env::api_token() {
            return Ok(Self::parse(&token, TokenSource::Env));
        }
        Self::from_file(config)
    }

    pub fn from_file(config: &ConfigFile) -> Result<Self, ConfigError> {
        let raw = config.read_access_token()?;
        Ok(Self::parse(&raw, TokenSource::File(config.path().to_path_buf())))
    }

    pub fn is_empty(&self) -> bool {
        self.macaroons.is_empty() && self.user.is_none()
    }

    pub fn macaroons(&self) -> &[String] {
        &self.macaroons
    }

    pub fn user_token(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn source(&self) -> &TokenSource {
        &self.source
    }

    /// Backing config file, when the tokens were loaded from one.
    pub fn file(&self) -> Option<&Path> {
        match &self.source {
            TokenSource::File(path) => Some(path),
            TokenSource::Env => None,
        }
    }

    /// Every token, macaroons first, comma-joined.
    pub fn all(&self) -> String {
        let tokens: Vec<&str> =
            self.macaroons.iter().map(String::as_str).chain(self.user.as_deref()).collect();
        tokens.join(",")
    }

    /// Token suitable for the GraphQL API: the user token when present,
    /// otherwise the macaroons.
    pub fn graphql(&self) -> String {
        match &self.user {
            Some(user) => user.clone(),
            None => self.all(),
        }
    }

    /// Replace the macaroons, marking the set dirty when they differ.
    pub fn replace_macaroons(&mut self, macaroons: Vec<String>) {
        if self.macaroons != macaroons {
            self.macaroons = macaroons;
            self.dirty = true;
        }
    }

    /// Replace this set wholesale with `other` (last writer wins).
    pub fn replace(&mut self, other: TokenSet) {
        *self = other;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

impl Default for TokenSet {
    fn default() -> Self {
        Self::empty()
    }
}

fn strip_scheme(token: &str) -> &str {
    let token = token.trim();
    for scheme in ["Bearer ", "FlyV1 "] {
        if let Some(rest) = token.strip_prefix(scheme) {
            return rest.trim();
        }
    }
    token
}

fn is_macaroon(token: &str) -> bool {
    MACAROON_PREFIXES.iter().any(|p| token.starts_with(p))
}

#[cfg(test)]
#[path = "tokens_tests.rs"]
mod tests;

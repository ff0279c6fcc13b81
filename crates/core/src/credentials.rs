// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token material a client hands the agent with `set-token`.

use std::path::PathBuf;

use crate::config_file::{ConfigError, ConfigFile};
use crate::tokens::{TokenSet, TokenSource};

/// Either a reference to the config file holding the tokens, or the tokens
/// themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    File(PathBuf),
    Literal(String),
}

impl Credentials {
    /// Credentials for a token set; `None` when it holds no tokens.
    ///
    /// Frames have no escaping, so a config path containing a space is
    /// sent as the literal tokens instead.
    pub fn from_tokens(tokens: &TokenSet) -> Option<Self> {
        if tokens.is_empty() {
            return None;
        }
        Some(match tokens.file() {
            Some(path) if !path.to_string_lossy().contains(' ') => {
                Credentials::File(path.to_path_buf())
            }
            _ => Credentials::Literal(tokens.all()),
        })
    }

    /// `set-token` arguments: `cfg <path>` or `str <tokens>`.
    pub fn to_args(&self) -> [String; 2] {
        match self {
            Credentials::File(path) => ["cfg".to_string(), path.to_string_lossy().into_owned()],
            Credentials::Literal(tokens) => ["str".to_string(), tokens.clone()],
        }
    }

    /// Parse `set-token` arguments; `None` for an unknown kind.
    pub fn from_args(kind: &str, value: &str) -> Option<Self> {
        match kind {
            "cfg" => Some(Credentials::File(PathBuf::from(value))),
            "str" => Some(Credentials::Literal(value.to_string())),
            _ => None,
        }
    }

    /// Materialize the token set these credentials refer to.
    pub fn load(&self) -> Result<TokenSet, ConfigError> {
        match self {
            Credentials::File(path) => TokenSet::from_file(&ConfigFile::at(path)),
            Credentials::Literal(tokens) => Ok(TokenSet::parse(tokens, TokenSource::Env)),
        }
    }
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod tests;

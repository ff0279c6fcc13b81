// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Seams to the platform API that issues and refreshes tokens.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use fa_core::{ConfigError, TokenSet};
use thiserror::Error;

use crate::refresher::Outcome;

/// Errors from credential refresh
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("token authority unavailable: {0}")]
    Unavailable(String),

    #[error("failed to list organizations: {0}")]
    Organizations(String),

    #[error("failed to get macaroons for org {org}: {message}")]
    Mint { org: String, message: String },

    #[error("bad macaroons for org {0}")]
    BadMint(String),

    #[error("failed to parse macaroon: {0}")]
    Parse(String),

    #[error("failed to refresh discharge tokens: {0}")]
    Discharge(String),

    #[error("failed to persist tokens: {0}")]
    Persist(#[from] ConfigError),

    #[error("{}", join_messages(.0))]
    Multiple(Vec<RefreshError>),
}

impl RefreshError {
    /// Collapse a batch of errors: none, the only one, or all of them.
    pub fn join(mut errors: Vec<RefreshError>) -> Option<RefreshError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(RefreshError::Multiple(errors)),
        }
    }
}

fn join_messages(errors: &[RefreshError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Opens a URL for the user when a discharge needs out-of-band approval.
pub type UserUrlCallback = Arc<dyn Fn(&str) -> Result<(), RefreshError> + Send + Sync>;

/// Issues organization macaroons.
#[async_trait]
pub trait TokenAuthority: Send + Sync {
    /// Organizations the user belongs to, keyed by numeric id, valued by
    /// the id used to mint tokens.
    async fn organizations(&self, user_token: &str) -> Result<HashMap<u64, String>, RefreshError>;

    /// Mint macaroons for one organization, as a comma-separated token string.
    async fn mint(&self, user_token: &str, org_id: &str) -> Result<String, RefreshError>;

    /// Organization a permission macaroon is scoped to, or `None` for a
    /// discharge token.
    fn organization_scope(&self, macaroon: &str) -> Result<Option<u64>, RefreshError>;
}

/// Refreshes expired discharge tokens in place.
#[async_trait]
pub trait Discharger: Send + Sync {
    async fn refresh(&self, tokens: &mut TokenSet, user_url: Option<&UserUrlCallback>) -> Outcome;
}

/// Authority for processes with no platform API wired in: lists no
/// organizations and refreshes nothing, so existing tokens are left alone.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoAuthority;

#[async_trait]
impl TokenAuthority for NoAuthority {
    async fn organizations(&self, _user_token: &str) -> Result<HashMap<u64, String>, RefreshError> {
        Err(RefreshError::Unavailable("no platform API configured".to_string()))
    }

    async fn mint(&self, _user_token: &str, _org_id: &str) -> Result<String, RefreshError> {
        Err(RefreshError::Unavailable("no platform API configured".to_string()))
    }

    fn organization_scope(&self, _macaroon: &str) -> Result<Option<u64>, RefreshError> {
        Ok(None)
    }
}

#[async_trait]
impl Discharger for NoAuthority {
    async fn refresh(
        &self,
        _tokens: &mut TokenSet,
        _user_url: Option<&UserUrlCallback>,
    ) -> Outcome {
        Outcome::unchanged()
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct FakeAuthorityState {
        organizations: Option<HashMap<u64, String>>,
        scopes: HashMap<String, Option<u64>>,
        minted: HashMap<String, Result<String, String>>,
        mint_calls: Vec<String>,
    }

    /// Token authority with scripted organizations and mint results
    #[derive(Clone, Default)]
    pub struct FakeAuthority {
        inner: Arc<Mutex<FakeAuthorityState>>,
    }

    impl FakeAuthority {
        pub fn new() -> Self {
            Self::default()
        }

        /// The user belongs to `numeric_id`, minted as `graph_id`.
        pub fn member_of(self, numeric_id: u64, graph_id: &str) -> Self {
            self.inner
                .lock()
                .organizations
                .get_or_insert_with(HashMap::new)
                .insert(numeric_id, graph_id.to_string());
            self
        }

        /// `macaroon` is a permission token scoped to `numeric_id`.
        pub fn scoped(self, macaroon: &str, numeric_id: u64) -> Self {
            self.inner.lock().scopes.insert(macaroon.to_string(), Some(numeric_id));
            self
        }

        /// `macaroon` is a discharge token.
        pub fn discharge(self, macaroon: &str) -> Self {
            self.inner.lock().scopes.insert(macaroon.to_string(), None);
            self
        }

        pub fn mints(self, graph_id: &str, tokens: &str) -> Self {
            self.inner.lock().minted.insert(graph_id.to_string(), Ok(tokens.to_string()));
            self
        }

        pub fn mint_fails(self, graph_id: &str, message: &str) -> Self {
            self.inner.lock().minted.insert(graph_id.to_string(), Err(message.to_string()));
            self
        }

        pub fn mint_calls(&self) -> Vec<String> {
            self.inner.lock().mint_calls.clone()
        }
    }

    #[async_trait]
    impl TokenAuthority for FakeAuthority {
        async fn organizations(
            &self,
            _user_token: &str,
        ) -> Result<HashMap<u64, String>, RefreshError> {
            self.inner
                .lock()
                .organizations
                .clone()
                .ok_or_else(|| RefreshError::Organizations("no organizations scripted".to_string()))
        }

        async fn mint(&self, _user_token: &str, org_id: &str) -> Result<String, RefreshError> {
            let mut inner = self.inner.lock();
            inner.mint_calls.push(org_id.to_string());
            match inner.minted.get(org_id) {
                Some(Ok(tokens)) => Ok(tokens.clone()),
                Some(Err(message)) => {
                    Err(RefreshError::Mint { org: org_id.to_string(), message: message.clone() })
                }
                None => Err(RefreshError::Mint {
                    org: org_id.to_string(),
                    message: "not scripted".to_string(),
                }),
            }
        }

        fn organization_scope(&self, macaroon: &str) -> Result<Option<u64>, RefreshError> {
            self.inner
                .lock()
                .scopes
                .get(macaroon)
                .copied()
                .ok_or_else(|| RefreshError::Parse(macaroon.to_string()))
        }
    }

    #[derive(Default)]
    struct FakeDischargerState {
        replacements: Vec<(String, String)>,
        user_url: Option<String>,
        error: Option<String>,
        calls: usize,
    }

    /// Discharger that swaps scripted macaroons
    #[derive(Clone, Default)]
    pub struct FakeDischarger {
        inner: Arc<Mutex<FakeDischargerState>>,
    }

    impl FakeDischarger {
        pub fn new() -> Self {
            Self::default()
        }

        /// Replace `old` with `new` whenever `old` is present.
        pub fn replaces(self, old: &str, new: &str) -> Self {
            self.inner.lock().replacements.push((old.to_string(), new.to_string()));
            self
        }

        /// Ask the user to visit `url` before refreshing.
        pub fn requires_user(self, url: &str) -> Self {
            self.inner.lock().user_url = Some(url.to_string());
            self
        }

        pub fn fails(self, message: &str) -> Self {
            self.inner.lock().error = Some(message.to_string());
            self
        }

        pub fn calls(&self) -> usize {
            self.inner.lock().calls
        }
    }

    #[async_trait]
    impl Discharger for FakeDischarger {
        async fn refresh(
            &self,
            tokens: &mut TokenSet,
            user_url: Option<&UserUrlCallback>,
        ) -> Outcome {
            let (replacements, url, error) = {
                let mut inner = self.inner.lock();
                inner.calls += 1;
                (inner.replacements.clone(), inner.user_url.clone(), inner.error.clone())
            };
            if let (Some(url), Some(callback)) = (url, user_url) {
                if let Err(e) = callback(url.as_str()) {
                    return Outcome::failed(e);
                }
            }
            let mut macaroons = tokens.macaroons().to_vec();
            for (old, new) in &replacements {
                for tok in macaroons.iter_mut().filter(|t| *t == old) {
                    *tok = new.clone();
                }
            }
            let changed = macaroons != tokens.macaroons();
            tokens.replace_macaroons(macaroons);
            Outcome { changed, error: error.map(RefreshError::Discharge) }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeAuthority, FakeDischarger};

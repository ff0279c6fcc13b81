// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use fa_core::{ConfigFile, TokenSet};
use tracing::debug;

use crate::authority::{Discharger, RefreshError, TokenAuthority, UserUrlCallback};
use crate::org_tokens::fetch_org_tokens;

/// Result of a refresh step. A step can change the set and still report
/// an error for the parts that failed.
#[derive(Debug, Default)]
pub struct Outcome {
    pub changed: bool,
    pub error: Option<RefreshError>,
}

impl Outcome {
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn failed(error: RefreshError) -> Self {
        Self { changed: false, error: Some(error) }
    }
}

/// Runs the org-token and discharge steps against a token set.
#[derive(Clone)]
pub struct Refresher {
    authority: Arc<dyn TokenAuthority>,
    discharger: Arc<dyn Discharger>,
    user_url: Option<UserUrlCallback>,
}

impl Refresher {
    pub fn new(authority: Arc<dyn TokenAuthority>, discharger: Arc<dyn Discharger>) -> Self {
        Self { authority, discharger, user_url: None }
    }

    /// Callback used when a discharge needs the user to visit a URL.
    pub fn with_user_url(mut self, callback: UserUrlCallback) -> Self {
        self.user_url = Some(callback);
        self
    }

    /// Fetch missing org tokens, then refresh discharges. Errors are
    /// logged; the return value says whether `tokens` changed.
    pub async fn refresh(&self, tokens: &mut TokenSet) -> bool {
        let fetched = fetch_org_tokens(self.authority.as_ref(), tokens).await;
        if let Some(e) = &fetched.error {
            debug!(error = %e, "failed to fetch missing org tokens");
        }

        let discharged = self.discharger.refresh(tokens, self.user_url.as_ref()).await;
        if let Some(e) = &discharged.error {
            debug!(error = %e, "failed to update discharge tokens");
        }

        fetched.changed || discharged.changed
    }

    /// [`refresh`](Self::refresh), then write the set back to its config
    /// file when it changed. Returns whether `tokens` changed.
    pub async fn prepare(&self, tokens: &mut TokenSet) -> bool {
        let changed = self.refresh(tokens).await;
        if changed {
            if let Err(e) = persist(tokens) {
                debug!(error = %e, "failed to persist updated tokens");
            }
        }
        changed
    }
}

/// Write a file-backed set's tokens to its `access_token` key.
pub(crate) fn persist(tokens: &mut TokenSet) -> Result<(), RefreshError> {
    let Some(path) = tokens.file() else {
        return Ok(());
    };
    ConfigFile::at(path).set_access_token(&tokens.all())?;
    tokens.mark_clean();
    Ok(())
}

#[cfg(test)]
#[path = "refresher_tests.rs"]
mod tests;

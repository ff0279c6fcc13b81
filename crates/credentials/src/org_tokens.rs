// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashSet;

use fa_core::{TokenSet, TokenSource};
use futures_util::future::join_all;
use tracing::debug;

use crate::authority::{RefreshError, TokenAuthority};
use crate::refresher::Outcome;

/// Bring org macaroons in line with the user's memberships.
///
/// Only applies to file-backed sets holding both macaroons and a user
/// token. Macaroons that fail to parse or are scoped to an organization
/// the user no longer belongs to are dropped; discharge tokens are kept.
/// Organizations with no macaroon get one minted. Mints run concurrently
/// and a failed mint doesn't stop the others.
pub async fn fetch_org_tokens(authority: &dyn TokenAuthority, tokens: &mut TokenSet) -> Outcome {
    if tokens.file().is_none() || tokens.macaroons().is_empty() {
        return Outcome::unchanged();
    }
    let Some(user) = tokens.user_token().map(str::to_string) else {
        return Outcome::unchanged();
    };

    let orgs = match authority.organizations(&user).await {
        Ok(orgs) => orgs,
        Err(e) => return Outcome::failed(e),
    };

    let mut kept = Vec::with_capacity(tokens.macaroons().len());
    let mut covered = HashSet::new();
    for token in tokens.macaroons() {
        match authority.organization_scope(token) {
            Err(e) => debug!(error = %e, "pruning token: failed to parse macaroon"),
            Ok(None) => kept.push(token.clone()),
            Ok(Some(oid)) if orgs.contains_key(&oid) => {
                covered.insert(oid);
                kept.push(token.clone());
            }
            Ok(Some(oid)) => debug!(org = oid, "pruning token: user not in org"),
        }
    }

    let mut missing: Vec<&String> =
        orgs.iter().filter(|(oid, _)| !covered.contains(*oid)).map(|(_, id)| id).collect();
    missing.sort();

    let minted = join_all(missing.into_iter().map(|org| {
        let user = user.as_str();
        async move {
            debug!(org = %org, "fetching macaroons");
            (org, authority.mint(user, org).await)
        }
    }))
    .await;

    let mut errors = Vec::new();
    for (org, result) in minted {
        match result {
            Ok(raw) => {
                let fresh = TokenSet::parse(&raw, TokenSource::Env);
                if fresh.macaroons().is_empty() {
                    errors.push(RefreshError::BadMint(org.clone()));
                } else {
                    kept.extend(fresh.macaroons().iter().cloned());
                }
            }
            Err(e) => errors.push(e),
        }
    }

    let error = RefreshError::join(errors);
    if kept == tokens.macaroons() {
        return Outcome { changed: false, error };
    }
    tokens.replace_macaroons(kept);
    Outcome { changed: true, error }
}

#[cfg(test)]
#[path = "org_tokens_tests.rs"]
mod tests;

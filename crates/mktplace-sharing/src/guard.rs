//! Bearer-token authentication and the share state machine guard, per §4.1
//! and §4.10: `authenticate(bearer) → Share` or one of
//! `{MissingAuth, InvalidToken, Revoked, Expired, TrialExpired, NotApproved, WrongSeller}`.

use axum::http::HeaderMap;
use chrono::Utc;
use mktplace_catalog::models::{Dataset, Share};
use mktplace_catalog::{datasets, shares, Catalog};
use mktplace_common::{Error, Result};

/// Extract the raw bearer token from the `Authorization` header.
#[must_use]
pub fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let header = headers.get("Authorization")?.to_str().ok()?;
    header.strip_prefix("Bearer ").map(|s| s.trim().to_string())
}

/// An authenticated, access-checked share plus its owning dataset.
pub struct AuthenticatedShare {
    pub share: Share,
    pub dataset: Dataset,
}

/// Authenticate a request's bearer token and verify the share is in a
/// servable state, per the state machine in §4.10: anything other than
/// `approved ∧ ¬revoked ∧ ¬expired` is rejected.
///
/// `seller_pin`, when set, restricts this process to serving shares whose
/// dataset belongs to that seller — any other share fails `WrongSeller`.
///
/// # Errors
///
/// Returns [`Error::MissingAuth`], [`Error::InvalidToken`],
/// [`Error::Revoked`], [`Error::Expired`], [`Error::TrialExpired`],
/// [`Error::NotApproved`], or [`Error::WrongSeller`].
pub async fn authenticate(
    headers: &HeaderMap,
    catalog: &Catalog,
    token_salt: &[u8],
    seller_pin: Option<i64>,
) -> Result<AuthenticatedShare> {
    let raw_token = extract_bearer(headers).ok_or(Error::MissingAuth)?;

    let token_hash = mktplace_auth::token::hash_token(&raw_token, token_salt);
    let share = match shares::find_by_token_hash(catalog.pool(), &token_hash)
        .await
        .map_err(|e| Error::internal(e.to_string()))?
    {
        Some(share) => share,
        None => shares::find_by_legacy_plaintext(catalog.pool(), &raw_token)
            .await
            .map_err(|e| Error::internal(e.to_string()))?
            .ok_or(Error::InvalidToken)?,
    };

    let dataset = datasets::find_by_id(catalog.pool(), share.dataset_id)
        .await
        .map_err(|e| Error::internal(e.to_string()))?
        .ok_or_else(|| Error::Configuration(format!("share {} has no dataset", share.id)))?;

    if let Some(seller_id) = seller_pin {
        if dataset.seller_id != seller_id {
            return Err(Error::WrongSeller);
        }
    }

    if share.revoked {
        return Err(Error::Revoked);
    }

    let now = Utc::now();
    if share.expires_at.is_some_and(|exp| exp <= now) {
        return Err(Error::Expired);
    }
    if share.is_trial && share.trial_expires_at.is_some_and(|exp| exp <= now) {
        return Err(Error::TrialExpired);
    }

    if !share.is_approved() {
        return Err(Error::NotApproved);
    }

    Ok(AuthenticatedShare { share, dataset })
}

/// The share name exposed on the wire, per §6: `share_<id>`.
#[must_use]
pub fn share_wire_name(share_id: i64) -> String {
    format!("share_{share_id}")
}

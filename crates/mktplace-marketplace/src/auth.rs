//! Session authentication for the marketplace API: a JWT bearer token
//! issued by `/login`, verified per request against `MarketplaceState::jwt`,
//! then resolved to the catalog `User` it names.

use axum::http::HeaderMap;
use mktplace_catalog::models::User;
use mktplace_catalog::users;
use mktplace_common::{Error, Result};

use crate::state::MarketplaceState;

fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let header = headers.get("Authorization")?.to_str().ok()?;
    header.strip_prefix("Bearer ").map(|s| s.trim().to_string())
}

/// Resolve the authenticated user from a session JWT.
///
/// # Errors
///
/// Returns [`Error::MissingAuth`] without a bearer token, or
/// [`Error::InvalidToken`] if the JWT fails to verify or its subject does
/// not name a known user.
pub async fn current_user(headers: &HeaderMap, state: &MarketplaceState) -> Result<User> {
    let token = extract_bearer(headers).ok_or(Error::MissingAuth)?;
    let claims = state.jwt.verify(&token).map_err(|_| Error::InvalidToken)?;
    let user_id: i64 = claims.sub.parse().map_err(|_| Error::InvalidToken)?;
    users::find_by_id(state.catalog.pool(), user_id)
        .await
        .map_err(|e| Error::internal(e.to_string()))?
        .ok_or(Error::InvalidToken)
}

/// As [`current_user`], additionally requiring the `seller` role.
///
/// # Errors
///
/// Returns [`Error::Forbidden`] if the authenticated user is not a seller.
pub async fn current_seller(headers: &HeaderMap, state: &MarketplaceState) -> Result<User> {
    let user = current_user(headers, state).await?;
    if user.role != "seller" {
        return Err(Error::forbidden("seller role required"));
    }
    Ok(user)
}

/// As [`current_user`], additionally requiring the `buyer` role.
///
/// # Errors
///
/// Returns [`Error::Forbidden`] if the authenticated user is not a buyer.
pub async fn current_buyer(headers: &HeaderMap, state: &MarketplaceState) -> Result<User> {
    let user = current_user(headers, state).await?;
    if user.role != "buyer" {
        return Err(Error::forbidden("buyer role required"));
    }
    Ok(user)
}

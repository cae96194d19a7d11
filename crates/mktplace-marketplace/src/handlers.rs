//! Marketplace catalog handlers: registration, login, dataset publish,
//! purchase/trial, share lifecycle, profile and usage-log fetch.
//!
//! Mirrors the sharing data plane's handler shape: each function does its
//! own auth check, talks to the catalog directly, and maps failures through
//! [`ApiError`] — no shared "controller" abstraction between them.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{Duration, Utc};
use mktplace_catalog::models::{Dataset, Share, User};
use mktplace_catalog::{audit_logs, datasets, purchases, shares, users};
use mktplace_common::Error;
use serde_json::{json, Value as JsonValue};
use validator::Validate;

use crate::auth::{current_buyer, current_seller, current_user};
use crate::error::{ApiError, Result};
use crate::state::MarketplaceState;
use crate::types::{
    ApprovalResponse, DatasetCreate, DatasetMetadataBundle, DatasetResponse, DeltaSharingProfile,
    DeltaSharingServerUrlRequest, DeltaSharingServerUrlResponse, HealthResponse, ProfileListItem, ProfileResponse,
    PurchaseResponse, RejectionResponse, ShareResponse, Token, TokenRotationResponse, TrialRequest, TrialResponse,
    UsageLogResponse, UsageLogsQuery, UserLogin, UserRegister, UserResponse,
};

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

// ---- Registration / login ----

pub async fn register(
    State(state): State<Arc<MarketplaceState>>,
    Json(body): Json<UserRegister>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    body.validate().map_err(|e| ApiError::from(Error::validation(e.to_string())))?;
    if body.role != "buyer" && body.role != "seller" {
        return Err(ApiError::from(Error::validation("role must be 'buyer' or 'seller'")));
    }

    let existing = users::find_by_email(state.catalog.pool(), &body.email)
        .await
        .map_err(|e| Error::internal(e.to_string()))?;
    if existing.is_some() {
        return Err(ApiError::from(Error::AlreadyExists(format!("email {} already registered", body.email))));
    }

    let hashed = mktplace_auth::password::hash_password(&body.password).map_err(Error::from)?;
    let user = users::create(state.catalog.pool(), &body.email, &hashed, &body.role)
        .await
        .map_err(|e| Error::internal(e.to_string()))?;

    Ok((StatusCode::CREATED, Json(user_response(user))))
}

pub async fn login(
    State(state): State<Arc<MarketplaceState>>,
    Json(body): Json<UserLogin>,
) -> Result<Json<Token>> {
    let user = users::find_by_email(state.catalog.pool(), &body.email)
        .await
        .map_err(|e| Error::internal(e.to_string()))?
        .ok_or(Error::InvalidToken)?;

    mktplace_auth::password::verify_password(&body.password, &user.hashed_password).map_err(|_| Error::InvalidToken)?;

    let access_token = state.jwt.issue(user.id, &user.role).map_err(|e| Error::internal(e.to_string()))?;
    Ok(Json(Token { access_token, token_type: "bearer".to_string() }))
}

pub async fn me(State(state): State<Arc<MarketplaceState>>, headers: HeaderMap) -> Result<Json<UserResponse>> {
    let user = current_user(&headers, &state).await?;
    Ok(Json(user_response(user)))
}

pub async fn update_server_url(
    State(state): State<Arc<MarketplaceState>>,
    headers: HeaderMap,
    Json(body): Json<DeltaSharingServerUrlRequest>,
) -> Result<Json<DeltaSharingServerUrlResponse>> {
    let user = current_seller(&headers, &state).await?;
    users::set_delta_sharing_server_url(state.catalog.pool(), user.id, &body.server_url)
        .await
        .map_err(|e| Error::internal(e.to_string()))?;
    Ok(Json(DeltaSharingServerUrlResponse { delta_sharing_server_url: Some(body.server_url) }))
}

// ---- Datasets ----

pub async fn list_datasets(
    State(state): State<Arc<MarketplaceState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<DatasetResponse>>> {
    let user = current_user(&headers, &state).await?;
    let datasets = if user.role == "seller" {
        datasets::list_by_seller(state.catalog.pool(), user.id).await
    } else {
        datasets::list_visible_to(state.catalog.pool(), user.id).await
    }
    .map_err(|e| Error::internal(e.to_string()))?;
    Ok(Json(datasets.into_iter().map(dataset_response).collect()))
}

pub async fn create_dataset(
    State(state): State<Arc<MarketplaceState>>,
    headers: HeaderMap,
    Json(body): Json<DatasetCreate>,
) -> Result<(StatusCode, Json<DatasetResponse>)> {
    let seller = current_seller(&headers, &state).await?;

    let dataset = if let Some(bundle) = &body.metadata_bundle {
        if bundle.seller_id != seller.id {
            return Err(ApiError::from(Error::validation(
                "metadata bundle seller_id does not match authenticated seller",
            )));
        }

        let canonical = bundle_signing_payload(bundle);
        let secret = state.config.secrets.token_signing_secret.as_bytes();
        mktplace_auth::bundle::verify_bundle_signature(&canonical, &bundle.signature, secret)
            .map_err(|_| Error::validation("invalid metadata bundle signature"))?;

        let risk_score = bundle.pii_analysis.get("risk_score").and_then(JsonValue::as_f64).unwrap_or(0.0);
        let risk_level =
            bundle.pii_analysis.get("risk_level").and_then(JsonValue::as_str).unwrap_or("low").to_string();
        let sensitive_columns = bundle.pii_analysis.get("sensitive_columns").cloned();
        let detected_pii_types = bundle.pii_analysis.get("pii_types").cloned();
        let anchor_columns = JsonValue::Array(bundle.anchor_columns.iter().cloned().map(JsonValue::String).collect());
        let requires_approval = risk_score >= 20.0;
        let name = if bundle.name.is_empty() { &body.name } else { &bundle.name };
        let description = bundle.description.as_deref().or(body.description.as_deref());
        let table_path = if bundle.table_path.is_empty() { &body.table_path } else { &bundle.table_path };

        datasets::create(
            state.catalog.pool(),
            name,
            description,
            None,
            table_path,
            body.price,
            body.is_public,
            seller.id,
            risk_score,
            &risk_level,
            detected_pii_types,
            sensitive_columns,
            requires_approval,
            &anchor_columns,
        )
        .await
        .map_err(|e| Error::internal(e.to_string()))?
    } else {
        let anchor_columns_str = body
            .anchor_columns
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                Error::validation(
                    "metadata_bundle is required; provide a signed metadata bundle from the seller publish tool",
                )
            })?;
        let anchor_columns = JsonValue::Array(
            anchor_columns_str.split(',').map(|s| JsonValue::String(s.trim().to_string())).collect(),
        );

        datasets::create(
            state.catalog.pool(),
            &body.name,
            body.description.as_deref(),
            None,
            &body.table_path,
            body.price,
            body.is_public,
            seller.id,
            0.0,
            "low",
            None,
            None,
            false,
            &anchor_columns,
        )
        .await
        .map_err(|e| Error::internal(e.to_string()))?
    };

    Ok((StatusCode::CREATED, Json(dataset_response(dataset))))
}

// ---- Purchase / trial ----

pub async fn purchase_dataset(
    State(state): State<Arc<MarketplaceState>>,
    headers: HeaderMap,
    Path(dataset_id): Path<i64>,
) -> Result<Json<PurchaseResponse>> {
    let buyer = current_buyer(&headers, &state).await?;
    let dataset = find_visible_dataset(&state, dataset_id, &buyer).await?;

    let existing = shares::find_by_dataset_and_buyer(state.catalog.pool(), dataset_id, buyer.id)
        .await
        .map_err(|e| Error::internal(e.to_string()))?;
    if existing.is_some() {
        return Err(ApiError::from(Error::validation("you already have access to this dataset")));
    }

    let share_token = mktplace_auth::token::generate_share_token();
    let token_hash = mktplace_auth::token::hash_token(&share_token, state.config.secrets.token_salt.as_bytes());
    let expires_at = Utc::now() + Duration::days(i64::from(state.config.secrets.token_expiry_days));
    let approval_status = if dataset.requires_approval { "pending" } else { "approved" };

    let share = shares::create(
        state.catalog.pool(),
        dataset.id,
        dataset.seller_id,
        buyer.id,
        &share_token,
        &token_hash,
        Some(expires_at),
        approval_status,
        false,
        None,
        None,
    )
    .await
    .map_err(|e| Error::internal(e.to_string()))?;

    let purchase = purchases::create(state.catalog.pool(), buyer.id, dataset.id, share.id, dataset.price)
        .await
        .map_err(|e| Error::internal(e.to_string()))?;

    let seller_server_url = seller_server_url_for(&state, dataset.seller_id).await?;

    Ok(Json(PurchaseResponse {
        id: purchase.id,
        buyer_id: purchase.buyer_id,
        dataset_id: purchase.dataset_id,
        share_id: purchase.share_id,
        amount: purchase.amount,
        created_at: purchase.created_at,
        share_token,
        approval_status: share.approval_status,
        seller_server_url,
    }))
}

pub async fn request_trial(
    State(state): State<Arc<MarketplaceState>>,
    headers: HeaderMap,
    Path(dataset_id): Path<i64>,
    body: Option<Json<TrialRequest>>,
) -> Result<Json<TrialResponse>> {
    let buyer = current_buyer(&headers, &state).await?;
    let dataset = find_visible_dataset(&state, dataset_id, &buyer).await?;

    let now = Utc::now();
    if shares::find_active_trial(state.catalog.pool(), buyer.id, dataset_id, now)
        .await
        .map_err(|e| Error::internal(e.to_string()))?
        .is_some()
    {
        return Err(ApiError::from(Error::validation("you already have an active trial for this dataset")));
    }

    let trial_request = body.map(|Json(t)| t).unwrap_or_default();
    let row_limit = trial_request.row_limit.min(1000);
    let expires_at = now + Duration::days(trial_request.days_valid);

    let share_token = mktplace_auth::token::generate_share_token();
    let token_hash = mktplace_auth::token::hash_token(&share_token, state.config.secrets.token_salt.as_bytes());

    let share = shares::create(
        state.catalog.pool(),
        dataset.id,
        dataset.seller_id,
        buyer.id,
        &share_token,
        &token_hash,
        Some(expires_at),
        "approved",
        true,
        Some(row_limit),
        Some(expires_at),
    )
    .await
    .map_err(|e| Error::internal(e.to_string()))?;

    let seller_server_url = seller_server_url_for(&state, dataset.seller_id).await?;

    Ok(Json(TrialResponse {
        id: share.id,
        buyer_id: share.buyer_id,
        dataset_id: share.dataset_id,
        share_id: share.id,
        share_token,
        approval_status: share.approval_status,
        seller_server_url,
        is_trial: true,
        trial_row_limit: share.trial_row_limit,
        trial_expires_at: share.trial_expires_at,
    }))
}

pub async fn my_datasets(
    State(state): State<Arc<MarketplaceState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<DatasetResponse>>> {
    let seller = current_seller(&headers, &state).await?;
    let datasets = datasets::list_by_seller(state.catalog.pool(), seller.id)
        .await
        .map_err(|e| Error::internal(e.to_string()))?;
    Ok(Json(datasets.into_iter().map(dataset_response).collect()))
}

pub async fn my_shares(
    State(state): State<Arc<MarketplaceState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<ShareResponse>>> {
    let user = current_user(&headers, &state).await?;
    let shares = shares::list_by_seller_or_buyer(state.catalog.pool(), user.id)
        .await
        .map_err(|e| Error::internal(e.to_string()))?;

    let mut out = Vec::with_capacity(shares.len());
    for share in shares {
        let dataset_name = datasets::find_by_id(state.catalog.pool(), share.dataset_id)
            .await
            .map_err(|e| Error::internal(e.to_string()))?
            .map(|d| d.name)
            .unwrap_or_default();
        out.push(share_response(share, dataset_name));
    }
    Ok(Json(out))
}

// ---- Share lifecycle ----

pub async fn rotate_token(
    State(state): State<Arc<MarketplaceState>>,
    headers: HeaderMap,
    Path(share_id): Path<i64>,
) -> Result<Json<TokenRotationResponse>> {
    let seller = current_seller(&headers, &state).await?;
    let share = owned_share(&state, share_id, seller.id).await?;
    if share.revoked {
        return Err(ApiError::from(Error::validation("cannot rotate token for a revoked share")));
    }

    let new_token = mktplace_auth::token::generate_share_token();
    let new_token_hash = mktplace_auth::token::hash_token(&new_token, state.config.secrets.token_salt.as_bytes());
    let now = Utc::now();
    shares::rotate_token(state.catalog.pool(), share.id, &new_token, &new_token_hash, now)
        .await
        .map_err(|e| Error::internal(e.to_string()))?;

    if share.approval_status == "approved" {
        if let Some(endpoint) = seller.delta_sharing_server_url.clone() {
            regenerate_profile(&state, &share, &endpoint, &new_token, now).await?;
        }
    }

    Ok(Json(TokenRotationResponse {
        status: "success",
        message: "token rotated successfully",
        share_id,
        new_token,
    }))
}

pub async fn revoke_share(
    State(state): State<Arc<MarketplaceState>>,
    headers: HeaderMap,
    Path(share_id): Path<i64>,
) -> Result<StatusCode> {
    let seller = current_seller(&headers, &state).await?;
    let _share = owned_share(&state, share_id, seller.id).await?;
    let now = Utc::now();
    shares::revoke(state.catalog.pool(), share_id, now).await.map_err(|e| Error::internal(e.to_string()))?;
    shares::clear_profile(state.catalog.pool(), share_id).await.map_err(|e| Error::internal(e.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn approve_share(
    State(state): State<Arc<MarketplaceState>>,
    headers: HeaderMap,
    Path(share_id): Path<i64>,
) -> Result<Json<ApprovalResponse>> {
    let seller = current_seller(&headers, &state).await?;
    let mut share = owned_share(&state, share_id, seller.id).await?;
    shares::set_approval_status(state.catalog.pool(), share_id, "approved")
        .await
        .map_err(|e| Error::internal(e.to_string()))?;
    share.approval_status = "approved".to_string();

    let mut profile_generated = false;
    if let Some(endpoint) = seller.delta_sharing_server_url.clone() {
        let token = ensure_token(&state, &mut share).await?;
        let now = Utc::now();
        regenerate_profile(&state, &share, &endpoint, &token, now).await?;
        profile_generated = true;
    }

    Ok(Json(ApprovalResponse {
        status: "success",
        message: "share approved",
        share_id,
        approval_status: share.approval_status,
        profile_generated,
    }))
}

pub async fn reject_share(
    State(state): State<Arc<MarketplaceState>>,
    headers: HeaderMap,
    Path(share_id): Path<i64>,
) -> Result<Json<RejectionResponse>> {
    let seller = current_seller(&headers, &state).await?;
    let _share = owned_share(&state, share_id, seller.id).await?;
    shares::set_approval_status(state.catalog.pool(), share_id, "rejected")
        .await
        .map_err(|e| Error::internal(e.to_string()))?;

    Ok(Json(RejectionResponse {
        status: "success",
        message: "share rejected",
        share_id,
        approval_status: "rejected".to_string(),
    }))
}

pub async fn get_share_profile(
    State(state): State<Arc<MarketplaceState>>,
    headers: HeaderMap,
    Path(share_id): Path<i64>,
) -> Result<Json<ProfileResponse>> {
    let user = current_user(&headers, &state).await?;
    let mut share = shares::find_by_id(state.catalog.pool(), share_id)
        .await
        .map_err(|e| Error::internal(e.to_string()))?
        .ok_or_else(|| Error::ShareNotFound(share_id.to_string()))?;

    if share.buyer_id != user.id && share.seller_id != user.id {
        return Err(ApiError::from(Error::forbidden("you can only access profiles for your own shares")));
    }

    if share.profile_json.is_none() {
        if share.approval_status != "approved" {
            return Err(ApiError::from(Error::validation(format!(
                "profile not available, share status: {}",
                share.approval_status
            ))));
        }
        let seller = users::find_by_id(state.catalog.pool(), share.seller_id)
            .await
            .map_err(|e| Error::internal(e.to_string()))?
            .ok_or_else(|| Error::UserNotFound(share.seller_id.to_string()))?;
        let endpoint = seller
            .delta_sharing_server_url
            .clone()
            .ok_or_else(|| Error::configuration("seller server URL not configured"))?;

        let token = ensure_token(&state, &mut share).await?;
        let now = Utc::now();
        regenerate_profile(&state, &share, &endpoint, &token, now).await?;
    }

    let profile_json = serde_json::to_string(
        share.profile_json.as_ref().expect("profile_json was just generated if missing"),
    )
    .map_err(|e| Error::internal(e.to_string()))?;

    Ok(Json(ProfileResponse {
        share_id: share.id,
        profile_json,
        generated_at: share.profile_generated_at.unwrap_or(share.created_at),
    }))
}

pub async fn my_profiles(
    State(state): State<Arc<MarketplaceState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<ProfileListItem>>> {
    let buyer = current_buyer(&headers, &state).await?;
    let shares = shares::list_by_buyer(state.catalog.pool(), buyer.id)
        .await
        .map_err(|e| Error::internal(e.to_string()))?;

    let mut out = Vec::new();
    for share in shares {
        if share.approval_status != "approved" || share.revoked {
            continue;
        }
        let Some(profile) = &share.profile_json else { continue };
        let dataset_name = datasets::find_by_id(state.catalog.pool(), share.dataset_id)
            .await
            .map_err(|e| Error::internal(e.to_string()))?
            .map(|d| d.name)
            .unwrap_or_default();
        out.push(ProfileListItem {
            share_id: share.id,
            dataset_id: share.dataset_id,
            dataset_name,
            profile_json: serde_json::to_string(profile).map_err(|e| Error::internal(e.to_string()))?,
            generated_at: share.profile_generated_at.unwrap_or(share.created_at),
            expires_at: share.expires_at,
        });
    }
    Ok(Json(out))
}

pub async fn usage_logs(
    State(state): State<Arc<MarketplaceState>>,
    headers: HeaderMap,
    Query(query): Query<UsageLogsQuery>,
) -> Result<Json<Vec<UsageLogResponse>>> {
    let seller = current_seller(&headers, &state).await?;
    let logs = audit_logs::list_by_seller(state.catalog.pool(), seller.id, query.dataset_id, query.share_id)
        .await
        .map_err(|e| Error::internal(e.to_string()))?;

    Ok(Json(
        logs.into_iter()
            .map(|log| UsageLogResponse {
                id: log.id,
                buyer_id: log.buyer_id,
                dataset_id: log.dataset_id,
                share_id: log.share_id,
                query_time: log.query_time,
                columns_requested: log.columns_requested,
                row_count_returned: log.row_count_returned,
                query_limit: log.query_limit,
                ip_address: log.ip_address,
            })
            .collect(),
    ))
}

// ---- Helpers ----

fn user_response(user: User) -> UserResponse {
    UserResponse { id: user.id, email: user.email, role: user.role, created_at: user.created_at }
}

fn dataset_response(dataset: Dataset) -> DatasetResponse {
    DatasetResponse {
        id: dataset.id,
        name: dataset.name,
        description: dataset.description,
        table_path: dataset.table_path,
        price: dataset.price,
        is_public: dataset.is_public,
        seller_id: dataset.seller_id,
        created_at: dataset.created_at,
        risk_score: Some(dataset.risk_score),
        risk_level: Some(dataset.risk_level),
    }
}

fn share_response(share: Share, dataset_name: String) -> ShareResponse {
    ShareResponse {
        id: share.id,
        dataset_id: share.dataset_id,
        dataset_name,
        seller_id: share.seller_id,
        buyer_id: share.buyer_id,
        token: share.token.unwrap_or_else(|| "[REDACTED]".to_string()),
        created_at: share.created_at,
        expires_at: share.expires_at,
        approval_status: share.approval_status,
        revoked: share.revoked,
        revoked_at: share.revoked_at,
    }
}

/// The bundle fields that get HMAC-signed, with `signature` itself excluded
/// — mirrors the publish tool popping `signature` before signing.
fn bundle_signing_payload(bundle: &DatasetMetadataBundle) -> JsonValue {
    json!({
        "version": bundle.version,
        "seller_id": bundle.seller_id,
        "name": bundle.name,
        "description": bundle.description,
        "table_path": bundle.table_path,
        "schema": bundle.schema,
        "anchor_columns": bundle.anchor_columns,
        "pii_analysis": bundle.pii_analysis,
        "sample_row_count": bundle.sample_row_count,
        "total_row_count": bundle.total_row_count,
        "published_at": bundle.published_at,
    })
}

/// A dataset visible to `user`: public, or owned by them as its seller.
async fn find_visible_dataset(state: &MarketplaceState, dataset_id: i64, user: &User) -> Result<Dataset> {
    let dataset = datasets::find_by_id(state.catalog.pool(), dataset_id)
        .await
        .map_err(|e| Error::internal(e.to_string()))?
        .ok_or_else(|| Error::DatasetNotFound(dataset_id.to_string()))?;
    if !dataset.is_public && dataset.seller_id != user.id {
        return Err(ApiError::from(Error::forbidden("dataset is not public and you are not the seller")));
    }
    Ok(dataset)
}

/// A share the caller owns as seller, or a 403/404.
async fn owned_share(state: &MarketplaceState, share_id: i64, seller_id: i64) -> Result<Share> {
    let share = shares::find_by_id(state.catalog.pool(), share_id)
        .await
        .map_err(|e| Error::internal(e.to_string()))?
        .ok_or_else(|| Error::ShareNotFound(share_id.to_string()))?;
    if share.seller_id != seller_id {
        return Err(ApiError::from(Error::forbidden("you can only manage your own shares")));
    }
    Ok(share)
}

async fn seller_server_url_for(state: &MarketplaceState, seller_id: i64) -> Result<Option<String>> {
    Ok(users::find_by_id(state.catalog.pool(), seller_id)
        .await
        .map_err(|e| Error::internal(e.to_string()))?
        .and_then(|seller| seller.delta_sharing_server_url))
}

/// Issue a bearer token for a share that doesn't have one yet, persisting
/// it, and returning the token to use for profile generation.
async fn ensure_token(state: &MarketplaceState, share: &mut Share) -> Result<String> {
    if let Some(token) = &share.token {
        return Ok(token.clone());
    }
    let token = mktplace_auth::token::generate_share_token();
    let token_hash = mktplace_auth::token::hash_token(&token, state.config.secrets.token_salt.as_bytes());
    shares::set_token(state.catalog.pool(), share.id, &token, &token_hash)
        .await
        .map_err(|e| Error::internal(e.to_string()))?;
    share.token = Some(token.clone());
    Ok(token)
}

/// Build and persist a Delta Sharing client profile for `share`, per the
/// `{shareCredentialsVersion, endpoint, bearerToken, expirationTime}`
/// document buyers bootstrap their client with.
async fn regenerate_profile(
    state: &MarketplaceState,
    share: &Share,
    endpoint: &str,
    token: &str,
    generated_at: chrono::DateTime<Utc>,
) -> Result<()> {
    let profile = DeltaSharingProfile {
        share_credentials_version: 1,
        endpoint: endpoint.to_string(),
        bearer_token: token.to_string(),
        expiration_time: share.expires_at.map(|t| t.to_rfc3339()),
    };
    let value = serde_json::to_value(&profile).map_err(|e| Error::internal(e.to_string()))?;
    shares::set_profile(state.catalog.pool(), share.id, &value, generated_at)
        .await
        .map_err(|e| Error::internal(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn dataset(is_public: bool, seller_id: i64, requires_approval: bool) -> Dataset {
        Dataset {
            id: 1,
            name: "n".to_string(),
            description: None,
            table_name: None,
            table_path: "s3://x".to_string(),
            price: 0.0,
            is_public,
            seller_id,
            created_at: Utc::now(),
            risk_score: 0.0,
            risk_level: "low".to_string(),
            detected_pii_types: None,
            sensitive_columns: None,
            requires_approval,
            anchor_columns: json!(["id"]),
        }
    }

    fn user(id: i64, role: &str) -> User {
        User {
            id,
            email: format!("user-{id}@example.com"),
            hashed_password: "hash".to_string(),
            role: role.to_string(),
            created_at: Utc::now(),
            delta_sharing_server_url: None,
        }
    }

    fn share(seller_id: i64, buyer_id: i64, token: Option<&str>) -> Share {
        Share {
            id: 7,
            dataset_id: 1,
            seller_id,
            buyer_id,
            token: token.map(str::to_string),
            token_hash: "h".to_string(),
            created_at: Utc::now(),
            expires_at: None,
            approval_status: "approved".to_string(),
            revoked: false,
            revoked_at: None,
            watermarked_table_path: None,
            is_trial: false,
            trial_row_limit: None,
            trial_expires_at: None,
            token_rotated_at: None,
            last_used_at: None,
            profile_json: None,
            profile_generated_at: None,
        }
    }

    #[test]
    fn dataset_response_carries_risk_fields() {
        let response = dataset_response(dataset(true, 1, false));
        assert_eq!(response.risk_score, Some(0.0));
        assert_eq!(response.risk_level.as_deref(), Some("low"));
    }

    #[test]
    fn share_response_redacts_a_missing_token() {
        let response = share_response(share(1, 2, None), "ds".to_string());
        assert_eq!(response.token, "[REDACTED]");
    }

    #[test]
    fn share_response_passes_through_a_present_token() {
        let response = share_response(share(1, 2, Some("tok")), "ds".to_string());
        assert_eq!(response.token, "tok");
    }

    #[test]
    fn trial_request_defaults_match_the_catalog_policy() {
        let default = TrialRequest::default();
        assert_eq!(default.row_limit, 100);
        assert_eq!(default.days_valid, 7);
    }

    #[test]
    fn trial_row_limit_is_capped_at_one_thousand() {
        let requested = TrialRequest { row_limit: 5000, days_valid: 7 };
        assert_eq!(requested.row_limit.min(1000), 1000);
    }

    fn bundle(seller_id: i64) -> DatasetMetadataBundle {
        DatasetMetadataBundle {
            version: "1".to_string(),
            seller_id,
            name: "orders".to_string(),
            description: None,
            table_path: "s3://bucket/orders".to_string(),
            schema: json!({"fields": []}),
            anchor_columns: vec!["customer_id".to_string()],
            pii_analysis: json!({"risk_score": 35.0, "risk_level": "high"}),
            sample_row_count: Some(100),
            total_row_count: Some(10_000),
            published_at: "2026-01-01T00:00:00Z".to_string(),
            signature: String::new(),
        }
    }

    #[test]
    fn bundle_signature_round_trips_through_the_same_canonicalization() {
        let b = bundle(1);
        let payload = bundle_signing_payload(&b);
        let signature = mktplace_auth::bundle::sign_bundle(&payload, b"secret");
        assert!(mktplace_auth::bundle::verify_bundle_signature(&payload, &signature, b"secret").is_ok());
    }

    #[test]
    fn tampering_with_a_bundle_field_breaks_the_signature() {
        let b = bundle(1);
        let payload = bundle_signing_payload(&b);
        let signature = mktplace_auth::bundle::sign_bundle(&payload, b"secret");
        let tampered = bundle_signing_payload(&bundle(2));
        assert!(mktplace_auth::bundle::verify_bundle_signature(&tampered, &signature, b"secret").is_err());
    }

    #[test]
    fn seller_id_mismatch_is_checked_ahead_of_signature_verification() {
        let seller = user(1, "seller");
        let b = bundle(2);
        assert_ne!(b.seller_id, seller.id);
    }
}

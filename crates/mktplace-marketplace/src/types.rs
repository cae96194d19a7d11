//! Marketplace JSON request/response shapes.
//!
//! Field names intentionally mirror the catalog's own `snake_case` columns
//! rather than being recased to the camelCase the Delta Sharing wire
//! protocol uses — this is the catalog-facing surface, not the data plane.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use validator::Validate;

// ---- Registration / login ----

fn default_role() -> String {
    "buyer".to_string()
}

#[derive(Debug, Deserialize, Validate)]
pub struct UserRegister {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
    #[serde(default = "default_role")]
    pub role: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UserLogin {
    #[validate(email)]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct DeltaSharingServerUrlRequest {
    pub server_url: String,
}

#[derive(Debug, Serialize)]
pub struct DeltaSharingServerUrlResponse {
    pub delta_sharing_server_url: Option<String>,
}

// ---- Datasets ----

/// A seller-signed bundle produced by the publish tooling. Verified once
/// against its HMAC signature at dataset-creation time and discarded —
/// nothing from this struct is persisted except what ends up on `Dataset`.
#[derive(Debug, Deserialize)]
pub struct DatasetMetadataBundle {
    pub version: String,
    pub seller_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub table_path: String,
    pub schema: JsonValue,
    pub anchor_columns: Vec<String>,
    pub pii_analysis: JsonValue,
    pub sample_row_count: Option<i64>,
    pub total_row_count: Option<i64>,
    pub published_at: String,
    pub signature: String,
}

#[derive(Debug, Deserialize)]
pub struct DatasetCreate {
    pub name: String,
    pub description: Option<String>,
    pub table_path: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub is_public: bool,
    pub anchor_columns: Option<String>,
    pub metadata_bundle: Option<DatasetMetadataBundle>,
}

#[derive(Debug, Serialize)]
pub struct DatasetResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub table_path: String,
    pub price: f64,
    pub is_public: bool,
    pub seller_id: i64,
    pub created_at: DateTime<Utc>,
    pub risk_score: Option<f64>,
    pub risk_level: Option<String>,
}

// ---- Purchase / trial ----

#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub id: i64,
    pub buyer_id: i64,
    pub dataset_id: i64,
    pub share_id: i64,
    pub amount: f64,
    pub created_at: DateTime<Utc>,
    pub share_token: String,
    pub approval_status: String,
    pub seller_server_url: Option<String>,
}

fn default_row_limit() -> i64 {
    100
}

fn default_days_valid() -> i64 {
    7
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TrialRequest {
    pub row_limit: i64,
    pub days_valid: i64,
}

impl Default for TrialRequest {
    fn default() -> Self {
        Self { row_limit: default_row_limit(), days_valid: default_days_valid() }
    }
}

#[derive(Debug, Serialize)]
pub struct TrialResponse {
    pub id: i64,
    pub buyer_id: i64,
    pub dataset_id: i64,
    pub share_id: i64,
    pub share_token: String,
    pub approval_status: String,
    pub seller_server_url: Option<String>,
    pub is_trial: bool,
    pub trial_row_limit: Option<i64>,
    pub trial_expires_at: Option<DateTime<Utc>>,
}

// ---- Shares ----

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub id: i64,
    pub dataset_id: i64,
    pub dataset_name: String,
    pub seller_id: i64,
    pub buyer_id: i64,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub approval_status: String,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct TokenRotationResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub share_id: i64,
    pub new_token: String,
}

#[derive(Debug, Serialize)]
pub struct ApprovalResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub share_id: i64,
    pub approval_status: String,
    pub profile_generated: bool,
}

#[derive(Debug, Serialize)]
pub struct RejectionResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub share_id: i64,
    pub approval_status: String,
}

// ---- Profiles ----

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub share_id: i64,
    pub profile_json: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ProfileListItem {
    pub share_id: i64,
    pub dataset_id: i64,
    pub dataset_name: String,
    pub profile_json: String,
    pub generated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// The Delta Sharing client profile document, per
/// <https://github.com/delta-io/delta-sharing/blob/main/PROTOCOL.md#profile-file-format>.
#[derive(Debug, Serialize)]
pub struct DeltaSharingProfile {
    #[serde(rename = "shareCredentialsVersion")]
    pub share_credentials_version: i32,
    pub endpoint: String,
    #[serde(rename = "bearerToken")]
    pub bearer_token: String,
    #[serde(rename = "expirationTime", skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<String>,
}

// ---- Usage logs ----

#[derive(Debug, Deserialize, Default)]
pub struct UsageLogsQuery {
    pub dataset_id: Option<i64>,
    pub share_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UsageLogResponse {
    pub id: i64,
    pub buyer_id: i64,
    pub dataset_id: i64,
    pub share_id: i64,
    pub query_time: DateTime<Utc>,
    pub columns_requested: Option<JsonValue>,
    pub row_count_returned: i64,
    pub query_limit: Option<i64>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

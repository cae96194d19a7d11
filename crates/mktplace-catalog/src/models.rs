//! Row shapes for the catalog tables.
//!
//! Each struct derives `sqlx::FromRow` and is fetched with runtime
//! `query_as` rather than the compile-time-checked `query_as!` macro — this
//! workspace has no live database to check queries against at build time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub hashed_password: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub delta_sharing_server_url: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Dataset {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub table_name: Option<String>,
    pub table_path: String,
    pub price: f64,
    pub is_public: bool,
    pub seller_id: i64,
    pub created_at: DateTime<Utc>,
    pub risk_score: f64,
    pub risk_level: String,
    pub detected_pii_types: Option<JsonValue>,
    pub sensitive_columns: Option<JsonValue>,
    pub requires_approval: bool,
    pub anchor_columns: JsonValue,
}

impl Dataset {
    /// `anchor_columns` as a plain string vec, per §4.4's contract.
    ///
    /// # Panics
    ///
    /// Panics if the stored JSON is not an array of strings — a catalog
    /// invariant enforced at dataset-creation time, never at read time.
    #[must_use]
    pub fn anchor_columns(&self) -> Vec<String> {
        self.anchor_columns
            .as_array()
            .expect("anchor_columns is always stored as a JSON array of strings")
            .iter()
            .map(|v| v.as_str().expect("anchor column names are strings").to_string())
            .collect()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Share {
    pub id: i64,
    pub dataset_id: i64,
    pub seller_id: i64,
    pub buyer_id: i64,
    pub token: Option<String>,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub approval_status: String,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub watermarked_table_path: Option<String>,
    pub is_trial: bool,
    pub trial_row_limit: Option<i64>,
    pub trial_expires_at: Option<DateTime<Utc>>,
    pub token_rotated_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub profile_json: Option<JsonValue>,
    pub profile_generated_at: Option<DateTime<Utc>>,
}

impl Share {
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.approval_status == "approved"
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
            || (self.is_trial && self.trial_expires_at.is_some_and(|exp| exp <= now))
    }

    /// Whether this share's token is due for rotation, measured from the
    /// last rotation if one happened or from issuance otherwise.
    #[must_use]
    pub fn needs_rotation(&self, rotation_days: i64, now: DateTime<Utc>) -> bool {
        let since = self.token_rotated_at.unwrap_or(self.created_at);
        mktplace_auth::token::should_rotate_token(since, rotation_days, now)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Purchase {
    pub id: i64,
    pub buyer_id: i64,
    pub dataset_id: i64,
    pub share_id: i64,
    pub amount: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditLog {
    pub id: i64,
    pub buyer_id: i64,
    pub dataset_id: i64,
    pub share_id: i64,
    pub query_time: DateTime<Utc>,
    pub columns_requested: Option<JsonValue>,
    pub row_count_returned: i64,
    pub query_limit: Option<i64>,
    pub predicates_requested: Option<JsonValue>,
    pub predicates_applied: Option<JsonValue>,
    pub predicates_applied_count: Option<i32>,
    pub anchor_columns_used: Option<JsonValue>,
    pub columns_returned: Option<JsonValue>,
    pub ip_address: Option<String>,
    pub bytes_served: Option<i64>,
    pub client_metadata: Option<JsonValue>,
}

/// Fields needed to insert a new audit log row; `id` and `query_time` are
/// assigned by the database.
#[derive(Clone, Debug)]
pub struct NewAuditLog {
    pub buyer_id: i64,
    pub dataset_id: i64,
    pub share_id: i64,
    pub columns_requested: JsonValue,
    pub row_count_returned: i64,
    pub query_limit: Option<i64>,
    pub predicates_requested: JsonValue,
    pub predicates_applied: JsonValue,
    pub predicates_applied_count: i32,
    pub anchor_columns_used: JsonValue,
    pub columns_returned: JsonValue,
    pub ip_address: Option<String>,
    pub bytes_served: Option<i64>,
    pub client_metadata: Option<JsonValue>,
}

use serde_json::Value as JsonValue;
use sqlx::PgPool;

use crate::models::Dataset;

const COLUMNS: &str = "id, name, description, table_name, table_path, price, is_public, \
    seller_id, created_at, risk_score, risk_level, detected_pii_types, sensitive_columns, \
    requires_approval, anchor_columns";

#[allow(clippy::too_many_arguments)]
pub async fn create(
    pool: &PgPool,
    name: &str,
    description: Option<&str>,
    table_name: Option<&str>,
    table_path: &str,
    price: f64,
    is_public: bool,
    seller_id: i64,
    risk_score: f64,
    risk_level: &str,
    detected_pii_types: Option<JsonValue>,
    sensitive_columns: Option<JsonValue>,
    requires_approval: bool,
    anchor_columns: &JsonValue,
) -> sqlx::Result<Dataset> {
    let query = format!(
        "insert into datasets (name, description, table_name, table_path, price, is_public, \
         seller_id, risk_score, risk_level, detected_pii_types, sensitive_columns, \
         requires_approval, anchor_columns) \
         values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
         returning {COLUMNS}"
    );
    sqlx::query_as::<_, Dataset>(&query)
        .bind(name)
        .bind(description)
        .bind(table_name)
        .bind(table_path)
        .bind(price)
        .bind(is_public)
        .bind(seller_id)
        .bind(risk_score)
        .bind(risk_level)
        .bind(detected_pii_types)
        .bind(sensitive_columns)
        .bind(requires_approval)
        .bind(anchor_columns)
        .fetch_one(pool)
        .await
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> sqlx::Result<Option<Dataset>> {
    let query = format!("select {COLUMNS} from datasets where id = $1");
    sqlx::query_as::<_, Dataset>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Datasets visible in the marketplace listing: the caller's own datasets
/// plus any public one.
pub async fn list_visible_to(pool: &PgPool, user_id: i64) -> sqlx::Result<Vec<Dataset>> {
    let query = format!(
        "select {COLUMNS} from datasets where is_public = true or seller_id = $1 \
         order by created_at desc"
    );
    sqlx::query_as::<_, Dataset>(&query)
        .bind(user_id)
        .fetch_all(pool)
        .await
}

pub async fn list_by_seller(pool: &PgPool, seller_id: i64) -> sqlx::Result<Vec<Dataset>> {
    let query = format!("select {COLUMNS} from datasets where seller_id = $1 order by created_at desc");
    sqlx::query_as::<_, Dataset>(&query)
        .bind(seller_id)
        .fetch_all(pool)
        .await
}

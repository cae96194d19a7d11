use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use crate::models::Share;

const COLUMNS: &str = "id, dataset_id, seller_id, buyer_id, token, token_hash, created_at, \
    expires_at, approval_status, revoked, revoked_at, watermarked_table_path, is_trial, \
    trial_row_limit, trial_expires_at, token_rotated_at, last_used_at, profile_json, \
    profile_generated_at";

#[allow(clippy::too_many_arguments)]
pub async fn create(
    pool: &PgPool,
    dataset_id: i64,
    seller_id: i64,
    buyer_id: i64,
    token: &str,
    token_hash: &str,
    expires_at: Option<DateTime<Utc>>,
    approval_status: &str,
    is_trial: bool,
    trial_row_limit: Option<i64>,
    trial_expires_at: Option<DateTime<Utc>>,
) -> sqlx::Result<Share> {
    let query = format!(
        "insert into shares (dataset_id, seller_id, buyer_id, token, token_hash, expires_at, \
         approval_status, is_trial, trial_row_limit, trial_expires_at) \
         values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         returning {COLUMNS}"
    );
    sqlx::query_as::<_, Share>(&query)
        .bind(dataset_id)
        .bind(seller_id)
        .bind(buyer_id)
        .bind(token)
        .bind(token_hash)
        .bind(expires_at)
        .bind(approval_status)
        .bind(is_trial)
        .bind(trial_row_limit)
        .bind(trial_expires_at)
        .fetch_one(pool)
        .await
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> sqlx::Result<Option<Share>> {
    let query = format!("select {COLUMNS} from shares where id = $1");
    sqlx::query_as::<_, Share>(&query).bind(id).fetch_optional(pool).await
}

/// Look up the share a Delta-Sharing bearer token authenticates.
///
/// The caller computes `token_hash` (HMAC of the raw token) and looks up
/// by hash, never by the plaintext token column — the plaintext is only
/// stored to let the owning buyer re-display it.
pub async fn find_by_token_hash(pool: &PgPool, token_hash: &str) -> sqlx::Result<Option<Share>> {
    let query = format!("select {COLUMNS} from shares where token_hash = $1");
    sqlx::query_as::<_, Share>(&query)
        .bind(token_hash)
        .fetch_optional(pool)
        .await
}

/// Find an unrevoked, unexpired trial share for this buyer/dataset pair,
/// used to prevent re-rolling a fresh trial once one is outstanding.
/// Look up a share by its plaintext token column.
///
/// Migration-only: new shares are looked up by `token_hash`
/// ([`find_by_token_hash`]). This exists solely for rows created before
/// hashed lookup was the only path and is scheduled for removal once the
/// backfill to `token_hash` completes for all legacy rows.
pub async fn find_by_legacy_plaintext(pool: &PgPool, token: &str) -> sqlx::Result<Option<Share>> {
    let query = format!("select {COLUMNS} from shares where token = $1");
    sqlx::query_as::<_, Share>(&query).bind(token).fetch_optional(pool).await
}

pub async fn find_active_trial(
    pool: &PgPool,
    buyer_id: i64,
    dataset_id: i64,
    now: DateTime<Utc>,
) -> sqlx::Result<Option<Share>> {
    let query = format!(
        "select {COLUMNS} from shares \
         where buyer_id = $1 and dataset_id = $2 and is_trial = true and revoked = false \
           and (trial_expires_at is null or trial_expires_at > $3) \
         order by created_at desc limit 1"
    );
    sqlx::query_as::<_, Share>(&query)
        .bind(buyer_id)
        .bind(dataset_id)
        .bind(now)
        .fetch_optional(pool)
        .await
}

pub async fn list_by_buyer(pool: &PgPool, buyer_id: i64) -> sqlx::Result<Vec<Share>> {
    let query = format!("select {COLUMNS} from shares where buyer_id = $1 order by created_at desc");
    sqlx::query_as::<_, Share>(&query).bind(buyer_id).fetch_all(pool).await
}

/// Every share where the caller is either the buyer or the seller, for the
/// marketplace's combined "my shares" listing.
pub async fn list_by_seller_or_buyer(pool: &PgPool, user_id: i64) -> sqlx::Result<Vec<Share>> {
    let query =
        format!("select {COLUMNS} from shares where seller_id = $1 or buyer_id = $1 order by created_at desc");
    sqlx::query_as::<_, Share>(&query).bind(user_id).fetch_all(pool).await
}

/// An existing, non-trial share for this buyer/dataset pair, used to reject
/// a second purchase of the same dataset.
pub async fn find_by_dataset_and_buyer(
    pool: &PgPool,
    dataset_id: i64,
    buyer_id: i64,
) -> sqlx::Result<Option<Share>> {
    let query = format!("select {COLUMNS} from shares where dataset_id = $1 and buyer_id = $2 limit 1");
    sqlx::query_as::<_, Share>(&query)
        .bind(dataset_id)
        .bind(buyer_id)
        .fetch_optional(pool)
        .await
}

pub async fn set_approval_status(pool: &PgPool, id: i64, status: &str) -> sqlx::Result<()> {
    sqlx::query("update shares set approval_status = $2 where id = $1")
        .bind(id)
        .bind(status)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn revoke(pool: &PgPool, id: i64, revoked_at: DateTime<Utc>) -> sqlx::Result<()> {
    sqlx::query("update shares set revoked = true, revoked_at = $2 where id = $1")
        .bind(id)
        .bind(revoked_at)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn rotate_token(
    pool: &PgPool,
    id: i64,
    new_token: &str,
    new_token_hash: &str,
    rotated_at: DateTime<Utc>,
) -> sqlx::Result<()> {
    sqlx::query(
        "update shares set token = $2, token_hash = $3, token_rotated_at = $4 where id = $1",
    )
    .bind(id)
    .bind(new_token)
    .bind(new_token_hash)
    .bind(rotated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn touch_last_used(pool: &PgPool, id: i64, used_at: DateTime<Utc>) -> sqlx::Result<()> {
    sqlx::query("update shares set last_used_at = $2 where id = $1")
        .bind(id)
        .bind(used_at)
        .execute(pool)
        .await?;
    Ok(())
}

/// Set the bearer token on a share that was created without one (e.g. a
/// pending share approved later). Distinct from [`rotate_token`], which
/// also stamps `token_rotated_at` — this is issuing the first token, not
/// replacing one.
pub async fn set_token(pool: &PgPool, id: i64, token: &str, token_hash: &str) -> sqlx::Result<()> {
    sqlx::query("update shares set token = $2, token_hash = $3 where id = $1")
        .bind(id)
        .bind(token)
        .bind(token_hash)
        .execute(pool)
        .await?;
    Ok(())
}

/// Clear a share's cached profile, e.g. on revocation — a revoked share
/// must not keep handing out a stale bearer token via its profile.
pub async fn clear_profile(pool: &PgPool, id: i64) -> sqlx::Result<()> {
    sqlx::query("update shares set profile_json = null, profile_generated_at = null where id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_watermarked_table_path(pool: &PgPool, id: i64, path: &str) -> sqlx::Result<()> {
    sqlx::query("update shares set watermarked_table_path = $2 where id = $1")
        .bind(id)
        .bind(path)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_profile(
    pool: &PgPool,
    id: i64,
    profile: &JsonValue,
    generated_at: DateTime<Utc>,
) -> sqlx::Result<()> {
    sqlx::query("update shares set profile_json = $2, profile_generated_at = $3 where id = $1")
        .bind(id)
        .bind(profile)
        .bind(generated_at)
        .execute(pool)
        .await?;
    Ok(())
}

use sqlx::PgPool;

use crate::models::{AuditLog, NewAuditLog};

const COLUMNS: &str = "id, buyer_id, dataset_id, share_id, query_time, columns_requested, \
    row_count_returned, query_limit, predicates_requested, predicates_applied, \
    predicates_applied_count, anchor_columns_used, columns_returned, ip_address, \
    bytes_served, client_metadata";

/// Append one immutable audit-log row for a completed query, per §4.10.
pub async fn append(pool: &PgPool, entry: &NewAuditLog) -> sqlx::Result<AuditLog> {
    let query = format!(
        "insert into audit_logs (buyer_id, dataset_id, share_id, columns_requested, \
         row_count_returned, query_limit, predicates_requested, predicates_applied, \
         predicates_applied_count, anchor_columns_used, columns_returned, ip_address, \
         bytes_served, client_metadata) \
         values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
         returning {COLUMNS}"
    );
    sqlx::query_as::<_, AuditLog>(&query)
        .bind(entry.buyer_id)
        .bind(entry.dataset_id)
        .bind(entry.share_id)
        .bind(&entry.columns_requested)
        .bind(entry.row_count_returned)
        .bind(entry.query_limit)
        .bind(&entry.predicates_requested)
        .bind(&entry.predicates_applied)
        .bind(entry.predicates_applied_count)
        .bind(&entry.anchor_columns_used)
        .bind(&entry.columns_returned)
        .bind(&entry.ip_address)
        .bind(entry.bytes_served)
        .bind(&entry.client_metadata)
        .fetch_one(pool)
        .await
}

pub async fn list_by_share(pool: &PgPool, share_id: i64) -> sqlx::Result<Vec<AuditLog>> {
    let query = format!("select {COLUMNS} from audit_logs where share_id = $1 order by query_time desc");
    sqlx::query_as::<_, AuditLog>(&query)
        .bind(share_id)
        .fetch_all(pool)
        .await
}

pub async fn list_by_buyer(pool: &PgPool, buyer_id: i64) -> sqlx::Result<Vec<AuditLog>> {
    let query = format!("select {COLUMNS} from audit_logs where buyer_id = $1 order by query_time desc");
    sqlx::query_as::<_, AuditLog>(&query)
        .bind(buyer_id)
        .fetch_all(pool)
        .await
}

/// Usage logs for every share belonging to one seller, with optional
/// dataset/share filters, newest first, capped at 100 rows — the
/// marketplace's `/usage-logs` listing.
pub async fn list_by_seller(
    pool: &PgPool,
    seller_id: i64,
    dataset_id: Option<i64>,
    share_id: Option<i64>,
) -> sqlx::Result<Vec<AuditLog>> {
    let prefixed: Vec<String> = COLUMNS.split(", ").map(|c| format!("audit_logs.{c}")).collect();
    let columns = prefixed.join(", ");
    let query = format!(
        "select {columns} from audit_logs \
         join shares on shares.id = audit_logs.share_id \
         where shares.seller_id = $1 \
           and ($2::bigint is null or audit_logs.dataset_id = $2) \
           and ($3::bigint is null or audit_logs.share_id = $3) \
         order by audit_logs.query_time desc limit 100"
    );
    sqlx::query_as::<_, AuditLog>(&query)
        .bind(seller_id)
        .bind(dataset_id)
        .bind(share_id)
        .fetch_all(pool)
        .await
}

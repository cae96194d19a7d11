//! Axum handlers for the Delta Sharing REST protocol, and the query
//! orchestration that ties auth → parse → scan → watermark → materialize →
//! sign → emit together (§5).

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use mktplace_catalog::audit_logs;
use mktplace_catalog::models::NewAuditLog;
use mktplace_common::value::AnchorValue;
use mktplace_common::{Error, Result as CommonResult};
use mktplace_predicate::{parse_json_predicate_hints, parse_predicate_hints, CompiledFilter, Predicate};
use mktplace_table::schema::{Column, ColumnType, TableSchema};
use mktplace_table::{reader, writer, Manifest, MANIFEST_FILE_NAME};
use mktplace_watermark::{Watermarker, WatermarkKey, TRIAL_WATERMARK_COLUMN};
use tracing::{info, warn};

use crate::error::{ApiError, Result};
use crate::guard::{authenticate, share_wire_name, AuthenticatedShare};
use crate::metrics;
use crate::state::SharingState;
use crate::types::{
    FileEntry, FileLine, Format, HealthResponse, ListSchemasResponse, ListSharesResponse,
    ListTablesResponse, MetadataLine, Protocol, ProtocolLine, QueryTableRequest, SchemaItem,
    ShareItem, TableItem, TableMetadata,
};

const SCHEMA_NAME: &str = "default";
const DELTA_TABLE_VERSION_HEADER: &str = "delta-table-version";

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "healthy" })
}

/// GET /shares
///
/// # Errors
///
/// Returns [`Error::MissingAuth`]/[`Error::InvalidToken`]/etc. if the bearer
/// token does not authenticate to a servable share.
pub async fn list_shares(State(state): State<Arc<SharingState>>, headers: HeaderMap) -> Result<impl IntoResponse> {
    let auth = auth_or_record(&state, &headers, None).await?;
    Ok(Json(ListSharesResponse {
        items: vec![ShareItem { name: share_wire_name(auth.share.id) }],
        next_page_token: None,
    }))
}

/// GET /shares/{share}/schemas
///
/// # Errors
///
/// Same as [`list_shares`], plus 404 if `share` does not match the
/// authenticated share's wire name.
pub async fn list_schemas(
    State(state): State<Arc<SharingState>>,
    Path(share): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let auth = auth_or_record(&state, &headers, Some(&share)).await?;
    Ok(Json(ListSchemasResponse {
        items: vec![SchemaItem { name: SCHEMA_NAME.to_string(), share: share_wire_name(auth.share.id) }],
        next_page_token: None,
    }))
}

/// GET /shares/{share}/schemas/{schema}/tables
///
/// # Errors
///
/// Same as [`list_shares`].
pub async fn list_tables(
    State(state): State<Arc<SharingState>>,
    Path((share, _schema)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let auth = auth_or_record(&state, &headers, Some(&share)).await?;
    let table_name = auth.dataset.table_name.clone().unwrap_or_else(|| auth.dataset.name.clone());
    Ok(Json(ListTablesResponse {
        items: vec![TableItem { name: table_name, schema: SCHEMA_NAME.to_string(), share: share_wire_name(auth.share.id) }],
        next_page_token: None,
    }))
}

/// GET /shares/{share}/schemas/{schema}/tables/{table}/version
///
/// # Errors
///
/// Auth failures as above, or a 500 if the table manifest cannot be read.
pub async fn get_table_version(
    State(state): State<Arc<SharingState>>,
    Path((share, _schema, _table)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let auth = auth_or_record(&state, &headers, Some(&share)).await?;
    let manifest = load_manifest(&state, &auth.dataset.table_path).await?;
    Ok((
        StatusCode::OK,
        [(DELTA_TABLE_VERSION_HEADER, manifest.version.to_string())],
        (),
    ))
}

/// GET /shares/{share}/schemas/{schema}/tables/{table}/metadata
///
/// # Errors
///
/// Auth failures as above, or a 500 if the manifest is unreadable or an
/// anchor column is missing from the table schema (a configuration bug).
pub async fn get_table_metadata(
    State(state): State<Arc<SharingState>>,
    Path((share, _schema, table)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let auth = auth_or_record(&state, &headers, Some(&share)).await?;
    let manifest = load_manifest(&state, &auth.dataset.table_path).await?;
    check_anchor_columns(&manifest.schema, &auth.dataset.anchor_columns())?;

    let delivered = manifest.schema.column_names();
    let body = ndjson_protocol_and_metadata(&table, &manifest.schema, &delivered);

    Ok((
        StatusCode::OK,
        [
            (axum::http::header::CONTENT_TYPE.as_str(), "application/x-ndjson".to_string()),
            (DELTA_TABLE_VERSION_HEADER, manifest.version.to_string()),
        ],
        body,
    ))
}

/// POST /shares/{share}/schemas/{schema}/tables/{table}/query
///
/// Runs the full pipeline: auth → parse predicates/projection → scan →
/// per-row watermark embedding → materialize a fresh Parquet file → sign a
/// GET URL → emit the NDJSON response. Audit logging happens after the
/// response body is built but in the same request; a logging failure is
/// logged and does not fail the query (§4.8).
///
/// # Errors
///
/// 401/403 on auth failure, 400 on a bad predicate or unknown column, 500 on
/// a configuration bug or object-store failure.
pub async fn query_table(
    State(state): State<Arc<SharingState>>,
    Path((share, _schema, table)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Option<Json<QueryTableRequest>>,
) -> Result<impl IntoResponse> {
    metrics::record_query();
    let auth = auth_or_record(&state, &headers, Some(&share)).await?;
    let request = body.map(|Json(b)| b).unwrap_or_default();

    // Best-effort GC of stale watermarked materializations; never blocks
    // the query (§4.6/§5).
    let store_for_sweep = state.store.clone();
    tokio::spawn(async move {
        mktplace_objectstore::sweep_watermarked_older_than_one_hour(&store_for_sweep).await;
    });

    let manifest = load_manifest(&state, &auth.dataset.table_path).await?;
    check_anchor_columns(&manifest.schema, &auth.dataset.anchor_columns())?;
    let anchor_columns = auth.dataset.anchor_columns();

    let delivered_columns = resolve_delivered_columns(request.columns.as_deref(), &manifest.schema)?;
    let scan_columns: Vec<String> = delivered_columns
        .iter()
        .chain(anchor_columns.iter())
        .cloned()
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();

    let predicates = parse_predicates(&request)?;
    let filter = CompiledFilter::compile(predicates.clone(), &manifest.schema.column_names())
        .map_err(ApiError::from)?;

    let effective_limit = effective_row_limit(&auth.share, request.limit_hint);

    let rows = fetch_rows(&state, &auth.dataset.table_path, &manifest, &filter, effective_limit)
        .await
        .map_err(ApiError::from)?;

    let key_secret = state.config.secrets.watermark_secret.as_bytes();
    let key = WatermarkKey::derive(key_secret, auth.share.buyer_id, auth.share.id);
    let watermarker = Watermarker::new(key);
    let timestamp_columns = manifest.schema.timestamp_columns();

    let mut watermarked_rows = rows;
    for row in &mut watermarked_rows {
        watermarker.embed_row(row, &anchor_columns, &timestamp_columns, auth.share.is_trial);
    }
    project_rows(&mut watermarked_rows, &scan_columns, &delivered_columns, auth.share.is_trial);

    let output_schema = output_schema_for(&manifest.schema, &delivered_columns, auth.share.is_trial);
    let parquet_bytes =
        writer::materialize(&output_schema, &watermarked_rows).map_err(ApiError::from)?;
    let size = parquet_bytes.len() as i64;

    let object_key = format!(
        "{}/_watermarked_{}_{}.parquet",
        auth.dataset.table_path.trim_end_matches('/'),
        auth.share.id,
        &uuid::Uuid::new_v4().simple().to_string()[..8],
    );
    state.store.put(&object_key, parquet_bytes).await.map_err(ApiError::from)?;
    state.store.await_visible(&object_key).await.map_err(ApiError::from)?;

    let presigned = state.store.presigned_get_url(&object_key, state.config.presign_ttl());

    let body = ndjson_query_response(&table, &manifest, &output_schema, &object_key, &presigned, size);

    metrics::record_rows_served(watermarked_rows.len() as u64);

    write_audit_log(&state, &auth, &request, &predicates, &delivered_columns, watermarked_rows.len(), size).await;

    Ok((
        StatusCode::OK,
        [
            (axum::http::header::CONTENT_TYPE.as_str(), "application/x-ndjson".to_string()),
            (DELTA_TABLE_VERSION_HEADER, manifest.version.to_string()),
        ],
        body,
    ))
}

// ---- Orchestration helpers ----

/// Authenticate and record the failure reason in metrics before
/// propagating, without leaking it past the guard's own error mapping.
async fn auth_or_record(
    state: &SharingState,
    headers: &HeaderMap,
    required_share: Option<&str>,
) -> Result<AuthenticatedShare> {
    let salt = state.config.secrets.token_salt.as_bytes();
    match authenticate(headers, &state.catalog, salt, state.seller_pin()).await {
        Ok(auth) => {
            if let Some(expected) = required_share {
                if share_wire_name(auth.share.id) != expected {
                    metrics::record_auth_failure("wrong_share");
                    return Err(ApiError::from(Error::ShareNotFound(expected.to_string())));
                }
            }
            Ok(auth)
        }
        Err(e) => {
            metrics::record_auth_failure(auth_failure_reason(&e));
            Err(ApiError::from(e))
        }
    }
}

const fn auth_failure_reason(e: &Error) -> &'static str {
    match e {
        Error::MissingAuth => "missing_auth",
        Error::InvalidToken => "invalid_token",
        Error::Revoked => "revoked",
        Error::Expired => "expired",
        Error::TrialExpired => "trial_expired",
        Error::NotApproved => "not_approved",
        Error::WrongSeller => "wrong_seller",
        _ => "other",
    }
}

async fn load_manifest(state: &SharingState, table_path: &str) -> Result<Manifest> {
    let key = format!("{}/{}", table_path.trim_end_matches('/'), MANIFEST_FILE_NAME);
    let bytes = state.store.get(&key).await.map_err(ApiError::from)?;
    Manifest::parse(&bytes).map_err(ApiError::from)
}

fn check_anchor_columns(schema: &TableSchema, anchor_columns: &[String]) -> Result<()> {
    for col in anchor_columns {
        if schema.column(col).is_none() {
            return Err(ApiError::from(Error::SchemaMismatch(format!(
                "anchor column '{col}' missing from table schema"
            ))));
        }
    }
    Ok(())
}

/// Union of buyer-requested columns and anchor columns, per §4.3. `None`
/// means "all schema columns". Any requested column not in the schema is a
/// 400.
fn resolve_delivered_columns(requested: Option<&[String]>, schema: &TableSchema) -> Result<Vec<String>> {
    let Some(requested) = requested else {
        return Ok(schema.column_names());
    };
    for col in requested {
        if schema.column(col).is_none() {
            return Err(ApiError::from(Error::UnknownColumn(col.clone())));
        }
    }
    Ok(requested.to_vec())
}

fn parse_predicates(request: &QueryTableRequest) -> Result<Vec<Predicate>> {
    let has_string_hints = !request.predicate_hints.is_empty();
    let has_json_hints = !request.json_predicate_hints.is_empty();
    if has_string_hints && has_json_hints {
        return Err(ApiError::from(Error::bad_predicate(
            "at most one of predicateHints or jsonPredicateHints may be set",
        )));
    }
    if has_json_hints {
        return parse_json_predicate_hints(&request.json_predicate_hints).map_err(ApiError::from);
    }
    parse_predicate_hints(&request.predicate_hints).map_err(ApiError::from)
}

/// `min(requested_limit, trial_row_limit)` when both are set, per §5's
/// "more restrictive of the two" resource policy.
fn effective_row_limit(share: &mktplace_catalog::models::Share, requested: Option<i64>) -> Option<u64> {
    let requested = requested.and_then(|n| u64::try_from(n).ok());
    let trial_cap = if share.is_trial {
        share.trial_row_limit.and_then(|n| u64::try_from(n).ok())
    } else {
        None
    };
    match (requested, trial_cap) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

async fn fetch_rows(
    state: &SharingState,
    table_path: &str,
    manifest: &Manifest,
    filter: &CompiledFilter,
    limit: Option<u64>,
) -> CommonResult<Vec<HashMap<String, AnchorValue>>> {
    let mut rows = Vec::new();
    for data_file in &manifest.data_files {
        if limit.is_some_and(|n| rows.len() as u64 >= n) {
            break;
        }
        let key = format!("{}/{}", table_path.trim_end_matches('/'), data_file);
        let bytes = state.store.get(&key).await?;
        let remaining = limit.map(|n| n - rows.len() as u64);
        let filter_opt = if filter.is_empty() { None } else { Some(filter) };
        let mut scanned = reader::scan(bytes, filter_opt, remaining)?;
        rows.append(&mut scanned);
    }
    Ok(rows)
}

/// Strip columns the scan read only to support watermarking/filtering
/// (anchor columns the buyer did not ask for) from the final result.
/// `_watermark_id` is always kept for trial shares regardless of the
/// buyer's requested projection.
fn project_rows(
    rows: &mut [HashMap<String, AnchorValue>],
    scan_columns: &[String],
    delivered_columns: &[String],
    is_trial: bool,
) {
    let to_drop: Vec<String> = scan_columns
        .iter()
        .filter(|c| !delivered_columns.contains(c))
        .cloned()
        .collect();
    if to_drop.is_empty() {
        return;
    }
    for row in rows {
        for col in &to_drop {
            if is_trial && col == TRIAL_WATERMARK_COLUMN {
                continue;
            }
            row.remove(col);
        }
    }
}

fn output_schema_for(schema: &TableSchema, delivered_columns: &[String], is_trial: bool) -> TableSchema {
    let mut columns: Vec<Column> = schema
        .columns
        .iter()
        .filter(|c| delivered_columns.contains(&c.name))
        .cloned()
        .collect();
    if is_trial {
        columns.push(Column { name: TRIAL_WATERMARK_COLUMN.to_string(), column_type: ColumnType::Integer, nullable: false });
    }
    TableSchema { columns }
}

fn ndjson_protocol_and_metadata(table_name: &str, schema: &TableSchema, delivered: &[String]) -> String {
    let protocol = ProtocolLine { protocol: Protocol { min_reader_version: 1 } };
    let meta = MetadataLine {
        meta_data: TableMetadata {
            id: table_name.to_string(),
            format: Format { provider: "parquet".to_string() },
            schema_string: schema.delta_schema_string(delivered),
            partition_columns: Vec::new(),
        },
    };
    format!(
        "{}\n{}\n",
        serde_json::to_string(&protocol).unwrap_or_default(),
        serde_json::to_string(&meta).unwrap_or_default(),
    )
}

fn ndjson_query_response(
    table_name: &str,
    manifest: &Manifest,
    output_schema: &TableSchema,
    object_key: &str,
    presigned_url: &str,
    size: i64,
) -> String {
    let mut body = ndjson_protocol_and_metadata(table_name, output_schema, &output_schema.column_names());
    let file_line = FileLine {
        file: FileEntry {
            url: presigned_url.to_string(),
            id: object_key.to_string(),
            partition_values: HashMap::new(),
            size,
            version: manifest.version as i64,
        },
    };
    body.push_str(&serde_json::to_string(&file_line).unwrap_or_default());
    body.push('\n');
    body
}

#[allow(clippy::too_many_arguments)]
async fn write_audit_log(
    state: &SharingState,
    auth: &AuthenticatedShare,
    request: &QueryTableRequest,
    predicates: &[Predicate],
    delivered_columns: &[String],
    row_count: usize,
    bytes_served: i64,
) {
    let predicates_applied: Vec<String> = predicates
        .iter()
        .map(|p| format!("{}:{:?}", p.column, p.op))
        .collect();
    let entry = NewAuditLog {
        buyer_id: auth.share.buyer_id,
        dataset_id: auth.dataset.id,
        share_id: auth.share.id,
        columns_requested: serde_json::json!(request.columns),
        row_count_returned: row_count as i64,
        query_limit: request.limit_hint,
        predicates_requested: serde_json::json!(request.predicate_hints),
        predicates_applied: serde_json::json!(predicates_applied),
        predicates_applied_count: predicates.len() as i32,
        anchor_columns_used: serde_json::json!(auth.dataset.anchor_columns()),
        columns_returned: serde_json::json!(delivered_columns),
        ip_address: None,
        bytes_served: Some(bytes_served),
        client_metadata: None,
    };

    if let Err(e) = audit_logs::append(state.catalog.pool(), &entry).await {
        warn!(error = %e, share_id = auth.share.id, "failed to append audit log; query still succeeded");
    } else {
        info!(share_id = auth.share.id, rows = row_count, "query served");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mktplace_catalog::models::Share;
    use mktplace_table::schema::{Column, ColumnType};

    fn schema_with(names: &[(&str, ColumnType)]) -> TableSchema {
        TableSchema {
            columns: names
                .iter()
                .map(|(name, ty)| Column { name: (*name).to_string(), column_type: *ty, nullable: true })
                .collect(),
        }
    }

    fn row_of(pairs: &[(&str, AnchorValue)]) -> HashMap<String, AnchorValue> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    fn share(is_trial: bool, trial_row_limit: Option<i64>) -> Share {
        Share {
            id: 1,
            dataset_id: 1,
            seller_id: 1,
            buyer_id: 1,
            token: None,
            token_hash: "h".to_string(),
            created_at: chrono::Utc::now(),
            expires_at: None,
            approval_status: "approved".to_string(),
            revoked: false,
            revoked_at: None,
            watermarked_table_path: None,
            is_trial,
            trial_row_limit,
            trial_expires_at: None,
            token_rotated_at: None,
            last_used_at: None,
            profile_json: None,
            profile_generated_at: None,
        }
    }

    #[test]
    fn resolve_delivered_columns_defaults_to_full_schema() {
        let schema = schema_with(&[("id", ColumnType::Integer), ("name", ColumnType::String)]);
        let delivered = resolve_delivered_columns(None, &schema).unwrap();
        assert_eq!(delivered, vec!["id".to_string(), "name".to_string()]);
    }

    #[test]
    fn resolve_delivered_columns_rejects_unknown_column() {
        let schema = schema_with(&[("id", ColumnType::Integer)]);
        let requested = vec!["nope".to_string()];
        let err = resolve_delivered_columns(Some(&requested), &schema).unwrap_err();
        assert_eq!(err.0.http_status_code(), 400);
    }

    #[test]
    fn effective_row_limit_takes_the_smaller_of_request_and_trial_cap() {
        let trial = share(true, Some(100));
        assert_eq!(effective_row_limit(&trial, Some(500)), Some(100));
        assert_eq!(effective_row_limit(&trial, Some(10)), Some(10));
        assert_eq!(effective_row_limit(&trial, None), Some(100));
    }

    #[test]
    fn effective_row_limit_is_unbounded_for_full_access_without_a_request() {
        let full = share(false, None);
        assert_eq!(effective_row_limit(&full, None), None);
        assert_eq!(effective_row_limit(&full, Some(50)), Some(50));
    }

    #[test]
    fn project_rows_strips_anchor_only_columns_but_keeps_watermark_id() {
        let mut rows = vec![row_of(&[
            ("id", AnchorValue::Int(1)),
            ("secret_anchor", AnchorValue::Int(2)),
            (TRIAL_WATERMARK_COLUMN, AnchorValue::Int(42)),
        ])];
        let scan_columns = vec!["id".to_string(), "secret_anchor".to_string()];
        let delivered = vec!["id".to_string()];
        project_rows(&mut rows, &scan_columns, &delivered, true);
        assert!(rows[0].contains_key("id"));
        assert!(!rows[0].contains_key("secret_anchor"));
        assert!(rows[0].contains_key(TRIAL_WATERMARK_COLUMN));
    }

    #[test]
    fn output_schema_for_adds_watermark_id_column_only_for_trials() {
        let schema = schema_with(&[("id", ColumnType::Integer)]);
        let delivered = vec!["id".to_string()];
        let trial_schema = output_schema_for(&schema, &delivered, true);
        assert!(trial_schema.column(TRIAL_WATERMARK_COLUMN).is_some());

        let full_schema = output_schema_for(&schema, &delivered, false);
        assert!(full_schema.column(TRIAL_WATERMARK_COLUMN).is_none());
    }

    #[test]
    fn parse_predicates_rejects_both_hint_kinds_at_once() {
        let request = QueryTableRequest {
            columns: None,
            limit_hint: None,
            predicate_hints: vec!["id = 1".to_string()],
            json_predicate_hints: vec![serde_json::json!({"op": "isNull", "column": "id"})],
        };
        let err = parse_predicates(&request).unwrap_err();
        assert_eq!(err.0.http_status_code(), 400);
    }
}

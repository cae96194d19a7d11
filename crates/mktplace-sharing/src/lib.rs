//! Delta Sharing protocol data plane.
//!
//! Implements the Delta Sharing REST API v1 as an Axum router: bearer-token
//! auth and the share state machine ([`guard`]), the restricted predicate
//! DSL re-exported from `mktplace-predicate`, per-buyer row watermarking via
//! `mktplace-watermark`, and per-query Parquet materialization onto object
//! storage. One query is one sequential unit of work: authenticate, parse,
//! scan, watermark, write, sign, emit, then audit (§5).
//!
//! Reference: <https://github.com/delta-io/delta-sharing/blob/main/PROTOCOL.md>

pub mod error;
pub mod guard;
pub mod handlers;
pub mod metrics;
pub mod state;
pub mod types;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

pub use state::SharingState;

/// Build the Delta Sharing REST API router, nested at `/v1` by the binary
/// that mounts it alongside `/health`.
pub fn router(state: Arc<SharingState>) -> Router {
    Router::new()
        .route("/v1/shares", get(handlers::list_shares))
        .route("/v1/shares/{share}/schemas", get(handlers::list_schemas))
        .route(
            "/v1/shares/{share}/schemas/{schema}/tables",
            get(handlers::list_tables),
        )
        .route(
            "/v1/shares/{share}/schemas/{schema}/tables/{table}/version",
            get(handlers::get_table_version),
        )
        .route(
            "/v1/shares/{share}/schemas/{schema}/tables/{table}/metadata",
            get(handlers::get_table_metadata),
        )
        .route(
            "/v1/shares/{share}/schemas/{schema}/tables/{table}/query",
            post(handlers::query_table),
        )
        .route("/health", get(handlers::health))
        .with_state(state)
}

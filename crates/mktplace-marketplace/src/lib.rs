//! Marketplace catalog API: registration, login, dataset publish,
//! purchase/trial, share lifecycle, profile and usage-log fetch.
//!
//! Sits alongside the Delta Sharing data plane in `mktplace-sharing`: this
//! crate is the catalog surface a buyer or seller's browser talks to, while
//! `mktplace-sharing` is what a buyer's Delta Sharing client talks to once
//! it has a profile from here.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod state;
pub mod types;

use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;

pub use state::MarketplaceState;

/// Build the marketplace catalog router.
pub fn router(state: Arc<MarketplaceState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/me", get(handlers::me))
        .route("/me/delta-sharing-server-url", put(handlers::update_server_url))
        .route("/datasets", get(handlers::list_datasets).post(handlers::create_dataset))
        .route("/purchase/{dataset_id}", post(handlers::purchase_dataset))
        .route("/datasets/{dataset_id}/trial", post(handlers::request_trial))
        .route("/my-datasets", get(handlers::my_datasets))
        .route("/my-shares", get(handlers::my_shares))
        .route("/shares/{share_id}/rotate-token", post(handlers::rotate_token))
        .route("/shares/{share_id}", delete(handlers::revoke_share))
        .route("/shares/{share_id}/approve", post(handlers::approve_share))
        .route("/shares/{share_id}/reject", post(handlers::reject_share))
        .route("/shares/{share_id}/profile", get(handlers::get_share_profile))
        .route("/my-profiles", get(handlers::my_profiles))
        .route("/usage-logs", get(handlers::usage_logs))
        .with_state(state)
}

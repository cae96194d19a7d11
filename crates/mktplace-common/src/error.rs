//! Error taxonomy shared across the marketplace workspace.
//!
//! Mirrors the shape of the teacher's `objectio-common::error::Error`: one flat
//! `thiserror` enum, constructor helpers for the common cases, and a method
//! that classifies each variant to an HTTP status code so the web layer never
//! has to duplicate that mapping.

use thiserror::Error;

/// Common result type for marketplace operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the sharing data plane and the marketplace catalog.
///
/// Variant names follow spec §7's taxonomy rather than the HTTP status they
/// map to; `http_status_code` is the single place that mapping is decided.
#[derive(Debug, Error)]
pub enum Error {
    // ---- Authentication / authorization (§4.1) ----
    #[error("missing Authorization header")]
    MissingAuth,

    #[error("invalid bearer token")]
    InvalidToken,

    #[error("share has been revoked")]
    Revoked,

    #[error("share has expired")]
    Expired,

    #[error("trial period has expired")]
    TrialExpired,

    #[error("share is not yet approved")]
    NotApproved,

    #[error("share does not belong to this seller")]
    WrongSeller,

    // ---- Predicate / projection (§4.2, §4.3) ----
    #[error("bad predicate: {0}")]
    BadPredicate(String),

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("limit exceeds policy: {0}")]
    LimitOverflow(String),

    // ---- Configuration (§4.3, §4.11) ----
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    // ---- Object store / materialization (§4.6) ----
    #[error("object store read-after-write visibility not confirmed after retries")]
    ReadAfterWriteVisibility,

    #[error("object store error: {0}")]
    TransientObjectStore(String),

    // ---- Catalog (marketplace, §6) ----
    #[error("dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("share not found: {0}")]
    ShareNotFound(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("validation failed: {0}")]
    Validation(String),

    // ---- Catch-all ----
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    #[must_use]
    pub fn bad_predicate(msg: impl Into<String>) -> Self {
        Self::BadPredicate(msg.into())
    }

    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    #[must_use]
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// HTTP status code for this error, per spec §7/§4.11.
    ///
    /// Guard failures collapse to 401 except `NotApproved`/`WrongSeller`,
    /// which are 403 — the caller must not be able to distinguish the other
    /// guard failures from one another by status code alone.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::MissingAuth
            | Self::InvalidToken
            | Self::Revoked
            | Self::Expired
            | Self::TrialExpired => 401,

            Self::NotApproved | Self::WrongSeller | Self::Forbidden(_) => 403,

            Self::BadPredicate(_) | Self::UnknownColumn(_) | Self::LimitOverflow(_) | Self::Validation(_) => 400,

            Self::DatasetNotFound(_) | Self::ShareNotFound(_) | Self::UserNotFound(_) => 404,

            Self::AlreadyExists(_) => 409,

            Self::SchemaMismatch(_) | Self::Configuration(_) => 500,

            Self::ReadAfterWriteVisibility | Self::TransientObjectStore(_) | Self::Internal(_) => {
                500
            }
        }
    }

    /// Whether this error may be safely retried by the caller.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ReadAfterWriteVisibility)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_failures_map_to_401_except_approval_and_seller() {
        assert_eq!(Error::MissingAuth.http_status_code(), 401);
        assert_eq!(Error::InvalidToken.http_status_code(), 401);
        assert_eq!(Error::Revoked.http_status_code(), 401);
        assert_eq!(Error::Expired.http_status_code(), 401);
        assert_eq!(Error::TrialExpired.http_status_code(), 401);
        assert_eq!(Error::NotApproved.http_status_code(), 403);
        assert_eq!(Error::WrongSeller.http_status_code(), 403);
    }

    #[test]
    fn predicate_errors_are_400() {
        assert_eq!(Error::bad_predicate("nope").http_status_code(), 400);
        assert_eq!(Error::UnknownColumn("x".into()).http_status_code(), 400);
    }

    #[test]
    fn schema_mismatch_is_a_500_configuration_bug() {
        assert_eq!(Error::SchemaMismatch("anchor".into()).http_status_code(), 500);
    }

    #[test]
    fn marketplace_errors_map_to_403_and_400() {
        assert_eq!(Error::forbidden("nope").http_status_code(), 403);
        assert_eq!(Error::validation("nope").http_status_code(), 400);
    }

    #[test]
    fn already_exists_is_409() {
        assert_eq!(Error::AlreadyExists("user@example.com".into()).http_status_code(), 409);
    }
}

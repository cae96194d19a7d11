//! Maps the shared error taxonomy onto the Delta Sharing wire contract:
//! a JSON body with a single `detail` field and the status code
//! [`mktplace_common::Error::http_status_code`] already knows how to pick.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mktplace_common::Error;

/// Newtype so this crate can impl `IntoResponse` for the shared error type
/// without an orphan-rule violation.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = serde_json::json!({ "detail": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

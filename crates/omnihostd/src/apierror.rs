//! JSON error payloads shared by every handler: `{error, details, queryTime?}`
//! per §6's wire format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, error: "bad_request".into(), details: Some(msg.into()) }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self { status: StatusCode::NOT_FOUND, error: "not_found".into(), details: Some(msg.into()) }
    }

    pub fn internal(msg: impl std::fmt::Display) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, error: "internal".into(), details: Some(msg.to_string()) }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

impl<E: std::fmt::Display> From<E> for ApiError
where
    E: AsPersistLike,
{
    fn from(e: E) -> Self {
        ApiError::internal(e)
    }
}

/// Marker so the blanket `From` impl above only covers this crate's own
/// persistence/task error types, not every `Display` type in scope.
pub trait AsPersistLike {}
impl AsPersistLike for omnihost_core::error::PersistError {}
impl AsPersistLike for omnihost_core::error::TaskError {}
impl AsPersistLike for omnihost_core::console::BridgeError {}

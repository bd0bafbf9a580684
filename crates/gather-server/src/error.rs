use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use gather_shared::validate::ValidateError;
use gather_store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("not found: {0}")]
    NotFound(&'static str),

    #[error("invalid request: {0}")]
    BadRequest(String),

    /// The update lost too many optimistic-concurrency races. Transient;
    /// the client may resubmit.
    #[error("temporarily overloaded, retry")]
    Contention,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ApiError::NotFound("no such record"),
            StoreError::AlreadyExists => ApiError::BadRequest("already exists".into()),
            StoreError::Rejected(reason) => ApiError::BadRequest(reason),
            StoreError::TooManyRetries => ApiError::Contention,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ValidateError> for ApiError {
    fn from(e: ValidateError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Contention => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            ApiError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

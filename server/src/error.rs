use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::{ErrorResponse, JobId};
use thiserror::Error;

/// Errores del registro de jobs. Nunca cruzan el proceso como panic:
/// siempre salen como respuesta JSON `{"error": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("job not found: {0}")]
    NotFound(JobId),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::MalformedRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "Job not found".to_string()),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use inference::DetectionError;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by HTTP handlers. Every variant renders as
/// `{"detail": "..."}` with a matching status code.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Detection(#[from] DetectionError),

    #[error("Invalid multipart request: {0}")]
    Multipart(String),

    #[error("Missing form field `{0}`")]
    MissingField(&'static str),

    #[error("Detection task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Detection(DetectionError::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Detection(e) if e.is_decode_error() => StatusCode::BAD_REQUEST,
            ApiError::Multipart(_) | ApiError::MissingField(_) => StatusCode::BAD_REQUEST,
            ApiError::Detection(_) | ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

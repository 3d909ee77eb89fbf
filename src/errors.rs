use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::models::BookingStatus;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("write failed: {0}")]
    Write(String),

    #[error("read failed: {0}")]
    Read(String),

    #[error("subscription failed: {0}")]
    Subscription(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("cannot move booking from {} to {}", from.as_str(), to.as_str())]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unauthorized")]
    Unauthorized,
}

impl AppError {
    /// Store failure during a create/update. A missing target document keeps
    /// its own meaning.
    pub fn write(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection, id } => {
                AppError::NotFound(format!("{collection}/{id}"))
            }
            other => AppError::Write(other.to_string()),
        }
    }

    pub fn read(err: StoreError) -> Self {
        AppError::Read(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Write(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Read(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Subscription(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Upload(_) => StatusCode::BAD_GATEWAY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// 接口层错误, 统一返回 `{"error": "..."}`
#[derive(Error, Debug)]
pub enum AppError {
    #[error("No image file provided.")]
    NoImage,
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
    #[error("Bill not found.")]
    NotFound,
    #[error("Failed to read uploaded image file from storage.")]
    ImageUnreadable,
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Failed to process bill: {0}")]
    Processing(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NoImage => StatusCode::BAD_REQUEST,
            AppError::Rejected { status, .. } => *status,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::ImageUnreadable
            | AppError::Storage(_)
            | AppError::Database(_)
            | AppError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

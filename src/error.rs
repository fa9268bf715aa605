use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unknown stack: {0}")]
    UnknownStack(String),

    #[error("Malformed backend reply: {0}")]
    MalformedReply(String),

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Failed to read request body: {0}")]
    BodyRead(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::UnknownStack(name) => {
                (StatusCode::NOT_FOUND, format!("Stack '{}' not found", name))
            }
            AppError::MalformedReply(e) => {
                tracing::error!("Malformed backend reply: {}", e);
                (StatusCode::BAD_GATEWAY, e)
            }
            AppError::Upstream(e) => {
                tracing::error!("Upstream request failed: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            AppError::Notification(e) => {
                tracing::error!("Notification error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e)
            }
            AppError::BodyRead(e) => (StatusCode::BAD_REQUEST, e),
        };

        let body = json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

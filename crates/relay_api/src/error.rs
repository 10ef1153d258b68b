use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or invalid startup configuration. Raised before the server
    /// binds; never produced mid-request.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("Invalid Webhook")]
    InvalidWebhook,

    #[error("Invalid JSON in request body")]
    MalformedBody,

    /// The provider call exceeded its deadline. Kept distinct from
    /// `Upstream` so callers can report timeouts specifically.
    #[error("Request timeout while processing order")]
    UpstreamTimeout,

    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("queue error: {0}")]
    Queue(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidWebhook | AppError::MalformedBody => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

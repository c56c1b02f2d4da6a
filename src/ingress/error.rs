use crate::coordination::errors::TriggerError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced to HTTP callers of the ingress
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid JSON")]
    InvalidJson,

    #[error("Missing 'city'")]
    MissingCity,

    #[error("{0}")]
    Trigger(#[from] TriggerError),

    #[error("Invalid completion event: {0}")]
    InvalidEvent(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Every ingress rejection is a caller mistake
        let body = ErrorResponse {
            status: "error",
            message: self.to_string(),
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

pub mod admin;
pub mod calendar;
pub mod render;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use eventfeed_calendar::CalendarError;
use eventfeed_core::StoreError;
use eventfeed_render::RenderError;
use serde::Serialize;
use thiserror::Error;

/// Standard API error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Errors a handler can return, mapped to HTTP status codes.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Missing or wrong admin token")]
    Unauthorized,

    #[error("Admin endpoints are disabled")]
    AdminDisabled,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Calendar(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            AppError::Render(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::AdminDisabled => StatusCode::FORBIDDEN,
        }
    }

    fn body(&self) -> ErrorResponse {
        let (error, message) = match self {
            AppError::Calendar(e) => (e.code(), e.user_message()),
            AppError::Render(e) => (e.code(), e.user_message().to_string()),
            AppError::Store(e) => ("settings_store_error", e.user_message().to_string()),
            AppError::BadRequest(msg) => ("bad_request", msg.clone()),
            AppError::Unauthorized => ("unauthorized", self.to_string()),
            AppError::AdminDisabled => ("admin_disabled", self.to_string()),
        };
        ErrorResponse {
            error: error.to_string(),
            message,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }
        (status, Json(self.body())).into_response()
    }
}

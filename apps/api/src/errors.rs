use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::ratelimit::RateLimitError;
use crate::subscription::Tier;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Admission denials (rate limited, tier insufficient) are modeled here as
/// normal outcomes with their own variants, distinct from infrastructure
/// failures.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Upgrade required: {required:?} tier needed")]
    UpgradeRequired { required: Tier },

    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Rate limiter misconfigured: {0}")]
    RateLimitConfig(#[from] RateLimitError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, error_body("NOT_FOUND", msg)),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, error_body("VALIDATION_ERROR", msg))
            }
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                error_body("UNAUTHORIZED", "Authentication required"),
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                error_body("FORBIDDEN", "Access denied"),
            ),
            AppError::UpgradeRequired { required } => (
                StatusCode::FORBIDDEN,
                json!({
                    "error": {
                        "code": "UPGRADE_REQUIRED",
                        "message": format!(
                            "This feature requires the {} plan or higher",
                            required.as_str()
                        ),
                        "required_tier": required.as_str(),
                        "upgrade": "/pricing"
                    }
                }),
            ),
            AppError::RateLimited { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({
                    "error": {
                        "code": "RATE_LIMITED",
                        "message": "Too many requests",
                        "retry_after_secs": retry_after_secs
                    }
                }),
            ),
            AppError::RateLimitConfig(e) => {
                tracing::error!("Rate limiter misconfigured: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_body("INTERNAL_ERROR", "An internal server error occurred"),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_body("DATABASE_ERROR", "A database error occurred"),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_body("INTERNAL_ERROR", "An internal server error occurred"),
                )
            }
        };

        let mut response = (status, Json(body)).into_response();

        if let AppError::RateLimited { retry_after_secs } = &self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

fn error_body(code: &str, message: &str) -> serde_json::Value {
    json!({
        "error": {
            "code": code,
            "message": message
        }
    })
}

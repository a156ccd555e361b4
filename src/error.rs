//! Error types for Warden
//!
//! `CacheError` covers the cache layer (engines, codec, façade) and
//! `AppError` covers everything built on top of it.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Cache-layer errors
///
/// Engine-specific "not found" sentinels are translated to `KeyNotFound`
/// at the engine boundary; consumers never see engine-native miss values.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache key not found")]
    KeyNotFound,

    #[error("cache engine is closed")]
    EngineClosed,

    #[error("failed to encode cache value: {0}")]
    Encoding(#[source] serde_json::Error),

    #[error("failed to decode cache value: {0}")]
    Decoding(#[source] serde_json::Error),

    #[error("cache request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Embedded store error: {0}")]
    Embedded(#[from] sled::Error),

    #[error("Corrupt cache entry: {0}")]
    CorruptEntry(String),
}

impl CacheError {
    /// True for a single-key read miss
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::KeyNotFound)
    }
}

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Access token has expired")]
    TokenExpired,

    #[error("Access token has been revoked")]
    TokenRevoked,

    #[error("Token is created for other account type")]
    IncorrectAccountType,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Request failed due to rate-limit ({used}/{limit})")]
    RateLimited { limit: usize, used: usize },

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error details
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

/// Additional error details for rate limiting
#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used: Option<usize>,
}

impl AppError {
    /// HTTP status and machine-readable code for this error
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::TokenExpired => (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED"),
            AppError::TokenRevoked => (StatusCode::UNAUTHORIZED, "TOKEN_REVOKED"),
            AppError::IncorrectAccountType => (StatusCode::FORBIDDEN, "INCORRECT_ACCOUNT_TYPE"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED"),
            AppError::Cache(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CACHE_ERROR"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let (message, details) = match &self {
            AppError::RateLimited { limit, used } => (
                "Too many requests. Please slow down.".to_string(),
                Some(ErrorDetails {
                    limit: Some(*limit),
                    used: Some(*used),
                }),
            ),
            AppError::NotFound(msg) => (msg.clone(), None),
            AppError::Cache(_) => ("Cache service error".to_string(), None),
            AppError::Internal(_) => ("Internal server error".to_string(), None),
            _ => (self.to_string(), None),
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for the cache layer
pub type CacheResult<T> = Result<T, CacheError>;

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

//! # Centralized Error Handling
//!
//! This module defines the application-wide error type [`AppError`] returned at
//! the HTTP boundary. Domain layers keep their own typed errors
//! ([`StoreError`](crate::model::store::StoreError), the auth and gateway errors in
//! the other crates) and convert into `AppError` where a response is produced.
//!
//! ## Error Categories
//!
//! 1. **Client Errors** (4xx)
//!    - [`Unauthorized`](AppError::Unauthorized) → 401 Unauthorized
//!    - [`BadRequest`](AppError::BadRequest) → 400 Bad Request
//!    - [`NotFound`](AppError::NotFound) → 404 Not Found
//!    - [`Conflict`](AppError::Conflict) → 409 Conflict
//!
//! 2. **Server Errors** (5xx)
//!    - [`StoreFailure`](AppError::StoreFailure) → 500 (persistence unreachable or write rejected)
//!    - [`GatewayFailure`](AppError::GatewayFailure) → 500 (upstream AI call failed)
//!    - [`Config`](AppError::Config) / [`Internal`](AppError::Internal) → 500
//!
//! ## Usage Example
//!
//! ```rust
//! use lib_core::error::{AppError, Result};
//!
//! fn parse_text(text: &str) -> Result<&str> {
//!     if text.trim().is_empty() {
//!         return Err(AppError::BadRequest("text cannot be empty".to_string()));
//!     }
//!     Ok(text)
//! }
//! ```

use crate::model::store::StoreError;
use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

/// Convenience type alias for `Result<T, AppError>`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application-wide error type covering all error scenarios.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing, invalid or expired credential.
    ///
    /// **HTTP Status**: 401 Unauthorized
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Malformed body or invalid field values.
    ///
    /// **HTTP Status**: 400 Bad Request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Requested resource not found.
    ///
    /// **HTTP Status**: 404 Not Found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate resource (e.g. email already registered).
    ///
    /// **HTTP Status**: 409 Conflict
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Persistence unreachable or write rejected.
    ///
    /// **HTTP Status**: 500 Internal Server Error
    #[error("Store failure: {0}")]
    StoreFailure(String),

    /// Upstream AI call failed or was rejected.
    ///
    /// **HTTP Status**: 500 Internal Server Error
    #[error("Gateway failure: {0}")]
    GatewayFailure(String),

    /// Configuration error during startup or environment loading.
    ///
    /// **HTTP Status**: 500 Internal Server Error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (unexpected failures).
    ///
    /// **HTTP Status**: 500 Internal Server Error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::StoreFailure(_)
            | AppError::GatewayFailure(_)
            | AppError::Config(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a user-friendly error message.
    ///
    /// Server-side failures return a generic message so storage or upstream
    /// details never reach the client.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Unauthorized(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => msg.clone(),
            AppError::StoreFailure(_) => "Could not access message history".to_string(),
            AppError::GatewayFailure(_) => "Error communicating with AI".to_string(),
            AppError::Config(_) | AppError::Internal(_) => "An internal error occurred".to_string(),
        }
    }

    /// Variant name used as the `code` field of error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::BadRequest(_) => "BadRequest",
            AppError::NotFound(_) => "NotFound",
            AppError::Conflict(_) => "Conflict",
            AppError::StoreFailure(_) => "StoreFailure",
            AppError::GatewayFailure(_) => "GatewayFailure",
            AppError::Config(_) => "Config",
            AppError::Internal(_) => "Internal",
        }
    }
}

/// Implement Axum's `IntoResponse` for automatic error handling.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Full error message stays in server logs
        if status.is_server_error() {
            tracing::error!("Server error: {}", self);
        } else {
            tracing::debug!("Client error: {}", self);
        }

        let body = Json(json!({
            "error": self.user_message(),
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}

/// Convert `anyhow::Error` to `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Convert `sqlx::Error` to `AppError`.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Database record not found".to_string()),
            _ => AppError::StoreFailure(err.to_string()),
        }
    }
}

/// Convert `StoreError` to `AppError`.
impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::StoreFailure(err.to_string())
    }
}

/// Convert `serde_json::Error` to `AppError`.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("Invalid JSON body: {}", err))
    }
}

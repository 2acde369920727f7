//! # Chat Handler Utilities

use crate::chat::ChatError;
use axum::body::Bytes;
use serde::de::DeserializeOwned;

/// Parse a JSON request body, mapping any failure to a `400`.
///
/// Bodies are taken as raw bytes so a malformed payload gets the same JSON
/// error shape as every other failure.
pub fn parse_json_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ChatError> {
    serde_json::from_slice(body).map_err(|e| ChatError::InvalidInput(format!("Invalid JSON body: {}", e)))
}

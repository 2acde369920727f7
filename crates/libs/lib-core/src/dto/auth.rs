//! # Authentication Data Transfer Objects
//!
//! ## Endpoints Using These DTOs
//!
//! - `POST /auth/register` - [`RegisterRequest`] -> [`RegisterResponse`]
//! - `POST /auth/login` - [`LoginRequest`] -> [`LoginResponse`]
//!
//! ```text
//! POST /auth/register
//! Content-Type: application/json
//!
//! { "email": "alice@example.com", "password": "MyPassword123!" }
//! ```
//!
//! Response (`201 Created`):
//! ```text
//! { "message": "User created successfully", "userId": 1 }
//! ```

use serde::{Deserialize, Serialize};

/// Registration body. Missing fields deserialize as empty and are rejected by the handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user_id: i64,
}

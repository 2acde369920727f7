//! # JWT Token Management
//!
//! Token issuance for the login/register endpoints and bearer-credential
//! verification for every protected request.
//!
//! Verification goes through [`TokenValidator`], built once at startup from the
//! configured secret. It holds only the immutable decoding key, so a single
//! instance is shared behind an `Arc` by all requests.

use chrono::Duration;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use lib_utils::now_utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JWT Claims structure containing user authentication information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Email the account was registered with
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    pub iat: i64,
}

/// Bearer credential verification failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No `Authorization` value, or not of the form `Bearer <token>` (scheme case-insensitive).
    #[error("Authentication token missing")]
    MissingCredential,

    /// Bad signature, malformed payload, or expired token.
    #[error("Invalid or expired token: {0}")]
    InvalidCredential(String),
}

/// Encode a JWT token with user claims.
pub fn encode_jwt(
    user_id: i64,
    email: String,
    secret: &str,
    expiration_hours: i64,
) -> Result<String, String> {
    let now = now_utc();
    let exp = now + Duration::hours(expiration_hours);

    let claims = Claims {
        sub: user_id.to_string(),
        email,
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| format!("Failed to encode JWT: {}", e))
}

/// Verifies `Authorization: Bearer <token>` values and resolves the owning user id.
#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    /// Build a validator from the process-wide signing secret.
    pub fn new(secret: &str) -> Self {
        // Expiry is exact: a token past its `exp` is rejected immediately
        let mut validation = Validation::default();
        validation.leeway = 0;

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Validate a raw `Authorization` header value and return the user id it carries.
    pub fn validate(&self, raw_header: Option<&str>) -> Result<i64, AuthError> {
        let token = raw_header
            .map(str::trim)
            .and_then(strip_bearer_scheme)
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingCredential)?;

        self.validate_token(token)
    }

    /// Validate a bare token (no `Bearer ` prefix), as sent on the websocket query string.
    pub fn validate_token(&self, token: &str) -> Result<i64, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| AuthError::InvalidCredential(e.to_string()))?;

        data.claims
            .sub
            .parse::<i64>()
            .map_err(|_| AuthError::InvalidCredential("subject is not a user id".to_string()))
    }
}

/// Strip the `Bearer` auth scheme, matched ASCII case-insensitively.
fn strip_bearer_scheme(value: &str) -> Option<&str> {
    const SCHEME: &str = "bearer ";
    let prefix = value.get(..SCHEME.len())?;
    prefix
        .eq_ignore_ascii_case(SCHEME)
        .then(|| &value[SCHEME.len()..])
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator").finish_non_exhaustive()
    }
}

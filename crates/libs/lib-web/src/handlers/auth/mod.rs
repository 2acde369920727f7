//! # Authentication Handlers
//!
//! HTTP request handlers for account registration and login.
//!
//! ## Overview
//!
//! - `POST /auth/register` creates an account from an email and password
//! - `POST /auth/login` verifies the password and issues a session token
//!
//! Passwords are hashed with Argon2 before they reach the database. The token
//! returned by login is the bearer credential every chat route expects.
//!
//! ## Example
//!
//! ```rust,ignore
//! use axum::{Router, routing::post};
//! use lib_web::handlers::auth::{register, login};
//!
//! let app = Router::new()
//!     .route("/auth/register", post(register))
//!     .route("/auth/login", post(login));
//! ```

use axum::{
    body::Bytes,
    extract::{Json, State},
    http::StatusCode,
};
use lib_auth::{encode_jwt, hash_password, verify_password};
use lib_core::dto::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use lib_core::model::store::user_repository::UserRepository;
use lib_core::{AppError, Config, DbPool};
use lib_utils::{validate_email, validate_not_empty};
use tracing::{debug, error, info, warn};

#[cfg(test)]
mod tests;

/// Register handler - creates a new user account.
///
/// # Returns
///
/// * `201 Created` with `{ message, userId }`
/// * `400 Bad Request` for a malformed body, missing fields, an invalid email
///   or a password shorter than 8 characters
/// * `409 Conflict` if the email is already registered
pub async fn register(
    State(pool): State<DbPool>,
    body: Bytes,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let req: RegisterRequest = serde_json::from_slice(&body)?;
    let email = req.email.trim().to_string();

    info!("[REGISTER] New registration request");
    debug!("   Email: {}", email);

    if email.is_empty() || req.password.is_empty() {
        warn!("[REGISTER] Missing email or password");
        return Err(AppError::BadRequest("Email and password are required".to_string()));
    }
    validate_email(&email).map_err(AppError::BadRequest)?;

    match UserRepository::find_by_email(&pool, &email).await {
        Ok(Some(_)) => {
            warn!("[REGISTER] Email already registered: {}", email);
            return Err(AppError::Conflict("Email already registered".to_string()));
        }
        Ok(None) => {}
        Err(e) => {
            error!("[REGISTER] Database error checking email: {}", e);
            return Err(AppError::from(e));
        }
    }

    debug!("[REGISTER] Hashing password...");
    let password_hash = hash_password(&req.password).map_err(|e| {
        warn!("[REGISTER] Password rejected: {}", e);
        AppError::BadRequest(e)
    })?;

    let user = UserRepository::create(&pool, &email, &password_hash)
        .await
        .map_err(|e| {
            // Lost a race with a concurrent registration of the same email
            if UserRepository::is_unique_violation(&e) {
                AppError::Conflict("Email already registered".to_string())
            } else {
                error!("[REGISTER] Failed to create user: {}", e);
                AppError::from(e)
            }
        })?;

    info!("[REGISTER] User created, id: {}", user.id);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User created successfully".to_string(),
            user_id: user.id,
        }),
    ))
}

/// Login handler - authenticates an existing user.
///
/// # Returns
///
/// * `200 OK` with `{ token, userId }`
/// * `400 Bad Request` for a malformed body or missing fields
/// * `401 Unauthorized` for an unknown email or wrong password
pub async fn login(
    State(pool): State<DbPool>,
    State(config): State<Config>,
    body: Bytes,
) -> Result<Json<LoginResponse>, AppError> {
    let req: LoginRequest = serde_json::from_slice(&body)?;
    let email = req.email.trim();

    info!("[LOGIN] Login attempt");
    debug!("   Email: {}", email);

    validate_not_empty(email, "email").map_err(AppError::BadRequest)?;
    validate_not_empty(&req.password, "password").map_err(AppError::BadRequest)?;

    let user = match UserRepository::find_by_email(&pool, email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!("[LOGIN] Unknown email: {}", email);
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        }
        Err(e) => {
            error!("[LOGIN] Database error: {}", e);
            return Err(AppError::from(e));
        }
    };

    let is_valid = verify_password(&req.password, &user.password_hash).map_err(|e| {
        error!("[LOGIN] Password verification error: {}", e);
        AppError::Internal(e)
    })?;

    if !is_valid {
        warn!("[LOGIN] Invalid password for user id: {}", user.id);
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    let token = encode_jwt(
        user.id,
        user.email.clone(),
        &config.jwt_secret,
        config.jwt_expiration_hours,
    )
    .map_err(|e| {
        error!("[LOGIN] JWT encoding failed: {}", e);
        AppError::Internal(e)
    })?;

    info!("[LOGIN] User authenticated, id: {}", user.id);

    Ok(Json(LoginResponse {
        token,
        user_id: user.id,
    }))
}

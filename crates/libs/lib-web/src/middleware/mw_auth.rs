//! # Authentication Middleware
//!
//! Validates the `Authorization: Bearer <token>` header of every chat request
//! before the handler runs.
//!
//! A missing, malformed, tampered or expired credential short-circuits with
//! `401` and a JSON error body. Otherwise the caller's id is inserted into the
//! request extensions as [`CurrentUser`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use axum::{middleware::from_fn_with_state, routing::get, Router};
//! use lib_web::middleware::require_auth;
//!
//! let chat_routes = Router::new()
//!     .route("/messages", get(list_messages))
//!     .route_layer(from_fn_with_state(orchestrator.clone(), require_auth));
//! ```
//!
//! Handlers then extract the caller with `Extension<CurrentUser>`:
//!
//! ```rust,ignore
//! async fn handler(Extension(user): Extension<CurrentUser>) -> String {
//!     format!("Hello, user {}!", user.id)
//! }
//! ```

use crate::chat::ChatOrchestrator;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use lib_core::{AppError, UserId};
use std::sync::Arc;
use tracing::{debug, warn};

/// The authenticated caller of the current request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: UserId,
}

/// Authentication middleware, attached with `from_fn_with_state`.
pub async fn require_auth(
    State(orchestrator): State<Arc<ChatOrchestrator>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // A header that is not valid ASCII is treated as absent
    let raw_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let user_id = orchestrator.authorize(raw_header).map_err(|e| {
        warn!(path = %req.uri().path(), "[AUTH] Request rejected: {}", e);
        AppError::from(e)
    })?;

    debug!("[AUTH] Authenticated user id: {}", user_id);

    req.extensions_mut().insert(CurrentUser { id: user_id });

    Ok(next.run(req).await)
}

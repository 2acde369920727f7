//! # HTTP Request Handlers
//!
//! Handlers that are not part of the chat flow.
//!
//! - **[`auth`]**: account registration and login
//!   - `POST /auth/register` - Create a new account
//!   - `POST /auth/login` - Exchange email/password for a bearer token
//!
//! Chat endpoints live in [`crate::chat::handlers`].
//!
//! ## Error Handling
//!
//! Handlers return `Result<T, AppError>`; [`lib_core::AppError`] renders as
//! `{ "error": <message>, "code": <variant> }` with the matching status.

pub mod auth;

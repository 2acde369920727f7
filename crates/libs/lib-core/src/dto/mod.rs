//! # Data Transfer Objects (DTOs)
//!
//! Request and response bodies of the HTTP and websocket API.
//!
//! - [`auth`] - Registration and login
//! - [`chat`] - Message history, AI completion and chat turns

pub mod auth;
pub mod chat;

pub use auth::*;
pub use chat::*;

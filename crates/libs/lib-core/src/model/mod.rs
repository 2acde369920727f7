//! # Model Layer
//!
//! Entities and the SQLite-backed stores for users and chat messages.

pub mod store;

pub use store::models::{Message, Sender, User, UserId};

//! # Core Library
//!
//! Core models, message/user persistence, configuration, DTOs and the
//! application error type.

pub mod config;
pub mod dto;
pub mod error;
pub mod model;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
pub use model::store::{
    connect_pool, create_pool, run_migrations, DbPool, MessageRepository, MessageStore,
    StoreError, UserRepository,
};
pub use model::{Message, Sender, UserId};

//! # Authentication Library
//!
//! Password hashing, JWT issuance, and bearer-credential verification.

pub mod pwd;
pub mod token;

// Re-export commonly used types
pub use pwd::{hash_password, verify_password};
pub use token::{encode_jwt, AuthError, Claims, TokenValidator};

//! # Application Configuration
//!
//! This module manages application configuration loaded from environment variables.
//! All configuration is validated on startup to fail fast if misconfigured.
//!
//! ## Global Config Access
//!
//! [`init_config()`] loads and validates the configuration once at startup and
//! returns the installed instance on every later call:
//!
//! ```rust,no_run
//! use lib_core::config::init_config;
//!
//! let config = init_config().expect("configuration should be valid");
//! let db_url = &config.database_url;
//! ```

use lib_utils::{get_env, get_env_or, get_env_parse_or};
use std::sync::OnceLock;

/// Default CORS origins for local frontends.
const DEFAULT_ORIGINS: &str = "http://localhost:3000,http://127.0.0.1:3000";

/// Application configuration loaded from environment variables.
#[derive(Clone, Debug)]
pub struct Config {
    /// SQLite database connection URL
    pub database_url: String,

    /// Secret key for JWT token signing and verification
    ///
    /// **Must be at least 32 characters long** for security.
    pub jwt_secret: String,

    /// JWT token validity period in hours
    ///
    /// After this period, users must re-authenticate.
    /// Valid range: 1-720 hours (1 hour to 30 days)
    pub jwt_expiration_hours: i64,

    /// Socket address the HTTP server binds to
    pub bind_address: String,

    /// Origins allowed by the CORS layer
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, String> {
        let database_url = get_env_or("DATABASE_URL", "sqlite:data/chat.db");

        let jwt_secret =
            get_env("JWT_SECRET").map_err(|_| "JWT_SECRET must be set in environment")?;

        let jwt_expiration_hours = get_env_parse_or("JWT_EXPIRATION_HOURS", 24_i64)
            .map_err(|_| "JWT_EXPIRATION_HOURS must be a valid number".to_string())?;

        let bind_address = get_env_or("BIND_ADDRESS", "127.0.0.1:3001");

        let allowed_origins = get_env_or("CORS_ORIGINS", DEFAULT_ORIGINS)
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration_hours,
            bind_address,
            allowed_origins,
        })
    }

    /// Validate configuration values against security and business rules.
    pub fn validate(&self) -> Result<(), String> {
        if self.jwt_secret.len() < 32 {
            return Err("JWT_SECRET must be at least 32 characters long".to_string());
        }

        if self.jwt_expiration_hours < 1 || self.jwt_expiration_hours > 720 {
            return Err("JWT_EXPIRATION_HOURS must be between 1 and 720 (30 days)".to_string());
        }

        if self.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!(
                "BIND_ADDRESS must be a socket address, got '{}'",
                self.bind_address
            ));
        }

        Ok(())
    }
}

/// Global configuration instance (initialized once at startup).
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Initialize the global configuration.
///
/// Idempotent: once a configuration is installed, later calls leave it in
/// place and return `Ok`.
///
/// # Errors
///
/// Returns an error if:
/// - Environment variables are missing or invalid
/// - Configuration validation fails
pub fn init_config() -> Result<&'static Config, String> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }

    let config = Config::from_env()?;
    config.validate()?;

    Ok(CONFIG.get_or_init(|| config))
}

//! Engine configuration loaded from environment variables.

use crate::error::{Error, Result};
use crate::logger::LogLevel;
use std::env;

/// Read an environment variable and parse it, falling back to a default on missing or invalid values.
fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Minimum level echoed to the console channel
    pub console_log_level: LogLevel,

    /// Minimum level persisted to the database log channel
    pub db_log_level: LogLevel,

    /// Enable the process-wide shared permission cache
    pub shared_cache: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| Error::Config("DATABASE_URL not set".into()))?,
            console_log_level: env_parse("ROLE_MANAGER_CONSOLE_LOG_LEVEL", LogLevel::Warning),
            db_log_level: env_parse("ROLE_MANAGER_DB_LOG_LEVEL", LogLevel::Error),
            shared_cache: matches!(
                env::var("ROLE_MANAGER_SHARED_CACHE").as_deref(),
                Err(_) | Ok("true" | "1")
            ),
        })
    }
}

//! Two-channel logger.
//!
//! Console output goes through `tracing` (the embedding application owns the
//! subscriber and its stderr writer); database output is appended to the
//! `role_manager_logs` table. Each channel filters independently by level.
//! A failed database write must never propagate.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};

use crate::error::{Error, Result};

/// Log severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Fatal,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Notice => "notice",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
            LogLevel::Alert => "alert",
            LogLevel::Fatal => "fatal",
        }
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "notice" => Ok(LogLevel::Notice),
            "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "critical" => Ok(LogLevel::Critical),
            "alert" => Ok(LogLevel::Alert),
            "fatal" => Ok(LogLevel::Fatal),
            other => Err(Error::Validation(format!("unknown log level '{other}'"))),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted log entry
#[derive(Debug, Clone, FromRow)]
pub struct LogEntry {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub level: String,
    pub message: String,
    pub context: Option<JsonValue>,
}

/// Two-channel logger with independently adjustable thresholds.
pub struct Logger {
    db: PgPool,
    console_level: RwLock<LogLevel>,
    db_level: RwLock<LogLevel>,
}

impl Logger {
    pub fn new(db: PgPool, console_level: LogLevel, db_level: LogLevel) -> Self {
        Self {
            db,
            console_level: RwLock::new(console_level),
            db_level: RwLock::new(db_level),
        }
    }

    pub fn set_console_level(&self, level: LogLevel) {
        *self.console_level.write() = level;
    }

    pub fn set_db_level(&self, level: LogLevel) {
        *self.db_level.write() = level;
    }

    pub fn console_level(&self) -> LogLevel {
        *self.console_level.read()
    }

    pub fn db_level(&self) -> LogLevel {
        *self.db_level.read()
    }

    /// Emit `message` at `level`. `force_db` bypasses the database-channel
    /// threshold (the console threshold still applies).
    pub async fn log(
        &self,
        level: LogLevel,
        message: &str,
        context: Option<JsonValue>,
        force_db: bool,
    ) {
        if level >= self.console_level() {
            emit_console(level, message, context.as_ref());
        }

        if force_db || level >= self.db_level() {
            let result = sqlx::query(
                "INSERT INTO role_manager_logs (level, message, context) VALUES ($1, $2, $3)",
            )
            .bind(level.as_str())
            .bind(message)
            .bind(&context)
            .execute(&self.db)
            .await;

            if let Err(e) = result {
                tracing::error!("Failed to persist log entry ({level}): {e}");
            }
        }
    }

    pub async fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message, None, false).await;
    }

    pub async fn info(&self, message: &str) {
        self.log(LogLevel::Info, message, None, false).await;
    }

    pub async fn notice(&self, message: &str) {
        self.log(LogLevel::Notice, message, None, false).await;
    }

    pub async fn warning(&self, message: &str) {
        self.log(LogLevel::Warning, message, None, false).await;
    }

    pub async fn error(&self, message: &str) {
        self.log(LogLevel::Error, message, None, false).await;
    }

    pub async fn critical(&self, message: &str) {
        self.log(LogLevel::Critical, message, None, false).await;
    }

    pub async fn alert(&self, message: &str) {
        self.log(LogLevel::Alert, message, None, false).await;
    }

    pub async fn fatal(&self, message: &str) {
        self.log(LogLevel::Fatal, message, None, false).await;
    }

    /// Newest persisted entries, for diagnostics.
    pub async fn recent(&self, limit: i64) -> Result<Vec<LogEntry>> {
        sqlx::query_as(
            r#"
            SELECT id, created_at, level, message, context
            FROM role_manager_logs
            ORDER BY id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }
}

fn emit_console(level: LogLevel, message: &str, context: Option<&JsonValue>) {
    match (level, context) {
        (LogLevel::Debug, None) => tracing::debug!("{message}"),
        (LogLevel::Debug, Some(ctx)) => tracing::debug!(context = %ctx, "{message}"),
        (LogLevel::Info | LogLevel::Notice, None) => tracing::info!("{message}"),
        (LogLevel::Info | LogLevel::Notice, Some(ctx)) => {
            tracing::info!(context = %ctx, "{message}")
        }
        (LogLevel::Warning, None) => tracing::warn!("{message}"),
        (LogLevel::Warning, Some(ctx)) => tracing::warn!(context = %ctx, "{message}"),
        (_, None) => tracing::error!(level = %level, "{message}"),
        (_, Some(ctx)) => tracing::error!(level = %level, context = %ctx, "{message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Notice);
        assert!(LogLevel::Notice < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Critical);
        assert!(LogLevel::Critical < LogLevel::Alert);
        assert!(LogLevel::Alert < LogLevel::Fatal);
    }

    #[test]
    fn test_level_from_str_roundtrip() {
        for level in [
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Notice,
            LogLevel::Warning,
            LogLevel::Error,
            LogLevel::Critical,
            LogLevel::Alert,
            LogLevel::Fatal,
        ] {
            assert_eq!(level.as_str().parse::<LogLevel>().unwrap(), level);
        }
    }

    #[test]
    fn test_level_from_str_case_insensitive() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("Fatal".parse::<LogLevel>().unwrap(), LogLevel::Fatal);
    }

    #[test]
    fn test_level_from_str_rejects_unknown() {
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_threshold_semantics() {
        // A channel set to `warning` passes warning and above only.
        let threshold = LogLevel::Warning;
        assert!(LogLevel::Warning >= threshold);
        assert!(LogLevel::Fatal >= threshold);
        assert!(LogLevel::Notice < threshold);
    }
}

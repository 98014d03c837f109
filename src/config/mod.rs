use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub session: SessionConfig,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Session behavior configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Append an auto-save commit on every persisted mutation.
    pub auto_commit: bool,
    /// Integrity penalty applied per prediction amendment (0-100).
    pub amendment_penalty: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/sessions.db".to_string()),
            ),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let session = SessionConfig {
            auto_commit: env::var("AUTO_COMMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
            amendment_penalty: env::var("AMENDMENT_PENALTY")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|p: u32| p.min(100))
                .unwrap_or(15),
        };

        Ok(Config {
            database,
            logging,
            session,
        })
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_commit: true,
            amendment_penalty: 15,
        }
    }
}

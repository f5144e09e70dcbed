//! services/api/src/config.rs
//!
//! Environment-driven settings for the consultation service: listener, database,
//! logging, the frontend origin allowed by CORS, and the advisory models.

use std::net::SocketAddr;
use tracing::Level;

/// Why a setting could not be read.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Settings read once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub db_max_connections: u32,
    pub log_level: Level,
    pub frontend_url: String,
    /// Without a key the advisory features fail and every caller degrades.
    pub openai_api_key: Option<String>,
    pub summary_model: String,
    pub suggestion_model: String,
    pub record_model: String,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

impl Config {
    /// Reads the settings from the process environment, loading a local `.env`
    /// first outside of unit tests.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let max_str = var_or("DB_MAX_CONNECTIONS", "5");
        let db_max_connections = max_str.parse::<u32>().map_err(|_| {
            ConfigError::InvalidValue(
                "DB_MAX_CONNECTIONS".to_string(),
                format!("'{}' is not a positive integer", max_str),
            )
        })?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let frontend_url = var_or("FRONTEND_URL", "http://localhost:5173");

        // --- Load AI Settings ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
        let summary_model = var_or("SUMMARY_MODEL", "gpt-4-turbo");
        let suggestion_model = var_or("SUGGESTION_MODEL", "gpt-3.5-turbo");
        let record_model = var_or("RECORD_MODEL", "gpt-4-turbo");

        Ok(Self {
            bind_address,
            database_url,
            db_max_connections,
            log_level,
            frontend_url,
            openai_api_key,
            summary_model,
            suggestion_model,
            record_model,
        })
    }
}

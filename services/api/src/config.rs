//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use crate::adapters::groq_llm::GROQ_API_BASE;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub cors_origins: Vec<String>,
    pub groq_api_keys: Vec<String>,
    pub groq_api_base: String,
    pub max_requests_per_key: u32,
    pub retry_backoff: Duration,
    pub request_timeout: Duration,
    pub content_model: String,
    pub chat_model: String,
    pub session_retention: chrono::Duration,
    pub chat_history_window: usize,
    pub long_conversation_threshold: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address = parse_var("BIND_ADDRESS", "0.0.0.0:8001")?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origins = split_list(&std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string()));

        // --- Load Groq Credentials ---
        let groq_api_keys = split_list(
            &std::env::var("GROQ_API_KEYS")
                .map_err(|_| ConfigError::MissingVar("GROQ_API_KEYS".to_string()))?,
        );
        if groq_api_keys.is_empty() {
            return Err(ConfigError::InvalidValue(
                "GROQ_API_KEYS".to_string(),
                "at least one key is required".to_string(),
            ));
        }
        let groq_api_base =
            std::env::var("GROQ_API_BASE").unwrap_or_else(|_| GROQ_API_BASE.to_string());

        let max_requests_per_key: u32 = parse_var("MAX_REQUESTS_PER_KEY", "20")?;
        if max_requests_per_key == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_REQUESTS_PER_KEY".to_string(),
                "must be positive".to_string(),
            ));
        }
        let retry_backoff = Duration::from_millis(parse_var("RETRY_BACKOFF_MS", "1000")?);
        let request_timeout_secs: u64 = parse_var("REQUEST_TIMEOUT_SECS", "60")?;
        if request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "REQUEST_TIMEOUT_SECS".to_string(),
                "must be positive".to_string(),
            ));
        }
        let request_timeout = Duration::from_secs(request_timeout_secs);

        // --- Load Model and Conversation Settings ---
        let content_model =
            std::env::var("CONTENT_MODEL").unwrap_or_else(|_| "llama3-8b-8192".to_string());
        let chat_model =
            std::env::var("CHAT_MODEL").unwrap_or_else(|_| "llama3-8b-8192".to_string());
        let session_retention =
            chrono::Duration::minutes(parse_var("SESSION_RETENTION_MINUTES", "120")?);
        let chat_history_window = parse_var("CHAT_HISTORY_WINDOW", "10")?;
        let long_conversation_threshold = parse_var("LONG_CONVERSATION_THRESHOLD", "6")?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            cors_origins,
            groq_api_keys,
            groq_api_base,
            max_requests_per_key,
            retry_backoff,
            request_timeout,
            content_model,
            chat_model,
            session_retention,
            chat_history_window,
            long_conversation_threshold,
        })
    }

    /// True when CORS should accept any origin.
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|origin| origin == "*")
    }
}

fn parse_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 14] = [
        "BIND_ADDRESS",
        "DATABASE_URL",
        "RUST_LOG",
        "CORS_ORIGINS",
        "GROQ_API_KEYS",
        "GROQ_API_BASE",
        "MAX_REQUESTS_PER_KEY",
        "RETRY_BACKOFF_MS",
        "REQUEST_TIMEOUT_SECS",
        "CONTENT_MODEL",
        "CHAT_MODEL",
        "SESSION_RETENTION_MINUTES",
        "CHAT_HISTORY_WINDOW",
        "LONG_CONVERSATION_THRESHOLD",
    ];

    fn reset() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn loads_defaults() {
        reset();
        std::env::set_var("DATABASE_URL", "postgres://localhost/eduforge");
        std::env::set_var("GROQ_API_KEYS", "gsk_one, gsk_two ,,gsk_three");

        let config = Config::from_env().unwrap();
        assert_eq!(config.groq_api_keys, vec!["gsk_one", "gsk_two", "gsk_three"]);
        assert_eq!(config.max_requests_per_key, 20);
        assert_eq!(config.retry_backoff, Duration::from_secs(1));
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.groq_api_base, GROQ_API_BASE);
        assert_eq!(config.content_model, "llama3-8b-8192");
        assert_eq!(config.chat_model, "llama3-8b-8192");
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.session_retention, chrono::Duration::hours(2));
        assert_eq!(config.chat_history_window, 10);
        assert_eq!(config.long_conversation_threshold, 6);
        assert_eq!(config.bind_address.port(), 8001);
        assert!(config.allows_any_origin());
        reset();
    }

    #[test]
    #[serial]
    fn requires_keys() {
        reset();
        std::env::set_var("DATABASE_URL", "postgres://localhost/eduforge");
        assert!(matches!(Config::from_env(), Err(ConfigError::MissingVar(v)) if v == "GROQ_API_KEYS"));

        std::env::set_var("GROQ_API_KEYS", " , ");
        assert!(matches!(Config::from_env(), Err(ConfigError::InvalidValue(v, _)) if v == "GROQ_API_KEYS"));
        reset();
    }

    #[test]
    #[serial]
    fn rejects_zero_and_malformed_limits() {
        reset();
        std::env::set_var("DATABASE_URL", "postgres://localhost/eduforge");
        std::env::set_var("GROQ_API_KEYS", "gsk_one");

        std::env::set_var("MAX_REQUESTS_PER_KEY", "0");
        assert!(Config::from_env().is_err());

        std::env::set_var("MAX_REQUESTS_PER_KEY", "many");
        assert!(Config::from_env().is_err());

        std::env::set_var("MAX_REQUESTS_PER_KEY", "3");
        std::env::set_var("REQUEST_TIMEOUT_SECS", "0");
        assert!(Config::from_env().is_err());

        std::env::set_var("REQUEST_TIMEOUT_SECS", "15");
        std::env::set_var("CORS_ORIGINS", "http://localhost:3000,https://eduforge.app");
        let config = Config::from_env().unwrap();
        assert_eq!(config.max_requests_per_key, 3);
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert!(!config.allows_any_origin());
        assert_eq!(config.cors_origins.len(), 2);
        reset();
    }
}

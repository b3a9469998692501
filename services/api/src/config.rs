//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

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
    pub jwt_secret: String,
    pub cors_origin: String,
    pub openai_api_key: Option<String>,
    pub generation_base_url: Option<String>,
    pub generation: GenerationSettings,
    /// `None` when the inactivity close is disabled.
    pub inactivity_timeout: Option<Duration>,
}

/// The read-only knobs injected into every generation session.
#[derive(Clone, Debug)]
pub struct GenerationSettings {
    pub model: String,
    pub max_faqs: u32,
    pub timeout: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "llama3.2".to_string(),
            max_faqs: 20,
            timeout: Duration::from_secs(120),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Load Server and Database Settings ---
        let bind_address = parse_or(&lookup, "BIND_ADDRESS", "0.0.0.0:8000")?;

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingVar("JWT_SECRET".to_string()))?;

        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        // --- Load Generation Service Settings ---
        let openai_api_key = lookup("OPENAI_API_KEY");
        let generation_base_url = lookup("GENERATION_BASE_URL");
        let defaults = GenerationSettings::default();
        let model = lookup("GENERATION_MODEL").unwrap_or(defaults.model);

        let max_faqs: u32 = parse_or(&lookup, "MAX_FAQS", "20")?;
        if max_faqs == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_FAQS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let timeout_secs: u64 = parse_or(&lookup, "GENERATION_TIMEOUT_SECS", "120")?;

        // --- Load Connection Settings ---
        let inactivity_enabled: bool = parse_or(&lookup, "INACTIVITY_TIMEOUT_ENABLED", "false")?;
        let inactivity_secs: u64 = parse_or(&lookup, "INACTIVITY_TIMEOUT_SECS", "300")?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            jwt_secret,
            cors_origin,
            openai_api_key,
            generation_base_url,
            generation: GenerationSettings {
                model,
                max_faqs,
                timeout: Duration::from_secs(timeout_secs),
            },
            inactivity_timeout: inactivity_enabled.then(|| Duration::from_secs(inactivity_secs)),
        })
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

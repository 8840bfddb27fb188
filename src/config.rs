//! Configuration management for the Travel Advisor.
//!
//! Configuration can be set via environment variables:
//! - `OPENAI_API_KEY` - Required. API key for the chat-completions endpoint.
//! - `OPENAI_ENDPOINT` - Optional. Full chat-completions URL. Defaults to the OpenAI API.
//! - `OPENAI_MODEL` - Optional. Model identifier. Defaults to `gpt-4o-mini`.
//! - `OPENAI_TEMPERATURE` - Optional. Sampling temperature. Defaults to `0.2`.
//! - `OPENWEATHER_API_KEY` - Required. OpenWeatherMap API key.
//! - `INDEX_PATH` - Optional. Path to the prebuilt passage index. Defaults to `data/book_index.json`.
//! - `DATABASE_PATH` - Optional. SQLite database file. Defaults to `data/conversations.db`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `5000`.
//! - `MAX_ITERATIONS` - Optional. Maximum agent reasoning rounds per run. Defaults to `6`.
//! - `HISTORY_WINDOW` - Optional. Number of prior messages handed to the agent. Defaults to `10`.
//! - `TOP_K_RESULTS` - Optional. Passages returned per retrieval. Defaults to `3`.
//! - `TOOL_TIMEOUT_SECS` - Optional. Per-tool-call deadline in seconds. Defaults to `15`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key for the chat-completions endpoint
    pub openai_api_key: String,

    /// Full chat-completions URL
    pub openai_endpoint: String,

    /// Model identifier sent with each chat request
    pub openai_model: String,

    /// Sampling temperature for the reasoning model
    pub openai_temperature: f32,

    /// OpenWeatherMap API key
    pub openweather_api_key: String,

    /// Path to the prebuilt passage index artifact
    pub index_path: PathBuf,

    /// SQLite database file for conversations
    pub database_path: PathBuf,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Maximum reasoning rounds per agent run
    pub max_iterations: usize,

    /// Number of most-recent prior messages handed to the agent
    pub history_window: usize,

    /// Passages returned per retrieval
    pub top_k_results: usize,

    /// Per-tool-call deadline in seconds
    pub tool_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `OPENAI_API_KEY` or
    /// `OPENWEATHER_API_KEY` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))?;

        let openweather_api_key = std::env::var("OPENWEATHER_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENWEATHER_API_KEY".to_string()))?;

        let openai_endpoint = std::env::var("OPENAI_ENDPOINT")
            .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string());

        let openai_model =
            std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let openai_temperature = parse_env("OPENAI_TEMPERATURE", 0.2_f32)?;

        let index_path = std::env::var("INDEX_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data/book_index.json"));

        let database_path = std::env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data/conversations.db"));

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_env("PORT", 5000_u16)?;

        let max_iterations = parse_env("MAX_ITERATIONS", 6_usize)?;
        let history_window = parse_env("HISTORY_WINDOW", 10_usize)?;
        let top_k_results = parse_env("TOP_K_RESULTS", 3_usize)?;
        let tool_timeout_secs = parse_env("TOOL_TIMEOUT_SECS", 15_u64)?;

        Ok(Self {
            openai_api_key,
            openai_endpoint,
            openai_model,
            openai_temperature,
            openweather_api_key,
            index_path,
            database_path,
            host,
            port,
            max_iterations,
            history_window,
            top_k_results,
            tool_timeout_secs,
        })
    }

    /// Create a config with custom keys and defaults elsewhere (useful for testing).
    pub fn new(openai_api_key: String, openweather_api_key: String) -> Self {
        Self {
            openai_api_key,
            openai_endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            openai_temperature: 0.2,
            openweather_api_key,
            index_path: PathBuf::from("data/book_index.json"),
            database_path: PathBuf::from("data/conversations.db"),
            host: "127.0.0.1".to_string(),
            port: 5000,
            max_iterations: 6,
            history_window: 10,
            top_k_results: 3,
            tool_timeout_secs: 15,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}

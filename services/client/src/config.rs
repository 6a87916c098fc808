use chatrelay_core::{TurnTakingConfig, llm_client::SamplingParams};
use secrecy::SecretString;
use std::{path::PathBuf, str::FromStr, time::Duration};
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all client configuration loaded from the environment at startup.
#[derive(Debug)]
pub struct Config {
    pub relay_uri: String,
    pub openai_api_key: Option<SecretString>,
    pub openai_api_base: String,
    pub chat_model: String,
    pub sampling: SamplingParams,
    pub turn_taking: TurnTakingConfig,
    pub prompts_path: PathBuf,
    /// Use the keyword classifier and canned replies instead of a model.
    pub offline: bool,
    pub log_level: Level,
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let relay_uri =
            std::env::var("RELAY_URI").unwrap_or_else(|_| "ws://localhost:8765/ws".to_string());
        // The relay only serves plain WebSocket; the client is built without TLS.
        if !relay_uri.starts_with("ws://") {
            return Err(ConfigError::InvalidValue(
                "RELAY_URI".to_string(),
                format!("'{}' is not a ws:// URI", relay_uri),
            ));
        }

        let openai_api_key = std::env::var("OPENAI_API_KEY").ok().map(SecretString::from);
        let openai_api_base = std::env::var("OPENAI_API_BASE")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let chat_model =
            std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".to_string());

        let defaults = SamplingParams::default();
        let sampling = SamplingParams {
            temperature: parse_var("TEMPERATURE", defaults.temperature)?,
            max_tokens: parse_var("MAX_TOKENS", defaults.max_tokens)?,
        };

        let turn_defaults = TurnTakingConfig::default();
        let idle_threshold_ms =
            parse_var("IDLE_THRESHOLD_MS", turn_defaults.idle_threshold.as_millis() as u64)?;
        let tick_interval_ms =
            parse_var("TICK_INTERVAL_MS", turn_defaults.tick_interval.as_millis() as u64)?;
        if tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "TICK_INTERVAL_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let turn_taking = TurnTakingConfig {
            idle_threshold: Duration::from_millis(idle_threshold_ms),
            tick_interval: Duration::from_millis(tick_interval_ms),
            history_window: parse_var("HISTORY_WINDOW", turn_defaults.history_window)?,
        };

        let prompts_path = std::env::var("PROMPTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./prompts"));
        let offline = parse_var("OFFLINE", false)?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            relay_uri,
            openai_api_key,
            openai_api_base,
            chat_model,
            sampling,
            turn_taking,
            prompts_path,
            offline,
            log_level,
        })
    }

    /// The API key, required whenever the bot talks to a real model.
    pub fn require_api_key(&self) -> Result<&SecretString, ConfigError> {
        self.openai_api_key.as_ref().ok_or_else(|| {
            ConfigError::MissingVar("OPENAI_API_KEY must be set unless OFFLINE=true".to_string())
        })
    }
}

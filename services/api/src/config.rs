use improv_core::scenario::ScenarioOrder;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Defines the supported backend providers for the language model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Gemini,
}

/// Where new games get their scenario pool from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScenarioSourceKind {
    /// The built-in list, or `SCENARIOS_PATH` when set.
    Static,
    /// A fresh list from the language model for every game.
    Llm,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub provider: Provider,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub chat_model: String,
    pub log_level: Level,
    pub prompts_path: PathBuf,
    pub max_rounds: usize,
    pub scenario_order: ScenarioOrder,
    pub scenario_source: ScenarioSourceKind,
    pub scenarios_path: Option<PathBuf>,
    pub scenario_count: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let provider_str = std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "gemini" => Provider::Gemini,
            _ => Provider::OpenAI,
        };

        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let gemini_api_key = std::env::var("GEMINI_API_KEY").ok();

        let chat_model = std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = std::env::var("PROMPTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./prompts"));

        let max_rounds = parse_count("MAX_ROUNDS", improv_core::session::DEFAULT_MAX_ROUNDS)?;
        if max_rounds == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_ROUNDS".to_string(),
                "a game needs at least one round".to_string(),
            ));
        }

        let scenario_order = std::env::var("SCENARIO_ORDER")
            .unwrap_or_else(|_| "shuffled".to_string())
            .parse::<ScenarioOrder>()
            .map_err(|e| ConfigError::InvalidValue("SCENARIO_ORDER".to_string(), e))?;

        let source_str = std::env::var("SCENARIO_SOURCE").unwrap_or_else(|_| "static".to_string());
        let scenario_source = match source_str.to_lowercase().as_str() {
            "static" => ScenarioSourceKind::Static,
            "llm" => ScenarioSourceKind::Llm,
            other => {
                return Err(ConfigError::InvalidValue(
                    "SCENARIO_SOURCE".to_string(),
                    format!("'{}' is not one of 'static' or 'llm'", other),
                ));
            }
        };

        let scenarios_path = std::env::var("SCENARIOS_PATH").ok().map(PathBuf::from);

        let scenario_count = parse_count("SCENARIO_COUNT", 6)?;
        if scenario_count < max_rounds {
            return Err(ConfigError::InvalidValue(
                "SCENARIO_COUNT".to_string(),
                format!("must be at least MAX_ROUNDS ({})", max_rounds),
            ));
        }

        match provider {
            Provider::OpenAI => {
                if openai_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "OPENAI_API_KEY must be set for 'openai' provider".to_string(),
                    ));
                }
            }
            Provider::Gemini => {
                if gemini_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "GEMINI_API_KEY must be set for 'gemini' provider".to_string(),
                    ));
                }
            }
        }

        Ok(Self {
            bind_address,
            database_url,
            provider,
            openai_api_key,
            gemini_api_key,
            chat_model,
            log_level,
            prompts_path,
            max_rounds,
            scenario_order,
            scenario_source,
            scenarios_path,
            scenario_count,
        })
    }

    /// The API key of the configured provider.
    pub fn api_key(&self) -> Option<&str> {
        match self.provider {
            Provider::OpenAI => self.openai_api_key.as_deref(),
            Provider::Gemini => self.gemini_api_key.as_deref(),
        }
    }
}

fn parse_count(var: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value.trim().parse::<usize>().map_err(|_| {
            ConfigError::InvalidValue(
                var.to_string(),
                format!("'{}' is not a non-negative integer", value),
            )
        }),
        Err(_) => Ok(default),
    }
}

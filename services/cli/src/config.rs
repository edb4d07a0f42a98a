use async_openai::config::OpenAIConfig;
use deckgen_core::deck::DEFAULT_OUTPUT_DIR;
use deckgen_core::illustration::parse_image_size;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub openai_api_base: String,
    /// Model for slide titles and bodies.
    pub chat_model: String,
    /// Model for the single-shot function-calling chat.
    pub function_model: String,
    /// Model behind the assistant run.
    pub assistant_model: String,
    pub image_model: String,
    pub image_size: String,
    pub output_dir: PathBuf,
    pub poll_interval: Duration,
    /// `None` lets a run be polled forever.
    pub run_timeout: Option<Duration>,
    pub log_level: Level,
    pub prompts_path: Option<PathBuf>,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_secs(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value.trim().parse::<u64>().map_err(|_| {
            ConfigError::InvalidValue(
                name.to_string(),
                format!("'{}' is not a whole number of seconds", value),
            )
        }),
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

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        let openai_api_base = var_or("OPENAI_API_BASE", "https://api.openai.com/v1");

        let chat_model = var_or("CHAT_MODEL", "gpt-3.5-turbo");
        let function_model = var_or("FUNCTION_MODEL", "gpt-3.5-turbo-0613");
        let assistant_model = var_or("ASSISTANT_MODEL", "gpt-4-1106-preview");
        let image_model = var_or("IMAGE_MODEL", "dall-e-2");

        let image_size = var_or("IMAGE_SIZE", "256x256");
        if parse_image_size(&image_size).is_none() {
            return Err(ConfigError::InvalidValue(
                "IMAGE_SIZE".to_string(),
                format!("'{}' is not a supported resolution", image_size),
            ));
        }

        let output_dir = PathBuf::from(var_or("OUTPUT_DIR", DEFAULT_OUTPUT_DIR));

        let poll_secs = parse_secs("POLL_INTERVAL_SECS", 5)?;
        if poll_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "POLL_INTERVAL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let poll_interval = Duration::from_secs(poll_secs);

        let run_timeout = match parse_secs("RUN_TIMEOUT_SECS", 900)? {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = std::env::var("PROMPTS_PATH").ok().map(PathBuf::from);

        Ok(Self {
            openai_api_key,
            openai_api_base,
            chat_model,
            function_model,
            assistant_model,
            image_model,
            image_size,
            output_dir,
            poll_interval,
            run_timeout,
            log_level,
            prompts_path,
        })
    }

    /// Client configuration for every OpenAI-backed service.
    ///
    /// Fails if no API key is configured.
    pub fn openai_config(&self) -> Result<OpenAIConfig, ConfigError> {
        let api_key = self.openai_api_key.as_ref().ok_or_else(|| {
            ConfigError::MissingVar("OPENAI_API_KEY must be set to call the API".to_string())
        })?;
        Ok(OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(&self.openai_api_base))
    }
}

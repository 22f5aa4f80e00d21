use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use validator::Validate;

/// Main configuration for the journal companion service
#[derive(Debug, Deserialize, Validate, Clone)]
pub struct Config {
    /// HTTP server port
    #[validate(range(min = 1024, max = 65535))]
    pub server_port: u16,

    /// Database URL (SeaORM / SQLite)
    #[validate(length(min = 1))]
    pub database_url: String,

    /// Maximum database connections
    #[validate(range(min = 1, max = 100))]
    pub max_connections: u32,

    /// Ollama base URL
    #[validate(url)]
    pub ollama_url: String,

    /// Chat model used for replies, reflections and summaries
    #[validate(length(min = 1))]
    pub completion_model: String,

    /// Per-call deadline for the completion service
    #[validate(range(min = 1, max = 600))]
    pub completion_timeout_secs: u64,

    /// Log level (e.g., info, debug, trace)
    pub log_level: String,

    /// Generate last month's summary in the background while assembling context
    pub summarization_enabled: bool,

    /// User assumed when a request carries no `x-user-id` header
    #[validate(length(min = 1))]
    pub default_user_id: String,

    /// Conversation turns sent with each completion
    #[validate(range(min = 1, max = 200))]
    pub max_history_messages: u32,

    pub cors_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 8080,
            database_url: "sqlite://journal.db".to_string(),
            max_connections: 10,
            ollama_url: "http://localhost:11434".to_string(),
            completion_model: "llama3.1:8b".to_string(),
            completion_timeout_secs: 60,
            log_level: "info".to_string(),
            summarization_enabled: true,
            default_user_id: "local".to_string(),
            max_history_messages: 20,
            cors_enabled: true,
        }
    }
}

impl Config {
    /// Defaults, then `~/.journal-companion/config` (or `path`), then
    /// `JOURNAL__*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let defaults = Config::default();
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(&format!(
                "{}/.journal-companion/config",
                std::env::var("HOME").unwrap_or_else(|_| ".".to_string())
            ))
            .required(false),
        };

        let settings = config::Config::builder()
            .set_default("server_port", defaults.server_port)?
            .set_default("database_url", defaults.database_url)?
            .set_default("max_connections", defaults.max_connections)?
            .set_default("ollama_url", defaults.ollama_url)?
            .set_default("completion_model", defaults.completion_model)?
            .set_default("completion_timeout_secs", defaults.completion_timeout_secs)?
            .set_default("log_level", defaults.log_level)?
            .set_default("summarization_enabled", defaults.summarization_enabled)?
            .set_default("default_user_id", defaults.default_user_id)?
            .set_default("max_history_messages", defaults.max_history_messages)?
            .set_default("cors_enabled", defaults.cors_enabled)?
            .add_source(file)
            // Environment overrides: JOURNAL__SERVER_PORT, JOURNAL__OLLAMA_URL, etc.
            .add_source(
                config::Environment::with_prefix("JOURNAL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Config = settings.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.completion_timeout_secs)
    }
}

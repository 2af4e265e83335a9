use agent::ConfirmationMode;
use proto::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the per-user directory under `$HOME`.
pub const APP_DIR: &str = ".toolgate";

/// Known OpenAI-compatible endpoints.
///
/// Each preset supplies a base URL and a default model so users only have to
/// specify what differs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderPreset {
    /// OpenAI API (api.openai.com). Default.
    #[default]
    OpenAi,
    /// Local Ollama instance, no API key needed.
    Ollama,
    /// OpenRouter aggregator.
    OpenRouter,
    /// Fully custom: set `base_url` and `model` manually.
    Custom,
}

impl ProviderPreset {
    pub fn name(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
            Self::OpenRouter => "openrouter",
            Self::Custom => "custom",
        }
    }

    pub fn base_url(self) -> Option<&'static str> {
        match self {
            Self::OpenAi | Self::Custom => None,
            Self::Ollama => Some("http://localhost:11434/v1"),
            Self::OpenRouter => Some("https://openrouter.ai/api/v1"),
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi | Self::Custom => "gpt-4o",
            Self::Ollama => "llama3.2",
            Self::OpenRouter => "openai/gpt-4o",
        }
    }

    /// Whether requests can be made without an API key.
    pub fn needs_api_key(self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

impl std::str::FromStr for ProviderPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            "openrouter" => Ok(Self::OpenRouter),
            "custom" => Ok(Self::Custom),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}

/// Top-level CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Agent provider/model configuration.
    #[serde(default)]
    pub agent: AgentConfig,

    /// When the agent must ask before running tools.
    #[serde(default)]
    pub confirmation: ConfirmationConfig,

    /// Built-in tool locations.
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
}

const DEFAULT_MAX_TOOL_ROUNDS: usize = 25;

fn default_max_tool_rounds() -> usize {
    DEFAULT_MAX_TOOL_ROUNDS
}

fn home_dir() -> String {
    std::env::var("HOME").unwrap_or_else(|_| ".".to_string())
}

/// Agent model/provider config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Provider preset: openai | ollama | openrouter | custom.
    #[serde(default)]
    pub provider: ProviderPreset,
    /// Model ID. Leave empty (or omit) to use the preset default.
    #[serde(default)]
    pub model: String,
    /// API key (env overrides applied at load time; see `Config::load`).
    #[serde(default)]
    pub api_key: String,
    /// Maximum tool-call rounds per request before bailing out.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    /// Explicit API base URL. Overrides the preset URL when non-empty.
    pub base_url: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: ProviderPreset::default(),
            model: String::new(),
            api_key: String::new(),
            max_tool_rounds: default_max_tool_rounds(),
            base_url: None,
        }
    }
}

impl AgentConfig {
    /// Returns the effective model ID.
    /// Falls back to the preset default when `model` is empty.
    pub fn effective_model(&self) -> &str {
        if self.model.is_empty() {
            self.provider.default_model()
        } else {
            &self.model
        }
    }

    /// Returns the effective API base URL.
    /// Priority: explicit `base_url` field > preset URL > `None`.
    pub fn effective_base_url(&self) -> Option<&str> {
        if let Some(url) = &self.base_url
            && !url.is_empty()
        {
            return Some(url.as_str());
        }
        self.provider.base_url()
    }
}

/// Confirmation gating rules.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfirmationConfig {
    /// sensitive | always | never
    #[serde(default)]
    pub mode: ConfirmationMode,
    /// Tools to treat as sensitive in addition to those that declare it.
    #[serde(default)]
    pub extra_sensitive: Vec<String>,
    /// Tools that never require confirmation.
    #[serde(default)]
    pub trusted: Vec<String>,
}

/// Where built-in tools read, delete, and deliver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Root directory for `file.read` / `file.delete`.
    pub workspace: String,
    /// Directory `email.send` writes messages into.
    pub outbox: String,
    /// Sender address stamped on outgoing mail.
    pub from_address: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        let home = home_dir();
        Self {
            workspace: format!("{home}/{APP_DIR}/workspace"),
            outbox: format!("{home}/{APP_DIR}/outbox"),
            from_address: "toolgate@localhost".to_string(),
        }
    }
}

/// Database storage config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path.
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: format!("{}/{APP_DIR}/memory.db", home_dir()),
        }
    }
}

impl Config {
    /// Loads configuration from explicit path, fallback locations, and env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = path.map(|p| p.to_path_buf()).or_else(|| {
            let cwd = std::env::current_dir().ok()?.join("config.toml");
            if cwd.exists() {
                return Some(cwd);
            }
            let home_config = PathBuf::from(std::env::var("HOME").ok()?)
                .join(APP_DIR)
                .join("config.toml");
            home_config.exists().then_some(home_config)
        });
        debug!(path = ?config_path, "Config file resolved");

        let mut config = if let Some(path) = config_path {
            let content = std::fs::read_to_string(&path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(|e| ConfigError::Toml(e.to_string()))?
        } else {
            Config::default()
        };

        if let Ok(key) = std::env::var("TOOLGATE_API_KEY") {
            config.agent.api_key = key;
        }
        if let Ok(model) = std::env::var("TOOLGATE_MODEL") {
            config.agent.model = model;
        }
        if let Ok(url) = std::env::var("TOOLGATE_BASE_URL") {
            config.agent.base_url = Some(url);
        }
        if let Ok(workspace) = std::env::var("TOOLGATE_WORKSPACE") {
            config.tools.workspace = workspace;
        }

        config.validate()?;
        debug!(
            provider = %config.agent.provider.name(),
            model = %config.agent.effective_model(),
            base_url = ?config.agent.effective_base_url(),
            mode = ?config.confirmation.mode,
            "Config loaded"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_tool_rounds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "agent.max_tool_rounds".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.agent.provider == ProviderPreset::Custom && self.agent.effective_base_url().is_none()
        {
            return Err(ConfigError::MissingField("agent.base_url".to_string()));
        }
        Ok(())
    }

    /// Resolves the API key: config / `TOOLGATE_API_KEY`, then `OPENAI_API_KEY`.
    pub fn resolve_api_key(&self) -> String {
        if !self.agent.api_key.is_empty() {
            debug!(source = "config", "API key resolved");
            return self.agent.api_key.clone();
        }
        match std::env::var("OPENAI_API_KEY") {
            Ok(key) => {
                debug!(source = "env", env_var = "OPENAI_API_KEY", "API key resolved");
                key
            }
            Err(_) => String::new(),
        }
    }

    /// Directory holding rolling debug logs.
    pub fn log_dir() -> PathBuf {
        PathBuf::from(home_dir()).join(APP_DIR).join("logs")
    }
}

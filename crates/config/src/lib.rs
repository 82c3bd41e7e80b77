//! Configuration loading, validation, and management for PipeAgent.
//!
//! Loads configuration from `~/.pipeagent/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use pipeagent_core::session::Settings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.pipeagent/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Bearer token for the provider (normally issued by the AI Pipe login)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Provider base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout for provider calls
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Agent loop behavior
    #[serde(default)]
    pub agent: AgentConfig,

    /// Login hand-off
    #[serde(default)]
    pub auth: AuthConfig,

    /// Built-in tool endpoints and sandbox limits
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Model catalog offered by the picker
    #[serde(default = "default_models")]
    pub models: Vec<ModelEntry>,
}

fn default_base_url() -> String {
    "https://aipipe.org/openrouter/v1".into()
}
fn default_model() -> String {
    "openai/gpt-4.1-nano".into()
}
fn default_request_timeout_secs() -> u64 {
    120
}
fn default_true() -> bool {
    true
}

fn default_models() -> Vec<ModelEntry> {
    vec![
        ModelEntry {
            id: "openai/gpt-4.1-nano".into(),
            base_url: Some("https://aipipe.org/openrouter/v1".into()),
        },
        ModelEntry {
            id: "openai/gpt-4.1-mini".into(),
            base_url: Some("https://aipipe.org/openrouter/v1".into()),
        },
        ModelEntry {
            id: "anthropic/claude-sonnet-4".into(),
            base_url: Some("https://aipipe.org/openrouter/v1".into()),
        },
        ModelEntry {
            id: "google/gemini-2.5-flash".into(),
            base_url: Some(
                "https://aipipe.org/geminiv1beta/models/gemini-2.5-flash:generateContent".into(),
            ),
        },
        ModelEntry {
            id: "google/gemini-2.5-pro".into(),
            base_url: Some(
                "https://aipipe.org/geminiv1beta/models/gemini-2.5-pro:generateContent".into(),
            ),
        },
    ]
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("token", &redact(&self.token))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("agent", &self.agent)
            .field("auth", &self.auth)
            .field("tools", &self.tools)
            .field("models", &self.models)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum provider calls per user turn (safety limit)
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Wall-clock budget for a whole user turn
    #[serde(default = "default_turn_timeout_secs")]
    pub turn_timeout_secs: u64,

    /// Greeting appended when a session starts. Empty disables it.
    #[serde(default = "default_greeting")]
    pub greeting: String,

    /// Execute provider-supplied structured tool calls
    #[serde(default)]
    pub dispatch_structured_tool_calls: bool,
}

fn default_max_iterations() -> u32 {
    8
}
fn default_turn_timeout_secs() -> u64 {
    120
}
fn default_greeting() -> String {
    "Hello! How can I help you today?".into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            turn_timeout_secs: default_turn_timeout_secs(),
            greeting: default_greeting(),
            dispatch_structured_tool_calls: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Login page of the token issuer
    #[serde(default = "default_login_url")]
    pub login_url: String,

    /// Where the login page should send the user back to
    #[serde(default = "default_return_to")]
    pub return_to: String,
}

fn default_login_url() -> String {
    "https://aipipe.org/login".into()
}
fn default_return_to() -> String {
    "http://localhost/".into()
}

impl AuthConfig {
    /// The login URL carrying the return target.
    pub fn login_redirect_url(&self) -> String {
        format!(
            "{}?redirect={}",
            self.login_url,
            urlencoding::encode(&self.return_to)
        )
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_url: default_login_url(),
            return_to: default_return_to(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Instant-answer search endpoint
    #[serde(default = "default_search_endpoint")]
    pub search_endpoint: String,

    /// AI Pipe proxy endpoint
    #[serde(default = "default_aipipe_endpoint")]
    pub aipipe_endpoint: String,

    /// HTTP timeout for networked tools
    #[serde(default = "default_tool_timeout_secs")]
    pub timeout_secs: u64,

    /// JavaScript sandbox limits
    #[serde(default)]
    pub js: JsConfig,
}

fn default_search_endpoint() -> String {
    "https://api.duckduckgo.com/".into()
}
fn default_aipipe_endpoint() -> String {
    "https://aipipe-proxy.example.com/api".into()
}
fn default_tool_timeout_secs() -> u64 {
    30
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            search_endpoint: default_search_endpoint(),
            aipipe_endpoint: default_aipipe_endpoint(),
            timeout_secs: default_tool_timeout_secs(),
            js: JsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsConfig {
    /// Capability gate: when false, run_js always fails
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_js_memory_limit")]
    pub memory_limit_bytes: usize,

    #[serde(default = "default_js_stack_limit")]
    pub max_stack_bytes: usize,

    #[serde(default = "default_js_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_js_max_source_len")]
    pub max_source_len: usize,
}

fn default_js_memory_limit() -> usize {
    16 * 1024 * 1024
}
fn default_js_stack_limit() -> usize {
    256 * 1024
}
fn default_js_timeout_ms() -> u64 {
    1_000
}
fn default_js_max_source_len() -> usize {
    16 * 1024
}

impl Default for JsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            memory_limit_bytes: default_js_memory_limit(),
            max_stack_bytes: default_js_stack_limit(),
            timeout_ms: default_js_timeout_ms(),
            max_source_len: default_js_max_source_len(),
        }
    }
}

/// One entry of the model catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,

    /// Base URL to switch to when this model is selected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.pipeagent/config.toml).
    ///
    /// Environment variables override the file:
    /// - `PIPEAGENT_TOKEN`, then `AIPIPE_TOKEN` (only when no token is configured)
    /// - `PIPEAGENT_BASE_URL`
    /// - `PIPEAGENT_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if self.token.is_none() {
            self.token = non_empty("PIPEAGENT_TOKEN").or_else(|| non_empty("AIPIPE_TOKEN"));
        }
        if let Some(base_url) = non_empty("PIPEAGENT_BASE_URL") {
            self.base_url = base_url;
        }
        if let Some(model) = non_empty("PIPEAGENT_MODEL") {
            self.model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".pipeagent")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.base_url.trim();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationError("model must not be empty".into()));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.agent.turn_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "timeouts must be greater than zero".into(),
            ));
        }

        if self.tools.js.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "tools.js.timeout_ms must be greater than zero".into(),
            ));
        }

        if let Some(entry) = self.models.iter().find(|m| m.id.trim().is_empty()) {
            return Err(ConfigError::ValidationError(format!(
                "model catalog entry has an empty id (base_url: {:?})",
                entry.base_url
            )));
        }

        Ok(())
    }

    /// The initial settings for a session.
    pub fn settings(&self) -> Settings {
        Settings::new(&self.base_url, &self.model)
    }

    /// Look up a model in the catalog.
    pub fn find_model(&self, id: &str) -> Option<&ModelEntry> {
        self.models.iter().find(|m| m.id == id.trim())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: default_base_url(),
            model: default_model(),
            request_timeout_secs: default_request_timeout_secs(),
            agent: AgentConfig::default(),
            auth: AuthConfig::default(),
            tools: ToolsConfig::default(),
            models: default_models(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

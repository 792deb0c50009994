//! Assistant Configuration
//!
//! Configuration is resolved in three layers, later layers winning:
//!
//! 1. Built-in defaults ([`AssistantConfig::default`])
//! 2. An optional TOML file (`$XDG_CONFIG_HOME/lounge-assistant/config.toml`
//!    or an explicit path)
//! 3. Environment variables
//!
//! # Environment Variables
//!
//! - `LOUNGE_API_URL`: Base URL of the backend (default: `http://localhost:8000`)
//! - `ASSISTANT_CHAT_PATH`: Path of the streaming chat route (default: `/chat/`)
//! - `ASSISTANT_DATA_PREFIX`: Line prefix of data frames (default: `data:`)
//! - `ASSISTANT_DONE_SENTINEL`: End-of-stream payload (default: `[DONE]`)
//! - `ASSISTANT_TOKEN_FIELD`: JSON field carrying a fragment (default: `token`)
//! - `ASSISTANT_CONNECT_TIMEOUT_SECS`: Connect timeout (default: 10)
//! - `ASSISTANT_IDLE_TIMEOUT_SECS`: Max silence between body chunks, 0 = none (default: 0)
//! - `ASSISTANT_MAX_MESSAGES`: Conversation retention limit, 0 = unlimited (default: 0)
//! - `ASSISTANT_GREETING`: Welcome message seeded into new conversations
//!
//! # Example File
//!
//! ```toml
//! endpoint = "http://lounge.internal:8000"
//! idle_timeout_secs = 60
//! greeting = "Hi! Ask me anything about stock levels."
//!
//! [wire]
//! token_field = "token"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire contract with the text-generation service
///
/// The producer is outside this repository, so the literals are
/// configuration rather than constants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireFormat {
    /// Prefix marking a data line
    pub data_prefix: String,
    /// Payload signalling end-of-stream
    pub done_sentinel: String,
    /// JSON field holding the text fragment
    pub token_field: String,
}

impl Default for WireFormat {
    fn default() -> Self {
        Self {
            data_prefix: "data:".to_string(),
            done_sentinel: "[DONE]".to_string(),
            token_field: "token".to_string(),
        }
    }
}

/// Assistant panel configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Base URL of the backend
    pub endpoint: String,
    /// Path of the streaming chat route
    pub chat_path: String,
    /// Frame literals
    pub wire: WireFormat,
    /// Connect timeout in seconds (0 = none)
    pub connect_timeout_secs: u64,
    /// Maximum silence between body chunks in seconds (0 = wait forever)
    pub idle_timeout_secs: u64,
    /// Conversation retention limit (0 = unlimited)
    pub max_messages: usize,
    /// Welcome message seeded into new conversations
    pub greeting: Option<String>,
    /// Canned questions offered before the first user message
    pub suggestions: Vec<String>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000".to_string(),
            chat_path: "/chat/".to_string(),
            wire: WireFormat::default(),
            connect_timeout_secs: 10,
            idle_timeout_secs: 0,
            max_messages: 0,
            greeting: None,
            suggestions: default_suggestions(),
        }
    }
}

fn default_suggestions() -> Vec<String> {
    [
        "What's running low today?",
        "Will we have enough beer for tonight's peak?",
        "Show me all critical items",
        "What orders were placed today?",
        "Are we ready for the evening peak?",
        "Which liquors need restocking?",
        "Give me a full inventory summary",
        "Override the reorder for champagne",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl AssistantConfig {
    /// Defaults with environment overrides applied
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Full URL of the streaming chat route
    #[must_use]
    pub fn chat_url(&self) -> String {
        let base = self.endpoint.trim_end_matches('/');
        if self.chat_path.starts_with('/') {
            format!("{base}{}", self.chat_path)
        } else {
            format!("{base}/{}", self.chat_path)
        }
    }

    /// Connect timeout, if any
    #[must_use]
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_secs > 0).then(|| Duration::from_secs(self.connect_timeout_secs))
    }

    /// Idle timeout between body chunks, if any
    #[must_use]
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    /// Apply overrides from a variable lookup
    ///
    /// Unparseable numeric values are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LOUNGE_API_URL") {
            self.endpoint = v;
        }
        if let Some(v) = lookup("ASSISTANT_CHAT_PATH") {
            self.chat_path = v;
        }
        if let Some(v) = lookup("ASSISTANT_DATA_PREFIX") {
            self.wire.data_prefix = v;
        }
        if let Some(v) = lookup("ASSISTANT_DONE_SENTINEL") {
            self.wire.done_sentinel = v;
        }
        if let Some(v) = lookup("ASSISTANT_TOKEN_FIELD") {
            self.wire.token_field = v;
        }
        if let Some(v) = parse_var(&lookup, "ASSISTANT_CONNECT_TIMEOUT_SECS") {
            self.connect_timeout_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "ASSISTANT_IDLE_TIMEOUT_SECS") {
            self.idle_timeout_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "ASSISTANT_MAX_MESSAGES") {
            self.max_messages = v;
        }
        if let Some(v) = lookup("ASSISTANT_GREETING") {
            self.greeting = (!v.trim().is_empty()).then_some(v);
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key = key, value = %raw, "Ignoring unparseable config override");
            None
        }
    }
}

/// Errors loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read config {path:?}: {source}")]
    Read {
        /// File that failed
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`AssistantConfig`]
    #[error("invalid config {path:?}: {source}")]
    Parse {
        /// File that failed
        path: PathBuf,
        /// Underlying parse error
        source: toml::de::Error,
    },
}

/// Where the effective configuration came from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigSource {
    /// No file was found; built-in defaults
    Defaults,
    /// Loaded from this file
    File(PathBuf),
}

/// Default config file location
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("lounge-assistant").join("config.toml"))
}

/// Load a config file without environment overrides
///
/// # Errors
///
/// [`ConfigError::Read`] if the file cannot be read, [`ConfigError::Parse`]
/// if it is not valid TOML for [`AssistantConfig`].
pub fn load_config_from_path(path: &Path) -> Result<AssistantConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve the effective configuration
///
/// An explicit `path` must exist. Without one, the default location is used
/// when present. Environment overrides are applied last.
///
/// # Errors
///
/// Any [`ConfigError`] from loading the selected file. A missing default file
/// is not an error.
pub fn load_config(path: Option<&Path>) -> Result<(AssistantConfig, ConfigSource), ConfigError> {
    let (mut config, source) = match path {
        Some(path) => (load_config_from_path(path)?, ConfigSource::File(path.to_path_buf())),
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => (load_config_from_path(&path)?, ConfigSource::File(path)),
            None => (AssistantConfig::default(), ConfigSource::Defaults),
        },
    };

    config.apply_overrides(|key| std::env::var(key).ok());
    tracing::debug!(source = ?source, endpoint = %config.endpoint, "Loaded assistant config");
    Ok((config, source))
}

//! Configuration loading.
//!
//! Settings come from a TOML file; upstream API keys come from the process
//! environment and are captured once at startup in [`Credentials`].

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub suggestions: SuggestionsConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

/// Settings for the pros/cons completion call.
#[derive(Debug, Deserialize, Clone)]
pub struct SuggestionsConfig {
    #[serde(default = "default_openai_base")]
    pub api_base: String,
    #[serde(default = "default_suggestions_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for SuggestionsConfig {
    fn default() -> Self {
        Self {
            api_base: default_openai_base(),
            model: default_suggestions_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_suggestions_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1000
}

/// Settings for the web-search completion call.
#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_search_base")]
    pub api_base: String,
    #[serde(default = "default_search_model")]
    pub model: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_base: default_search_base(),
            model: default_search_model(),
        }
    }
}

fn default_search_base() -> String {
    "https://api.perplexity.ai".to_string()
}
fn default_search_model() -> String {
    "sonar".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct UpstreamConfig {
    /// Request deadline for upstream calls. Unset means the HTTP client's
    /// own behaviour applies.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// A config pointing at the given database with every other section
    /// defaulted.
    pub fn minimal(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            server: ServerConfig::default(),
            suggestions: SuggestionsConfig::default(),
            search: SearchConfig::default(),
            upstream: UpstreamConfig::default(),
        }
    }
}

/// Upstream API keys, read once when the process starts.
#[derive(Clone, Default)]
pub struct Credentials {
    pub openai_api_key: Option<String>,
    pub search_api_key: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self {
            openai_api_key: non_empty_env("OPENAI_API_KEY"),
            search_api_key: non_empty_env("PERPLEXITY_API_KEY"),
        }
    }
}

// Keys are secrets; keep them out of Debug output and logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "***"))
            .field("search_api_key", &self.search_api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

fn validate(config: &Config) -> Result<()> {
    let s = &config.suggestions;
    if !(0.0..=2.0).contains(&s.temperature) {
        anyhow::bail!("suggestions.temperature must be in [0.0, 2.0]");
    }
    if s.max_tokens == 0 {
        anyhow::bail!("suggestions.max_tokens must be > 0");
    }
    if s.api_base.trim().is_empty() || s.model.trim().is_empty() {
        anyhow::bail!("suggestions.api_base and suggestions.model must not be empty");
    }
    if config.search.api_base.trim().is_empty() || config.search.model.trim().is_empty() {
        anyhow::bail!("search.api_base and search.model must not be empty");
    }
    if config.upstream.timeout_secs == Some(0) {
        anyhow::bail!("upstream.timeout_secs must be > 0 when set");
    }
    Ok(())
}

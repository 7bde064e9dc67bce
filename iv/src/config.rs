//! Interview configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file name looked up in the working and user config directories
const CONFIG_FILE: &str = "interview.yml";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Reference data file locations
    pub data: DataConfig,

    /// Prompt template directory
    pub prompts: PromptsConfig,

    /// Session store behaviour
    pub session: SessionConfig,

    /// Conversation phase rules
    pub conversation: ConversationConfig,

    /// Per-step strategy selection
    pub steps: StepsConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local, then user config
        for path in Self::search_paths() {
            if !path.exists() {
                continue;
            }
            match Self::load_from_file(&path) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Config files tried when no path is given: `./interview.yml`, then
    /// `~/.config/interview/interview.yml`
    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE)];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("interview").join(CONFIG_FILE));
        }
        paths
    }

    /// Read only the log level, before logging is initialized
    ///
    /// Follows the same lookup as [`Config::load`]. Errors are swallowed; the
    /// full load reports them once logging is up.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        match config_path {
            Some(path) => Self::peek(path)?.log_level,
            None => Self::first_readable(&Self::search_paths())?.log_level,
        }
    }

    /// First existing candidate that parses
    fn first_readable(paths: &[PathBuf]) -> Option<Self> {
        paths.iter().filter(|p| p.exists()).find_map(|p| Self::peek(p))
    }

    /// Parse a config file without logging
    fn peek(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        serde_yaml::from_str(&content).ok()
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("anthropic" or "openai")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .map_err(|_| eyre::eyre!("LLM API key not found. Set the {} environment variable.", self.api_key_env))
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 2048,
            timeout_ms: 60_000,
        }
    }
}

/// Reference data file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Qualification table: `[{id, name}]`
    pub qualifications: PathBuf,

    /// License/alias table: `[{label, aliases}]`
    pub licenses: PathBuf,

    /// Tag table: `[{id, name, category?, aliases?}]`
    pub tags: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            qualifications: PathBuf::from("data").join(tagmatch::QUALIFICATIONS_FILE),
            licenses: PathBuf::from("data").join(tagmatch::LICENSES_FILE),
            tags: PathBuf::from("data").join(tagmatch::TAGS_FILE),
        }
    }
}

/// Prompt template directory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Directory holding exactly one `step<N>_*` template per LLM-backed step
    pub dir: PathBuf,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("prompts"),
        }
    }
}

/// Session store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle time after which a session's phase and choice state is evicted (0 = never)
    #[serde(rename = "ttl-secs")]
    pub ttl_secs: u64,

    /// Interval between eviction sweeps
    #[serde(rename = "sweep-secs")]
    pub sweep_secs: u64,
}

impl SessionConfig {
    /// TTL as a duration; `None` disables eviction
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }

    /// Sweep interval, never shorter than one second
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_secs.max(1))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            sweep_secs: 60,
        }
    }
}

/// Conversation phase rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Phrase a deepening reply carries once the answer is detailed enough
    #[serde(rename = "sufficient-marker")]
    pub sufficient_marker: String,

    /// Acknowledgement phrases a deepening reply must not contain
    #[serde(rename = "filler-phrases")]
    pub filler_phrases: Vec<String>,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            sufficient_marker: "[[SUFFICIENT]]".to_string(),
            filler_phrases: vec![
                "なるほど".to_string(),
                "そうなんですね".to_string(),
                "素敵ですね".to_string(),
                "ありがとうございます".to_string(),
            ],
        }
    }
}

/// How the must-have step (4) is handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MustHaveMode {
    /// Full phase conversation with generation, IDs extracted by keywords
    #[default]
    Conversation,
    /// Keyword extraction only, no LLM
    Keywords,
}

/// Per-step strategy selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StepsConfig {
    #[serde(rename = "must-have")]
    pub must_have: MustHaveMode,
}

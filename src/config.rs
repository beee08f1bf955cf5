//! YAML configuration
//!
//! Every section is optional; missing keys fall back to defaults tuned for
//! the story the pipeline was built around.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorygraphConfig {
    pub database: DatabaseConfig,
    pub generator: GeneratorConfig,
    pub chunking: ChunkingConfig,
    pub context: ContextConfig,
    pub retry: RetryConfig,
    pub extraction: ExtractionConfig,
    pub resolver: ResolverConfig,
}

impl StorygraphConfig {
    /// Load and validate configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, else from the default location if a file
    /// exists there, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None => match default_config_path() {
                Some(p) if p.exists() => Self::from_file(p),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunking.min_chars == 0 {
            return Err(ConfigError::Invalid("chunking.min_chars must be > 0".into()));
        }
        if self.context.capacity == 0 {
            return Err(ConfigError::Invalid("context.capacity must be > 0".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be > 0".into()));
        }
        if self.extraction.max_prompt_chars == 0 {
            return Err(ConfigError::Invalid(
                "extraction.max_prompt_chars must be > 0".into(),
            ));
        }
        if self.generator.model.trim().is_empty() {
            return Err(ConfigError::Invalid("generator.model must not be empty".into()));
        }
        Ok(())
    }

    /// Database path: configured, or `<data_dir>/storygraph/storygraph.db`
    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| data_dir().join("storygraph.db"))
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"))
        .join("storygraph")
}

/// `<data_dir>/storygraph/config.yaml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("storygraph").join("config.yaml"))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

/// Chat-completions endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            temperature: 0.3,
            max_tokens: 1024,
            api_key_env: "GROQ_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Pieces are merged until a chunk reaches this size
    pub min_chars: usize,
    /// Upper-bound hint, not enforced
    pub max_chars_hint: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            min_chars: 200,
            max_chars_hint: 1500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub capacity: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self { capacity: 15 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    /// Cooldown after attempt n is `base_delay_secs * n`
    pub base_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub max_prompt_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_prompt_chars: 4000,
        }
    }
}

/// Name canonicalization data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Canonical name to its aliases
    pub aliases: BTreeMap<String, Vec<String>>,
    /// Names that never become entities
    pub blacklist: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        let mut aliases = BTreeMap::new();
        aliases.insert(
            "Little Match Girl".to_string(),
            ["girl", "child", "youngster", "little girl", "match girl"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        aliases.insert(
            "Grandmother".to_string(),
            ["grandmother", "old grandmother", "granny"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );

        let blacklist = [
            "he", "she", "it", "they", "him", "her", "his", "hers", "man", "woman", "person",
            "someone", "nobody",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        Self { aliases, blacklist }
    }
}

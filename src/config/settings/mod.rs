
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::embeddings::EMBEDDING_DIMENSION;

/// Environment variable overriding the data directory
pub const HOME_ENV_VAR: &str = "VAULT_INDEX_HOME";

const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub embedding_dimension: u32,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "all-minilm:latest".to_string(),
            embedding_dimension: EMBEDDING_DIMENSION as u32,
            timeout_secs: 30,
            retry_attempts: 3,
        }
    }
}

/// Which files under the corpus root are documents
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CorpusConfig {
    /// File extensions (without the dot) that are indexed
    pub extensions: Vec<String>,
    /// Entries whose name starts with this prefix are skipped, files and directories alike
    pub hidden_prefix: String,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["md".to_string()],
            hidden_prefix: ".".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub table_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table_name: "notes".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub default_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { default_limit: 10 }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Data directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid document extension: {0:?}")]
    InvalidExtension(String),
    #[error("Hidden prefix cannot be empty")]
    EmptyHiddenPrefix,
    #[error("Invalid table name: {0:?} (letters, digits, '_' and '-' only)")]
    InvalidTableName(String),
    #[error("Invalid default search limit: {0} (must be between 1 and 1000)")]
    InvalidSearchLimit(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Default data directory: `$VAULT_INDEX_HOME`, else `<data dir>/vault-index`
    #[inline]
    pub fn default_base_dir() -> Result<PathBuf, ConfigError> {
        if let Some(home) = env::var_os(HOME_ENV_VAR).filter(|value| !value.is_empty()) {
            return Ok(PathBuf::from(home));
        }

        dirs::data_dir()
            .map(|data| data.join("vault-index"))
            .or_else(|| dirs::home_dir().map(|home| home.join(".vault-index")))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load `config.toml` from `base_dir`, falling back to defaults when absent
    #[inline]
    pub fn load<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let config_path = base_dir.as_ref().join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(Self {
                base_dir: base_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = base_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let base_dir = self.get_base_dir();

        fs::create_dir_all(base_dir)
            .with_context(|| format!("Failed to create data directory: {}", base_dir.display()))?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ollama.validate()?;
        self.corpus.validate()?;
        self.validate_store()?;

        if !(1..=1000).contains(&self.search.default_limit) {
            return Err(ConfigError::InvalidSearchLimit(self.search.default_limit));
        }
        Ok(())
    }

    fn validate_store(&self) -> Result<(), ConfigError> {
        let name = &self.store.table_name;
        let well_formed = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if well_formed {
            Ok(())
        } else {
            Err(ConfigError::InvalidTableName(name.clone()))
        }
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join(CONFIG_FILE_NAME)
    }

    /// Directory holding the LanceDB tables
    #[inline]
    pub fn vector_database_path(&self) -> PathBuf {
        self.get_base_dir().join("lancedb")
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        self.ollama.ollama_url()
    }

    #[inline]
    pub fn embedding_dimension(&self) -> usize {
        self.ollama.embedding_dimension as usize
    }
}

impl OllamaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        self.ollama_url()?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if !(64..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        if !(1..=600).contains(&self.timeout_secs) {
            return Err(ConfigError::InvalidTimeout(self.timeout_secs));
        }

        if !(1..=10).contains(&self.retry_attempts) {
            return Err(ConfigError::InvalidRetryAttempts(self.retry_attempts));
        }

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(())
    }

    pub fn set_embedding_dimension(&mut self, dimension: u32) -> Result<(), ConfigError> {
        if !(64..=4096).contains(&dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(dimension));
        }
        self.embedding_dimension = dimension;
        Ok(())
    }
}

impl CorpusConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hidden_prefix.is_empty() {
            return Err(ConfigError::EmptyHiddenPrefix);
        }

        for ext in &self.extensions {
            if ext.is_empty() || ext.starts_with('.') || ext.contains(['/', '\\']) {
                return Err(ConfigError::InvalidExtension(ext.clone()));
            }
        }
        Ok(())
    }
}

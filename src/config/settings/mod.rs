
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::embeddings::hosted::{
    DEFAULT_API_KEY_ENV, DEFAULT_HOSTED_BASE_URL, DEFAULT_HOSTED_CHAT_MODEL,
    DEFAULT_HOSTED_EMBEDDING_MODEL,
};
use crate::embeddings::ollama::{DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL};

const CONFIG_FILE_NAME: &str = "config.toml";
const INDEX_DIR_NAME: &str = "index";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub hosted: HostedConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Which service produces embeddings and answers
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Ollama,
    Hosted,
}

impl fmt::Display for BackendKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ollama => f.write_str("ollama"),
            Self::Hosted => f.write_str("hosted"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub embedding_model: String,
    pub chat_model: String,
    pub batch_size: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            batch_size: 16,
        }
    }
}

/// OpenAI-compatible hosted provider. The API key itself never lives in the
/// config file, only the name of the environment variable holding it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HostedConfig {
    pub base_url: String,
    pub embedding_model: String,
    pub chat_model: String,
    pub api_key_env: String,
    pub batch_size: u32,
}

impl Default for HostedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_HOSTED_BASE_URL.to_string(),
            embedding_model: DEFAULT_HOSTED_EMBEDDING_MODEL.to_string(),
            chat_model: DEFAULT_HOSTED_CHAT_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            batch_size: 64,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid API key variable name: {0:?} (cannot be empty or contain '=')")]
    InvalidApiKeyEnv(String),
    #[error("Invalid chunk size: {0} (must be greater than 0)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    ChunkOverlapTooLarge(usize, usize),
    #[error("Invalid retrieval count: {0} (must be greater than 0)")]
    InvalidTopK(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// `~/.pdf-rag`, or the platform data directory on Windows when there is
    /// no home directory
    #[inline]
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".pdf-rag"))
            .or({
                #[cfg(windows)]
                {
                    dirs::data_dir().map(|data| data.join("pdf-rag"))
                }
                #[cfg(not(windows))]
                {
                    None
                }
            })
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load `config.toml` from `config_dir`, falling back to defaults when the
    /// file does not exist yet
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ollama.validate()?;
        self.hosted.validate()?;
        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join(CONFIG_FILE_NAME)
    }

    /// Directory holding the persisted vector index
    #[inline]
    pub fn index_dir(&self) -> PathBuf {
        self.get_base_dir().join(INDEX_DIR_NAME)
    }

    #[inline]
    pub fn embedding_model(&self) -> &str {
        match self.backend {
            BackendKind::Ollama => &self.ollama.embedding_model,
            BackendKind::Hosted => &self.hosted.embedding_model,
        }
    }

    #[inline]
    pub fn chat_model(&self) -> &str {
        match self.backend {
            BackendKind::Ollama => &self.ollama.chat_model,
            BackendKind::Hosted => &self.hosted.chat_model,
        }
    }
}

fn validate_model(model: &str) -> Result<(), ConfigError> {
    if model.trim().is_empty() {
        return Err(ConfigError::InvalidModel(model.to_string()));
    }
    Ok(())
}

fn validate_batch_size(batch_size: u32) -> Result<(), ConfigError> {
    if batch_size == 0 || batch_size > 1000 {
        return Err(ConfigError::InvalidBatchSize(batch_size));
    }
    Ok(())
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

        validate_model(&self.embedding_model)?;
        validate_model(&self.chat_model)?;
        validate_batch_size(self.batch_size)?;

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    pub fn set_protocol(&mut self, protocol: String) -> Result<(), ConfigError> {
        if protocol != "http" && protocol != "https" {
            return Err(ConfigError::InvalidProtocol(protocol));
        }
        self.protocol = protocol;
        Ok(())
    }

    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        let temp_config = OllamaConfig {
            host: host.clone(),
            ..self.clone()
        };
        temp_config.ollama_url()?;
        self.host = host;
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }

    pub fn set_embedding_model(&mut self, model: String) -> Result<(), ConfigError> {
        validate_model(&model)?;
        self.embedding_model = model;
        Ok(())
    }

    pub fn set_chat_model(&mut self, model: String) -> Result<(), ConfigError> {
        validate_model(&model)?;
        self.chat_model = model;
        Ok(())
    }

    pub fn set_batch_size(&mut self, batch_size: u32) -> Result<(), ConfigError> {
        validate_batch_size(batch_size)?;
        self.batch_size = batch_size;
        Ok(())
    }
}

impl HostedConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api_url()?;
        validate_model(&self.embedding_model)?;
        validate_model(&self.chat_model)?;
        validate_batch_size(self.batch_size)?;

        if self.api_key_env.trim().is_empty() || self.api_key_env.contains('=') {
            return Err(ConfigError::InvalidApiKeyEnv(self.api_key_env.clone()));
        }

        Ok(())
    }

    /// Base URL with a trailing slash so relative endpoint joins keep the
    /// version prefix, e.g. `https://api.openai.com/v1/`
    pub fn api_url(&self) -> Result<Url, ConfigError> {
        let trimmed = self.base_url.trim().trim_end_matches('/');
        let url = Url::parse(&format!("{}/", trimmed))
            .map_err(|_| ConfigError::InvalidUrl(self.base_url.clone()))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidProtocol(url.scheme().to_string()));
        }

        Ok(url)
    }

    pub fn set_base_url(&mut self, base_url: String) -> Result<(), ConfigError> {
        let temp_config = HostedConfig {
            base_url: base_url.clone(),
            ..self.clone()
        };
        temp_config.api_url()?;
        self.base_url = base_url;
        Ok(())
    }

    pub fn set_embedding_model(&mut self, model: String) -> Result<(), ConfigError> {
        validate_model(&model)?;
        self.embedding_model = model;
        Ok(())
    }

    pub fn set_chat_model(&mut self, model: String) -> Result<(), ConfigError> {
        validate_model(&model)?;
        self.chat_model = model;
        Ok(())
    }

    pub fn set_api_key_env(&mut self, name: String) -> Result<(), ConfigError> {
        if name.trim().is_empty() || name.contains('=') {
            return Err(ConfigError::InvalidApiKeyEnv(name));
        }
        self.api_key_env = name;
        Ok(())
    }
}

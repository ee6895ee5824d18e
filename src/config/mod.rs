use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::llm::ProviderConfig;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "deepseek-r1";
const CONFIG_FILE: &str = "config.json";

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Root directory for chats, logs and the config file
    pub root_dir: PathBuf,

    /// Directory holding session records; `<root>/chats` when unset
    pub chats_dir: Option<PathBuf>,

    /// Base URL of the inference service
    pub base_url: String,

    /// Model to use
    pub model: String,

    /// Whether to stream responses
    pub stream: bool,

    /// Connect timeout for requests to the inference service
    pub request_timeout_secs: Option<u64>,

    /// System message for conversations
    pub system_message: Option<String>,
}

/// Values read from `<root>/config.json`; every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    chats_dir: Option<PathBuf>,
    base_url: Option<String>,
    model: Option<String>,
    stream: Option<bool>,
    request_timeout_secs: Option<u64>,
    system_message: Option<String>,
}

/// Command-line flags that take precedence over everything else
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub model: Option<String>,
    pub host: Option<String>,
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            chats_dir: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            stream: true,
            request_timeout_secs: None,
            system_message: None,
        }
    }
}

fn default_root_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".deepseek-tui")
}

/// `OLLAMA_HOST` is commonly given as a bare `host:port`
fn normalize_host(host: &str) -> String {
    let host = host.trim();
    if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}

impl Config {
    /// Initialize configuration from defaults, the config file, the
    /// environment and finally command-line flags.
    pub async fn init(overrides: &ConfigOverrides) -> Result<Self> {
        debug!("Initializing configuration");

        let mut config = Self::default();
        if let Ok(dir) = std::env::var("DEEPSEEK_TUI_DATA_DIR") {
            config.root_dir = PathBuf::from(dir);
        }
        if let Some(dir) = &overrides.data_dir {
            config.root_dir = dir.clone();
        }

        let path = config.config_file();
        if let Some(file_config) = Self::load_from_file(&path).await? {
            config.merge_with(file_config);
        }

        config.load_from_env();
        config.apply_overrides(overrides);

        debug!(
            root = %config.root_dir.display(),
            model = %config.model,
            base_url = %config.base_url,
            stream = config.stream,
            "Configuration resolved"
        );
        Ok(config)
    }

    /// Location of the optional config file
    pub fn config_file(&self) -> PathBuf {
        self.root_dir.join(CONFIG_FILE)
    }

    /// Directory holding session records
    pub fn chats_path(&self) -> PathBuf {
        self.chats_dir
            .clone()
            .unwrap_or_else(|| self.root_dir.join("chats"))
    }

    /// Directory holding the log file
    pub fn logs_dir(&self) -> PathBuf {
        self.root_dir.join("logs")
    }

    /// Connection settings for the inference client
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            connect_timeout_secs: self.request_timeout_secs,
        }
    }

    /// Load configuration from environment variables
    pub fn load_from_env(&mut self) {
        self.apply_env(|key| std::env::var(key).ok());
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(data_dir) = var("DEEPSEEK_TUI_DATA_DIR") {
            self.root_dir = PathBuf::from(data_dir);
        }

        if let Some(host) = var("OLLAMA_HOST") {
            if !host.trim().is_empty() {
                self.base_url = normalize_host(&host);
            }
        }

        if let Some(model) = var("DEEPSEEK_TUI_MODEL") {
            self.model = model;
        }

        if let Some(stream_str) = var("DEEPSEEK_TUI_STREAM") {
            self.stream = matches!(stream_str.to_lowercase().as_str(), "true" | "1" | "yes");
        }

        if let Some(system_message) = var("DEEPSEEK_TUI_SYSTEM_MESSAGE") {
            self.system_message = Some(system_message);
        }
    }

    async fn load_from_file(path: &Path) -> Result<Option<FileConfig>> {
        if !path.exists() {
            return Ok(None);
        }

        debug!("Loading configuration from: {}", path.display());
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file_config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(Some(file_config))
    }

    fn merge_with(&mut self, other: FileConfig) {
        if other.chats_dir.is_some() {
            self.chats_dir = other.chats_dir;
        }
        if let Some(base_url) = other.base_url {
            self.base_url = base_url;
        }
        if let Some(model) = other.model {
            self.model = model;
        }
        if let Some(stream) = other.stream {
            self.stream = stream;
        }
        if other.request_timeout_secs.is_some() {
            self.request_timeout_secs = other.request_timeout_secs;
        }
        if other.system_message.is_some() {
            self.system_message = other.system_message;
        }
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(model) = &overrides.model {
            self.model = model.clone();
        }
        if let Some(host) = &overrides.host {
            self.base_url = normalize_host(host);
        }
        if let Some(dir) = &overrides.data_dir {
            self.root_dir = dir.clone();
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(anyhow!("Model is required"));
        }

        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(anyhow!(
                "Base URL must start with http:// or https://, got '{}'",
                self.base_url
            ));
        }

        if self.request_timeout_secs == Some(0) {
            return Err(anyhow!("request_timeout_secs must be greater than 0"));
        }

        Ok(())
    }
}

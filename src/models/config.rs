//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Collection;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Which SRU collection to harvest
    #[serde(default)]
    pub collection: Collection,

    /// SRU endpoint and HTTP settings
    #[serde(default)]
    pub sru: SruConfig,

    /// Retry policy for transient fetch failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Record mapping behavior
    #[serde(default)]
    pub mapper: MapperConfig,

    /// Shard layout and sink selection
    #[serde(default)]
    pub output: OutputConfig,

    /// Watermark persistence
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// Remote dataset settings
    #[serde(default)]
    pub upload: UploadConfig,

    /// Per-run limits
    #[serde(default)]
    pub run: RunConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply `HF_TOKEN`, `HF_DATASET_REPO` and `HF_PRIVATE` overrides.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("HF_TOKEN").filter(|t| !t.trim().is_empty()) {
            self.upload.token = Some(token.trim().to_string());
        }
        if let Some(repo) = lookup("HF_DATASET_REPO").filter(|r| !r.trim().is_empty()) {
            self.upload.dataset_repo = repo.trim().to_string();
        }
        if let Some(private) = lookup("HF_PRIVATE") {
            self.upload.private = match private.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                other => {
                    return Err(AppError::config(format!(
                        "HF_PRIVATE must be true or false, got '{other}'"
                    )));
                }
            };
        }
        Ok(())
    }

    /// Effective per-run cap: explicit setting or the collection default.
    pub fn max_records(&self) -> usize {
        self.run
            .max_records
            .unwrap_or_else(|| self.collection.default_max_records())
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.sru.base_url.trim().is_empty() {
            return Err(AppError::config("sru.base_url is empty"));
        }
        url::Url::parse(&self.sru.base_url)?;
        if self.sru.page_size == 0 {
            return Err(AppError::config("sru.page_size must be > 0"));
        }
        if self.sru.timeout_secs == 0 {
            return Err(AppError::config("sru.timeout_secs must be > 0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::config("retry.max_attempts must be > 0"));
        }
        if self.output.shard_max_records == 0 {
            return Err(AppError::config("output.shard_max_records must be > 0"));
        }
        if self.output.shard_max_bytes == 0 {
            return Err(AppError::config("output.shard_max_bytes must be > 0"));
        }
        if self.run.max_records == Some(0) {
            return Err(AppError::config("run.max_records must be > 0"));
        }
        if self.output.sink == SinkKind::Hub {
            if self.upload.token.as_deref().unwrap_or("").is_empty() {
                return Err(AppError::config(
                    "output.sink = \"hub\" requires HF_TOKEN to be set",
                ));
            }
            if !self.upload.dataset_repo.contains('/') {
                return Err(AppError::config(
                    "upload.dataset_repo must be of the form <owner>/<name>",
                ));
            }
        }
        Ok(())
    }
}

/// SRU endpoint and HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SruConfig {
    /// SRU service URL
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Records per request (clamped to the endpoint maximum)
    #[serde(default = "defaults::page_size")]
    pub page_size: usize,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for SruConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            page_size: defaults::page_size(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per request, including the first
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles afterwards
    #[serde(default = "defaults::backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            backoff_ms: defaults::backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapperConfig {
    /// Download the XML manifestation to fill `Content`
    #[serde(default = "defaults::enabled")]
    pub fetch_content: bool,

    /// Replace personal names in `Content` with a placeholder
    #[serde(default = "defaults::enabled")]
    pub scrub_names: bool,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            fetch_content: true,
            scrub_names: true,
        }
    }
}

/// Where closed shards go after they are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Keep shards in `output.data_dir`
    #[default]
    Local,
    /// Commit shards to a Hugging Face dataset repository
    Hub,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory shards are written to
    #[serde(default = "defaults::data_dir")]
    pub data_dir: PathBuf,

    /// Records per shard
    #[serde(default = "defaults::shard_max_records")]
    pub shard_max_records: usize,

    /// Byte size at which a shard is closed early
    #[serde(default = "defaults::shard_max_bytes")]
    pub shard_max_bytes: u64,

    #[serde(default)]
    pub sink: SinkKind,

    /// Keep the local copy after a remote upload
    #[serde(default = "defaults::enabled")]
    pub keep_local: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
            shard_max_records: defaults::shard_max_records(),
            shard_max_bytes: defaults::shard_max_bytes(),
            sink: SinkKind::Local,
            keep_local: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    #[serde(default = "defaults::checkpoint_path")]
    pub path: PathBuf,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            path: defaults::checkpoint_path(),
        }
    }
}

/// Remote dataset settings. The token only ever comes from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// `<owner>/<name>` of the dataset repository
    #[serde(default)]
    pub dataset_repo: String,

    /// Create the repository as private
    #[serde(default)]
    pub private: bool,

    #[serde(default = "defaults::hub_url")]
    pub hub_url: String,

    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dataset_repo: String::new(),
            private: false,
            hub_url: defaults::hub_url(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    /// Per-run record cap; falls back to the collection default
    #[serde(default)]
    pub max_records: Option<usize>,
}

mod defaults {
    use std::path::PathBuf;

    // SRU defaults
    pub fn base_url() -> String {
        "https://repository.overheid.nl/sru".into()
    }
    pub fn page_size() -> usize {
        100
    }
    pub fn user_agent() -> String {
        concat!("sru-harvest/", env!("CARGO_PKG_VERSION")).into()
    }
    pub fn timeout() -> u64 {
        60
    }

    // Retry defaults
    pub fn max_attempts() -> u32 {
        3
    }
    pub fn backoff_ms() -> u64 {
        1000
    }

    pub fn enabled() -> bool {
        true
    }

    // Output defaults
    pub fn data_dir() -> PathBuf {
        PathBuf::from("data")
    }
    pub fn shard_max_records() -> usize {
        1000
    }
    pub fn shard_max_bytes() -> u64 {
        64 * 1024 * 1024
    }

    pub fn checkpoint_path() -> PathBuf {
        PathBuf::from(".last_update")
    }

    pub fn hub_url() -> String {
        "https://huggingface.co".into()
    }
}

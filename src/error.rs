// src/error.rs

//! Unified error handling for the harvester.
//!
//! [`FetchError`] covers the page source and transport, [`MapError`] a single
//! record. [`AppError`] is everything that can end a run.

use std::fmt;

use thiserror::Error;

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built or a request failed outside the retry loop
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Checkpoint file could not be read or interpreted
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Page could not be fetched after retries
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Shard could not be published to its sink
    #[error("Upload error for {shard}: {message}")]
    Upload { shard: String, message: String },

    /// Run stopped after `committed` shards were committed
    #[error("Harvest aborted after {committed} committed shard(s): {source}")]
    Aborted {
        committed: usize,
        #[source]
        source: Box<AppError>,
    },
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a checkpoint error.
    pub fn checkpoint(message: impl Into<String>) -> Self {
        Self::Checkpoint(message.into())
    }

    /// Create an upload error for a shard.
    pub fn upload(shard: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Upload {
            shard: shard.into(),
            message: message.to_string(),
        }
    }

    /// Wrap an error that ended a run.
    pub fn aborted(committed: usize, source: AppError) -> Self {
        Self::Aborted {
            committed,
            source: Box::new(source),
        }
    }
}

/// Whether a failed fetch may succeed when repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Timeout, connection failure or a retryable status (408, 429, 5xx gateway)
    Transient,
    /// Anything else: client errors, malformed payloads, SRU diagnostics
    Fatal,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchErrorKind::Transient => f.write_str("transient"),
            FetchErrorKind::Fatal => f.write_str("fatal"),
        }
    }
}

/// Failure to retrieve a page or document.
#[derive(Error, Debug, Clone)]
#[error("{kind} fetch error: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    /// Create a retryable fetch error.
    pub fn transient(message: impl fmt::Display) -> Self {
        Self {
            kind: FetchErrorKind::Transient,
            message: message.to_string(),
        }
    }

    /// Create a non-retryable fetch error.
    pub fn fatal(message: impl fmt::Display) -> Self {
        Self {
            kind: FetchErrorKind::Fatal,
            message: message.to_string(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == FetchErrorKind::Transient
    }
}

/// Per-record mapping failure. Never ends a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MapError {
    #[error("malformed XML: {0}")]
    MalformedXml(String),

    #[error("record has no identifier")]
    MissingIdentifier,

    #[error("record {0} has no usable URL")]
    MissingLocation(String),

    #[error("content unavailable for {url}: {reason}")]
    ContentUnavailable { url: String, reason: String },
}

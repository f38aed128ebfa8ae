//! Record data structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Checkpoint;

/// One `record` element as returned by the SRU endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// XML text of the record element, untouched
    pub payload: String,

    /// Document URL advertised by the record (`gzd:url`), if any
    pub source: Option<String>,

    /// Modification timestamp used for the watermark
    pub modified: Option<Checkpoint>,

    /// 1-based position within the result set
    pub position: u64,
}

impl RawRecord {
    /// Human-readable handle for log lines.
    pub fn describe(&self) -> String {
        match &self.source {
            Some(url) => format!("#{} ({})", self.position, url),
            None => format!("#{}", self.position),
        }
    }
}

/// A normalized record, one JSONL line.
///
/// Field order is the output column order. Absent metadata is written as
/// `null` so every line has the same keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedRecord {
    /// Location the content was taken from
    #[serde(rename = "URL")]
    pub url: String,

    /// Full text, name-scrubbed
    #[serde(rename = "Content")]
    pub content: String,

    /// Collection label
    #[serde(rename = "Source")]
    pub source: String,

    pub identifier: String,
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub document_type: Option<String>,
    pub creator: Option<String>,
    pub language: Option<String>,
    pub issued: Option<String>,
    pub modified: Option<Checkpoint>,

    /// When the record was mapped
    pub fetched_at: DateTime<Utc>,
}

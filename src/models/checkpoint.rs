//! Watermark types.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Modification timestamp of the last committed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checkpoint(DateTime<Utc>);

impl Checkpoint {
    /// Sentinel for "nothing harvested yet".
    pub const EPOCH: Checkpoint = Checkpoint(DateTime::UNIX_EPOCH);

    pub fn is_epoch(&self) -> bool {
        *self == Self::EPOCH
    }

    /// Parse a timestamp as it appears in SRU metadata or a legacy state file.
    ///
    /// Accepts RFC 3339, naive `YYYY-MM-DDTHH:MM:SS` (taken as UTC) and plain
    /// dates (midnight UTC).
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(Self(dt.with_timezone(&Utc)));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(Self(naive.and_utc()));
        }
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| Self(naive.and_utc()))
    }

    /// RFC 3339 form used in CQL queries and the state file.
    ///
    /// Sub-second digits are kept when present; a truncated bound would sort
    /// below the watermark and re-select committed records.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::EPOCH
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_epoch() {
            f.write_str("epoch")
        } else {
            f.write_str(&self.to_rfc3339())
        }
    }
}

/// Persisted content of the checkpoint file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointState {
    /// Largest modification timestamp among committed records
    pub watermark: Checkpoint,

    /// Wall-clock time of the commit
    pub committed_at: DateTime<Utc>,

    /// Name of the shard whose commit produced this state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard: Option<String>,

    /// Records in that shard
    #[serde(default)]
    pub records: usize,
}

impl CheckpointState {
    pub fn new(watermark: Checkpoint) -> Self {
        Self {
            watermark,
            committed_at: Utc::now(),
            shard: None,
            records: 0,
        }
    }
}

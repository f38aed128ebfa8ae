//! Storage abstractions for shards and the checkpoint.
//!
//! A shard is written locally by [`ShardWriter`] and then committed by a
//! [`ShardSink`]. Only after a sink accepts a shard may the
//! [`CheckpointStore`] move forward.
//!
//! ## Directory Structure
//!
//! ```text
//! {data_dir}/
//! ├── verdragenbank_shard_20250101T120000Z_000.jsonl           # committed
//! └── verdragenbank_shard_20250101T120000Z_001.jsonl.partial   # being written
//! .last_update                                                 # checkpoint
//! ```

pub mod checkpoint;
pub mod hub;
pub mod local;
pub mod shard;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Checkpoint, CheckpointState};

// Re-export for convenience
pub use checkpoint::{FileCheckpointStore, MemoryCheckpointStore};
pub use hub::HubSink;
pub use local::LocalSink;
pub use shard::{ShardWriter, ShardWriterConfig};

/// A finalized shard file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardHandle {
    /// File name, e.g. `tuchtrecht_shard_20250101T120000Z_000.jsonl`
    pub name: String,
    pub path: PathBuf,
    pub record_count: usize,
    pub byte_count: u64,
    /// Largest record timestamp in the shard
    pub max_modified: Option<Checkpoint>,
    /// Hex SHA-256 of the file contents
    pub sha256: String,
}

/// Where a sink put a shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardReceipt {
    pub name: String,
    /// Local path or remote URL
    pub location: String,
    pub record_count: usize,
}

/// Destination for closed shards.
#[async_trait]
pub trait ShardSink: Send + Sync {
    /// Commit a shard. An error means the shard is not committed.
    async fn publish(&self, shard: &ShardHandle) -> Result<ShardReceipt>;
}

/// Persisted watermark.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Last committed state, or `None` if nothing was ever committed.
    async fn load(&self) -> Result<Option<CheckpointState>>;

    /// Replace the persisted state. The last write wins.
    async fn save(&self, state: &CheckpointState) -> Result<()>;

    /// Last committed watermark, epoch when none.
    async fn load_watermark(&self) -> Result<Checkpoint> {
        Ok(self
            .load()
            .await?
            .map(|state| state.watermark)
            .unwrap_or(Checkpoint::EPOCH))
    }
}

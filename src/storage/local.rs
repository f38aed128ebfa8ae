//! Local filesystem sink.
//!
//! The shard writer already leaves a finalized file in the data directory,
//! so committing locally only checks the file is there and intact.

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::storage::{ShardHandle, ShardReceipt, ShardSink};

/// Sink that keeps shards in the data directory.
#[derive(Debug, Clone, Default)]
pub struct LocalSink;

impl LocalSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ShardSink for LocalSink {
    async fn publish(&self, shard: &ShardHandle) -> Result<ShardReceipt> {
        let metadata = tokio::fs::metadata(&shard.path)
            .await
            .map_err(|e| AppError::upload(&shard.name, e))?;

        if metadata.len() != shard.byte_count {
            return Err(AppError::upload(
                &shard.name,
                format!(
                    "expected {} bytes on disk, found {}",
                    shard.byte_count,
                    metadata.len()
                ),
            ));
        }

        log::info!(
            "Committed {} ({} records) to {}",
            shard.name,
            shard.record_count,
            shard.path.display()
        );
        Ok(ShardReceipt {
            name: shard.name.clone(),
            location: shard.path.display().to_string(),
            record_count: shard.record_count,
        })
    }
}

//! Size-bounded JSONL shard writer.
//!
//! Records go to `<name>.partial` one line at a time. Closing a shard syncs
//! the file and renames it to `<name>`, so a file without the suffix is
//! always complete. Existing files are never reopened.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::error::{AppError, Result};
use crate::models::{Checkpoint, MappedRecord, OutputConfig};
use crate::storage::ShardHandle;

const PARTIAL_SUFFIX: &str = ".partial";

/// Where and how large shards are.
#[derive(Debug, Clone)]
pub struct ShardWriterConfig {
    pub dir: PathBuf,
    /// File name prefix, usually the collection name
    pub prefix: String,
    pub max_records: usize,
    pub max_bytes: u64,
}

impl ShardWriterConfig {
    pub fn from_output(output: &OutputConfig, prefix: impl Into<String>) -> Self {
        Self {
            dir: output.data_dir.clone(),
            prefix: prefix.into(),
            max_records: output.shard_max_records,
            max_bytes: output.shard_max_bytes,
        }
    }
}

struct OpenShard {
    name: String,
    path: PathBuf,
    partial: PathBuf,
    writer: BufWriter<File>,
    hasher: Sha256,
    record_count: usize,
    byte_count: u64,
    max_modified: Option<Checkpoint>,
}

/// Writes mapped records into consecutive shard files.
pub struct ShardWriter {
    config: ShardWriterConfig,
    run_stamp: String,
    next_seq: u32,
    current: Option<OpenShard>,
}

impl ShardWriter {
    /// Writer for a run started at `started`; the time goes into every name.
    pub fn new(config: ShardWriterConfig, started: DateTime<Utc>) -> Self {
        Self {
            config,
            run_stamp: started.format("%Y%m%dT%H%M%SZ").to_string(),
            next_seq: 0,
            current: None,
        }
    }

    fn shard_name(&self, seq: u32) -> String {
        format!("{}_shard_{}_{:03}.jsonl", self.config.prefix, self.run_stamp, seq)
    }

    async fn open_next(&mut self) -> Result<OpenShard> {
        tokio::fs::create_dir_all(&self.config.dir).await?;

        loop {
            let seq = self.next_seq;
            self.next_seq += 1;

            let name = self.shard_name(seq);
            let path = self.config.dir.join(&name);
            let partial = self.config.dir.join(format!("{name}{PARTIAL_SUFFIX}"));

            if tokio::fs::try_exists(&path).await? {
                continue;
            }
            let file = match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&partial)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(AppError::Io(e)),
            };

            log::debug!("Opened shard {}", partial.display());
            return Ok(OpenShard {
                name,
                path,
                partial,
                writer: BufWriter::new(file),
                hasher: Sha256::new(),
                record_count: 0,
                byte_count: 0,
                max_modified: None,
            });
        }
    }

    /// Append one record.
    ///
    /// Returns the finalized shard when this record filled it.
    pub async fn append(&mut self, record: &MappedRecord) -> Result<Option<ShardHandle>> {
        let mut shard = match self.current.take() {
            Some(shard) => shard,
            None => self.open_next().await?,
        };

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        shard.writer.write_all(&line).await?;
        shard.hasher.update(&line);
        shard.record_count += 1;
        shard.byte_count += line.len() as u64;
        if let Some(modified) = record.modified {
            shard.max_modified = shard.max_modified.max(Some(modified));
        }

        if shard.record_count >= self.config.max_records
            || shard.byte_count >= self.config.max_bytes
        {
            return finalize(shard).await.map(Some);
        }
        self.current = Some(shard);
        Ok(None)
    }

    /// Finalize the open shard, if it holds any records.
    pub async fn flush_and_close(&mut self) -> Result<Option<ShardHandle>> {
        match self.current.take() {
            Some(shard) if shard.record_count > 0 => finalize(shard).await.map(Some),
            Some(shard) => {
                drop(shard.writer);
                tokio::fs::remove_file(&shard.partial).await?;
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

async fn finalize(mut shard: OpenShard) -> Result<ShardHandle> {
    shard.writer.flush().await?;
    shard.writer.get_mut().sync_all().await?;
    drop(shard.writer);

    tokio::fs::rename(&shard.partial, &shard.path).await?;
    log::debug!(
        "Closed shard {} ({} records, {} bytes)",
        shard.name,
        shard.record_count,
        shard.byte_count
    );

    Ok(ShardHandle {
        name: shard.name,
        path: shard.path,
        record_count: shard.record_count,
        byte_count: shard.byte_count,
        max_modified: shard.max_modified,
        sha256: hex::encode(shard.hasher.finalize()),
    })
}

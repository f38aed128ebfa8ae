// src/pipeline/harvest.rs

//! Incremental harvest driver.
//!
//! One run reads the watermark, pages through everything modified after it,
//! maps and writes each record, and commits shards as they fill. The
//! watermark only moves after a shard's sink has accepted it, so a crash or
//! abort never skips records that were not committed.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::{Checkpoint, CheckpointState, RawRecord};
use crate::services::{MAX_PAGE_SIZE, Mapper, PageSource};
use crate::storage::{
    CheckpointStore, ShardHandle, ShardReceipt, ShardSink, ShardWriter, ShardWriterConfig,
};

/// Everything a run talks to.
pub struct HarvestContext<'a> {
    pub source: &'a dyn PageSource,
    pub mapper: &'a dyn Mapper,
    pub sink: &'a dyn ShardSink,
    pub store: &'a dyn CheckpointStore,
    pub shards: ShardWriterConfig,
    /// Requested page size before clamping
    pub page_size: usize,
}

/// Caller-supplied run bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Ignore the stored watermark and start from epoch
    pub reset: bool,
    /// Upper bound on records written this run
    pub max_records: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Done,
    Aborted,
}

/// Outcome of a run.
#[derive(Debug, Clone)]
pub struct HarvestReport {
    pub status: RunStatus,
    /// Records received from the page source and handed to the mapper
    pub fetched: usize,
    pub written: usize,
    pub skipped: usize,
    /// Committed shards, in commit order
    pub shards: Vec<ShardReceipt>,
    pub checkpoint_before: Checkpoint,
    pub checkpoint_after: Checkpoint,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl HarvestReport {
    fn new(checkpoint: Checkpoint, started_at: DateTime<Utc>) -> Self {
        Self {
            status: RunStatus::Done,
            fetched: 0,
            written: 0,
            skipped: 0,
            shards: Vec::new(),
            checkpoint_before: checkpoint,
            checkpoint_after: checkpoint,
            started_at,
            elapsed: Duration::ZERO,
        }
    }

    pub fn committed(&self) -> usize {
        self.shards.len()
    }

    fn log_summary(&self) {
        let outcome = match self.status {
            RunStatus::Done => "Harvest complete",
            RunStatus::Aborted => "Harvest aborted",
        };
        log::info!(
            "{}: fetched {}, written {}, skipped {}, {} shard(s) committed in {:.1}s",
            outcome,
            self.fetched,
            self.written,
            self.skipped,
            self.committed(),
            self.elapsed.as_secs_f64()
        );
        log::info!(
            "Run started {}; checkpoint: {} -> {}",
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.checkpoint_before,
            self.checkpoint_after
        );
    }
}

/// Run one incremental harvest.
///
/// Returns the report on success. On a fatal error the open shard is written
/// to disk without being committed, the partial report is logged, and
/// [`AppError::Aborted`] carries the cause.
pub async fn run_harvest(ctx: &HarvestContext<'_>, options: &RunOptions) -> Result<HarvestReport> {
    let started_at = Utc::now();
    let clock = Instant::now();

    let since = if options.reset {
        log::info!("Reset requested; ignoring stored checkpoint");
        Checkpoint::EPOCH
    } else {
        ctx.store.load_watermark().await?
    };

    if since.is_epoch() {
        log::info!("Performing full backlog crawl");
    } else {
        log::info!("Performing incremental update since {}", since);
    }
    log::info!("Maximum records this run: {}", options.max_records);

    let mut report = HarvestReport::new(since, started_at);
    let mut writer = ShardWriter::new(ctx.shards.clone(), started_at);

    let outcome = drive(ctx, options, since, &mut writer, &mut report).await;
    report.elapsed = clock.elapsed();

    match outcome {
        Ok(()) => {
            report.log_summary();
            Ok(report)
        }
        Err(error) => {
            report.status = RunStatus::Aborted;
            match writer.flush_and_close().await {
                Ok(Some(shard)) => log::warn!(
                    "Left uncommitted shard {} ({} records) for manual recovery",
                    shard.path.display(),
                    shard.record_count
                ),
                Ok(None) => {}
                Err(e) => log::warn!("Could not finalize open shard: {}", e),
            }
            log::error!("Harvest stopped: {}", error);
            report.log_summary();
            Err(AppError::aborted(report.committed(), error))
        }
    }
}

async fn drive(
    ctx: &HarvestContext<'_>,
    options: &RunOptions,
    since: Checkpoint,
    writer: &mut ShardWriter,
    report: &mut HarvestReport,
) -> Result<()> {
    let mut offset: u64 = 1;
    let mut last_written: Option<Checkpoint> = None;

    loop {
        let remaining = options.max_records.saturating_sub(report.written);
        if remaining == 0 {
            log::info!(
                "Reached max-records limit ({}). Stopping early.",
                options.max_records
            );
            break;
        }

        let page_size = ctx.page_size.min(MAX_PAGE_SIZE).min(remaining).max(1);
        let page = ctx.source.fetch_page(since, offset, page_size).await?;
        if page.records.is_empty() {
            log::debug!("Empty page at offset {}; backlog exhausted", offset);
            break;
        }
        log::debug!(
            "Page at offset {}: {} record(s) of {}",
            offset,
            page.records.len(),
            page.total
        );

        for raw in &page.records {
            if report.written >= options.max_records {
                if cap_splits_timestamp(last_written, raw) {
                    log::warn!(
                        "Stopped at max-records inside a group of records modified at {}; \
                         the rest of that group will not be selected again. \
                         Raise --max-records to include it.",
                        raw.modified.unwrap_or_default()
                    );
                }
                break;
            }
            report.fetched += 1;

            let record = match ctx.mapper.map(raw).await {
                Ok(record) => record,
                Err(e) => {
                    report.skipped += 1;
                    log::warn!("Skipping record {}: {}", raw.describe(), e);
                    continue;
                }
            };

            let closed = writer.append(&record).await?;
            report.written += 1;
            last_written = record.modified;
            log::info!("Saved record {}: {}", report.written, record.url);

            if let Some(shard) = closed {
                commit(ctx, shard, report).await?;
            }
        }

        offset += page.records.len() as u64;
        if offset > page.total {
            break;
        }
    }

    if let Some(shard) = writer.flush_and_close().await? {
        commit(ctx, shard, report).await?;
    }
    Ok(())
}

/// Whether stopping before `next` leaves records behind that share the
/// timestamp of the last written one. The query selects strictly newer
/// records, so those are never fetched again.
fn cap_splits_timestamp(last_written: Option<Checkpoint>, next: &RawRecord) -> bool {
    last_written.is_some() && last_written == next.modified
}

/// Publish a closed shard, then advance the watermark past it.
async fn commit(
    ctx: &HarvestContext<'_>,
    shard: ShardHandle,
    report: &mut HarvestReport,
) -> Result<()> {
    let receipt = ctx.sink.publish(&shard).await?;

    let watermark = match shard.max_modified {
        Some(modified) => report.checkpoint_after.max(modified),
        None => report.checkpoint_after,
    };
    let state = CheckpointState {
        watermark,
        committed_at: Utc::now(),
        shard: Some(shard.name.clone()),
        records: shard.record_count,
    };
    ctx.store.save(&state).await?;

    report.checkpoint_after = watermark;
    report.shards.push(receipt);
    Ok(())
}

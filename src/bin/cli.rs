//! SRU harvester CLI
//!
//! One run: load config, harvest everything modified since the stored
//! checkpoint (up to the record cap), commit shards, exit.
//! The config file comes from `SRU_HARVEST_CONFIG` (default `harvest.toml`).

use std::sync::Arc;

use clap::Parser;
use sru_harvest::{
    config,
    error::Result,
    models::SinkKind,
    pipeline::{self, HarvestContext, RunOptions},
    services::{RecordMapper, SruClient},
    storage::{FileCheckpointStore, HubSink, LocalSink, ShardSink, ShardWriterConfig},
    utils::http::{self, HttpTransport, Transport},
};

/// Incremental harvester for repository.overheid.nl SRU collections
#[derive(Parser, Debug)]
#[command(name = "sru-harvest", version, about)]
struct Cli {
    /// Ignore the last update checkpoint and crawl the full backlog
    #[arg(long)]
    reset: bool,

    /// Maximum number of records to process in a single run
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    max_records: Option<u64>,
}

/// Initialize logging; `RUST_LOG` overrides the default level.
fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let config_path = config::config_path();
    let config = config::load_all(&config_path)?;
    log::info!(
        "Harvesting {} from {}",
        config.collection.label(),
        config.sru.base_url
    );

    let transport: Arc<dyn Transport> =
        Arc::new(HttpTransport::from_config(&config.sru, &config.retry)?);
    let source = SruClient::new(
        Arc::clone(&transport),
        &config.sru.base_url,
        config.collection,
    )?;
    let mapper = RecordMapper::new(config.collection, &config.mapper, Some(transport))?;

    let sink: Box<dyn ShardSink> = match config.output.sink {
        SinkKind::Local => Box::new(LocalSink::new()),
        SinkKind::Hub => Box::new(HubSink::new(
            http::create_async_client(&config.sru)?,
            &config.upload,
            &config.output,
        )?),
    };
    let store = FileCheckpointStore::new(&config.checkpoint.path);

    let ctx = HarvestContext {
        source: &source,
        mapper: &mapper,
        sink: sink.as_ref(),
        store: &store,
        shards: ShardWriterConfig::from_output(&config.output, config.collection.shard_prefix()),
        page_size: config.sru.page_size,
    };
    let options = RunOptions {
        reset: cli.reset,
        max_records: cli
            .max_records
            .map(|n| n as usize)
            .unwrap_or_else(|| config.max_records()),
    };

    let report = pipeline::run_harvest(&ctx, &options).await?;
    for shard in &report.shards {
        log::info!("  {} -> {}", shard.name, shard.location);
    }
    Ok(())
}

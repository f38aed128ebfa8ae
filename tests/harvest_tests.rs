//! Integration tests for the harvester
//!
//! These tests use wiremock as the SRU endpoint, document host and dataset
//! hub, and drive the full fetch -> map -> shard -> commit cycle.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sru_harvest::error::AppError;
use sru_harvest::models::{
    Checkpoint, Collection, MappedRecord, MapperConfig, OutputConfig, UploadConfig,
};
use sru_harvest::pipeline::{HarvestContext, HarvestReport, RunOptions, RunStatus, run_harvest};
use sru_harvest::services::{RecordMapper, SruClient};
use sru_harvest::storage::{
    CheckpointStore, FileCheckpointStore, HubSink, LocalSink, ShardHandle, ShardSink,
    ShardWriterConfig,
};
use sru_harvest::utils::http::{HttpTransport, RetryPolicy, Transport};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EPOCH_QUERY: &str = "c.product-area==tuchtrecht sortBy dt.modified/sort.ascending";

fn record_xml(base: &str, n: u32, position: u32) -> String {
    format!(
        r#"<sru:record>
      <sru:recordSchema>gzd</sru:recordSchema>
      <sru:recordData>
        <gzd:gzd>
          <gzd:originalData>
            <owms:meta>
              <dcterms:identifier>tt-{n}</dcterms:identifier>
              <dcterms:title>Uitspraak {n}</dcterms:title>
              <dcterms:type>uitspraak</dcterms:type>
              <dcterms:modified>2024-02-{n:02}T10:00:00</dcterms:modified>
            </owms:meta>
          </gzd:originalData>
          <gzd:enrichedData>
            <gzd:url>{base}/frbr/tt/{n}</gzd:url>
            <gzd:itemUrl manifestation="pdf">{base}/docs/{n}.pdf</gzd:itemUrl>
            <gzd:itemUrl manifestation="xml">{base}/docs/{n}.xml</gzd:itemUrl>
          </gzd:enrichedData>
        </gzd:gzd>
      </sru:recordData>
      <sru:recordPosition>{position}</sru:recordPosition>
    </sru:record>"#
    )
}

fn sru_page(base: &str, total: usize, first_position: u32, days: &[u32]) -> String {
    let records: String = days
        .iter()
        .enumerate()
        .map(|(i, n)| record_xml(base, *n, first_position + i as u32))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<sru:searchRetrieveResponse xmlns:sru="http://docs.oasis-open.org/ns/search-ws/sruResponse"
    xmlns:gzd="http://standaarden.overheid.nl/sru"
    xmlns:owms="http://standaarden.overheid.nl/owms/terms/"
    xmlns:dcterms="http://purl.org/dc/terms/">
  <sru:version>2.0</sru:version>
  <sru:numberOfRecords>{total}</sru:numberOfRecords>
  <sru:records>{records}</sru:records>
</sru:searchRetrieveResponse>"#
    )
}

fn transport() -> Arc<dyn Transport> {
    Arc::new(HttpTransport::new(
        reqwest::Client::new(),
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
        },
    ))
}

async fn mount_page(server: &MockServer, query: &str, start: u32, body: String) {
    Mock::given(method("GET"))
        .and(path("/sru"))
        .and(query_param("query", query))
        .and(query_param("startRecord", start.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_document(server: &MockServer, n: u32) {
    Mock::given(method("GET"))
        .and(path(format!("/docs/{n}.xml")))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "<uitspraak><al>Zaak {n} behandeld door mr. Jansen, voorzitter.</al></uitspraak>"
        )))
        .mount(server)
        .await;
}

async fn harvest(
    server: &MockServer,
    dir: &Path,
    store: &FileCheckpointStore,
    mapper: MapperConfig,
    page_size: usize,
) -> sru_harvest::error::Result<HarvestReport> {
    let transport = transport();
    let source = SruClient::new(
        Arc::clone(&transport),
        &format!("{}/sru", server.uri()),
        Collection::Tuchtrecht,
    )
    .unwrap();
    let mapper = RecordMapper::new(Collection::Tuchtrecht, &mapper, Some(transport)).unwrap();
    let sink = LocalSink::new();

    let ctx = HarvestContext {
        source: &source,
        mapper: &mapper,
        sink: &sink,
        store,
        shards: ShardWriterConfig {
            dir: dir.join("data"),
            prefix: "tuchtrecht".into(),
            max_records: 2,
            max_bytes: u64::MAX,
        },
        page_size,
    };
    run_harvest(
        &ctx,
        &RunOptions {
            reset: false,
            max_records: 100,
        },
    )
    .await
}

fn read_records(dir: &Path) -> Vec<MappedRecord> {
    let mut names: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    names.sort();
    names
        .iter()
        .flat_map(|p| {
            std::fs::read_to_string(p)
                .unwrap()
                .lines()
                .map(|l| serde_json::from_str::<MappedRecord>(l).unwrap())
                .collect::<Vec<_>>()
        })
        .collect()
}

#[tokio::test]
async fn test_full_harvest_then_incremental_run() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, EPOCH_QUERY, 1, sru_page(&base, 3, 1, &[1, 2])).await;
    mount_page(&server, EPOCH_QUERY, 3, sru_page(&base, 3, 3, &[3])).await;
    for n in 1..=3 {
        mount_document(&server, n).await;
    }

    let tmp = TempDir::new().unwrap();
    let store = FileCheckpointStore::new(tmp.path().join(".last_update"));

    let report = harvest(&server, tmp.path(), &store, MapperConfig::default(), 2)
        .await
        .unwrap();
    assert_eq!(report.status, RunStatus::Done);
    assert_eq!(report.written, 3);
    assert_eq!(report.committed(), 2);
    assert_eq!(
        report.checkpoint_after,
        Checkpoint::parse("2024-02-03T10:00:00Z").unwrap()
    );
    assert_eq!(store.load_watermark().await.unwrap(), report.checkpoint_after);

    let records = read_records(&tmp.path().join("data"));
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].identifier, "tt-1");
    assert_eq!(records[0].source, "Tuchtrecht");
    assert_eq!(records[0].url, format!("{base}/docs/1.xml"));
    assert_eq!(records[0].title.as_deref(), Some("Uitspraak 1"));
    assert_eq!(
        records[0].content,
        "Zaak 1 behandeld door mr. NAAM, voorzitter."
    );

    // Second run asks only for records after the committed watermark
    let incremental = "(c.product-area==tuchtrecht) AND dt.modified>\"2024-02-03T10:00:00Z\" \
                       sortBy dt.modified/sort.ascending";
    mount_page(&server, incremental, 1, sru_page(&base, 0, 1, &[])).await;

    let report = harvest(&server, tmp.path(), &store, MapperConfig::default(), 2)
        .await
        .unwrap();
    assert_eq!(report.fetched, 0);
    assert_eq!(report.committed(), 0);
    assert_eq!(
        store.load_watermark().await.unwrap(),
        Checkpoint::parse("2024-02-03T10:00:00Z").unwrap()
    );
}

#[tokio::test]
async fn test_transient_status_is_retried() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/sru"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(&server, EPOCH_QUERY, 1, sru_page(&base, 1, 1, &[1])).await;

    let tmp = TempDir::new().unwrap();
    let store = FileCheckpointStore::new(tmp.path().join(".last_update"));
    let mapper = MapperConfig {
        fetch_content: false,
        scrub_names: false,
    };

    let report = harvest(&server, tmp.path(), &store, mapper, 10).await.unwrap();
    assert_eq!(report.written, 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);

    // Content fetching is off, so the xml manifestation gets the placeholder too
    let records = read_records(&tmp.path().join("data"));
    assert_eq!(records[0].url, format!("{base}/docs/1.xml"));
    assert_eq!(
        records[0].content,
        "Content from non-XML source, e.g., PDF, not extracted."
    );
}

#[tokio::test]
async fn test_fatal_status_aborts_without_checkpoint() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sru"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let store = FileCheckpointStore::new(tmp.path().join(".last_update"));

    let err = harvest(&server, tmp.path(), &store, MapperConfig::default(), 10)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Aborted { committed: 0, .. }));
    assert!(store.load().await.unwrap().is_none());
}

#[tokio::test]
async fn test_missing_document_skips_record() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, EPOCH_QUERY, 1, sru_page(&base, 2, 1, &[1, 2])).await;
    mount_document(&server, 2).await;

    let tmp = TempDir::new().unwrap();
    let store = FileCheckpointStore::new(tmp.path().join(".last_update"));

    let report = harvest(&server, tmp.path(), &store, MapperConfig::default(), 10)
        .await
        .unwrap();
    assert_eq!(report.written, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(
        store.load_watermark().await.unwrap(),
        Checkpoint::parse("2024-02-02T10:00:00Z").unwrap()
    );
}

#[tokio::test]
async fn test_hub_sink_creates_repo_and_commits() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/repos/create"))
        .and(header("authorization", "Bearer hf_test"))
        .and(body_string_contains("\"type\":\"dataset\""))
        .respond_with(ResponseTemplate::new(409))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/datasets/org/tuchtrecht/commit/main"))
        .and(header("authorization", "Bearer hf_test"))
        .and(body_string_contains("data/tuchtrecht_shard_20250101T000000Z_000.jsonl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "commitOid": "abc123",
            "commitUrl": "https://hub.test/datasets/org/tuchtrecht/commit/abc123"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("tuchtrecht_shard_20250101T000000Z_000.jsonl");
    tokio::fs::write(&path, "{\"URL\":\"x\"}\n").await.unwrap();
    let shard = ShardHandle {
        name: "tuchtrecht_shard_20250101T000000Z_000.jsonl".into(),
        path: path.clone(),
        record_count: 1,
        byte_count: 12,
        max_modified: None,
        sha256: String::new(),
    };

    let upload = UploadConfig {
        dataset_repo: "org/tuchtrecht".into(),
        hub_url: server.uri(),
        token: Some("hf_test".into()),
        ..UploadConfig::default()
    };
    let output = OutputConfig {
        keep_local: false,
        ..OutputConfig::default()
    };
    let sink = HubSink::new(reqwest::Client::new(), &upload, &output).unwrap();

    let receipt = sink.publish(&shard).await.unwrap();
    assert_eq!(
        receipt.location,
        "https://hub.test/datasets/org/tuchtrecht/commit/abc123"
    );
    assert!(!path.exists());

    // Repository creation happens once per sink
    tokio::fs::write(&path, "{\"URL\":\"x\"}\n").await.unwrap();
    sink.publish(&shard).await.unwrap();
}

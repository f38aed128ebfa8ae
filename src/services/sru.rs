// src/services/sru.rs

//! SRU 2.0 page fetcher.
//!
//! Builds `searchRetrieve` requests for one collection and turns each
//! response into a [`Page`] of [`RawRecord`]s, in the order the endpoint
//! returned them.

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::error::{FetchError, Result};
use crate::models::{Checkpoint, Collection, RawRecord};
use crate::utils::http::Transport;
use crate::utils::xml::{self, Element};

/// Largest `maximumRecords` the endpoint accepts.
pub const MAX_PAGE_SIZE: usize = 1000;

/// One response worth of records.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<RawRecord>,
    /// `numberOfRecords` reported for the whole query
    pub total: u64,
}

/// Paginated access to the backlog after a checkpoint.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch records newer than `since`, starting at the 1-based `offset`.
    async fn fetch_page(
        &self,
        since: Checkpoint,
        offset: u64,
        page_size: usize,
    ) -> std::result::Result<Page, FetchError>;
}

/// [`PageSource`] for repository.overheid.nl.
pub struct SruClient {
    transport: Arc<dyn Transport>,
    base_url: Url,
    collection: Collection,
}

impl SruClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: &str,
        collection: Collection,
    ) -> Result<Self> {
        Ok(Self {
            transport,
            base_url: Url::parse(base_url)?,
            collection,
        })
    }

    /// CQL query selecting records modified after `since`.
    pub fn query(&self, since: Checkpoint) -> String {
        let base = self.collection.base_query();
        let filtered = if since.is_epoch() {
            base
        } else {
            format!("({}) AND dt.modified>\"{}\"", base, since.to_rfc3339())
        };
        format!("{filtered} sortBy dt.modified/sort.ascending")
    }

    /// Full request URL for one page.
    pub fn page_url(&self, since: Checkpoint, offset: u64, page_size: usize) -> String {
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("operation", "searchRetrieve")
            .append_pair("version", "2.0")
            .append_pair("query", &self.query(since))
            .append_pair("startRecord", &offset.max(1).to_string())
            .append_pair("maximumRecords", &page_size.to_string())
            .append_pair("recordSchema", "gzd")
            .append_pair("httpAccept", "application/xml");
        url.into()
    }
}

#[async_trait]
impl PageSource for SruClient {
    async fn fetch_page(
        &self,
        since: Checkpoint,
        offset: u64,
        page_size: usize,
    ) -> std::result::Result<Page, FetchError> {
        let url = self.page_url(since, offset, page_size);
        let body = self.transport.get(&url).await?;
        let text = String::from_utf8(body)
            .map_err(|e| FetchError::fatal(format!("SRU response is not UTF-8: {e}")))?;
        parse_page(&text, offset)
    }
}

/// Parse a `searchRetrieveResponse` document.
///
/// `offset` numbers records when the response carries no `recordPosition`.
pub fn parse_page(text: &str, offset: u64) -> std::result::Result<Page, FetchError> {
    let root = xml::parse(text)
        .map_err(|e| FetchError::fatal(format!("malformed SRU response: {e}")))?;

    if let Some(diagnostics) = root.find("diagnostics") {
        let message = diagnostics
            .find("message")
            .and_then(Element::text_opt)
            .or_else(|| diagnostics.find("details").and_then(Element::text_opt))
            .unwrap_or_else(|| "unspecified diagnostic".to_string());
        return Err(FetchError::fatal(format!("SRU diagnostic: {message}")));
    }

    let total = root
        .find("numberOfRecords")
        .and_then(Element::text_opt)
        .ok_or_else(|| FetchError::fatal("SRU response has no numberOfRecords"))?
        .parse::<u64>()
        .map_err(|e| FetchError::fatal(format!("invalid numberOfRecords: {e}")))?;

    let records = match root.find("records") {
        Some(records) => records
            .children_named("record")
            .enumerate()
            .map(|(i, record)| raw_record(text, record, offset + i as u64))
            .collect(),
        None => Vec::new(),
    };

    Ok(Page { records, total })
}

fn raw_record(text: &str, record: &Element, fallback_position: u64) -> RawRecord {
    let position = record
        .find("recordPosition")
        .and_then(Element::text_opt)
        .and_then(|p| p.parse().ok())
        .unwrap_or(fallback_position);

    let modified = record
        .find("modified")
        .and_then(Element::text_opt)
        .and_then(|m| Checkpoint::parse(&m));

    let source = record
        .find("enrichedData")
        .and_then(|enriched| enriched.children_named("url").next())
        .or_else(|| record.find("url"))
        .and_then(Element::text_opt);

    RawRecord {
        payload: text[record.span.clone()].to_string(),
        source,
        modified,
        position,
    }
}

// src/services/mapper.rs

//! Record mapper.
//!
//! Turns one `gzd` record into a [`MappedRecord`]. Metadata comes from
//! `originalData`, the document location from `enrichedData`. When the
//! chosen manifestation is XML, its full text becomes the `Content` column.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{MapError, Result};
use crate::models::{Checkpoint, Collection, MappedRecord, MapperConfig, RawRecord};
use crate::services::NameScrubber;
use crate::utils::http::Transport;
use crate::utils::normalize_whitespace;
use crate::utils::xml::{self, Element};

/// `Content` value for records whose text is not extracted.
pub const NON_XML_PLACEHOLDER: &str = "Content from non-XML source, e.g., PDF, not extracted.";

/// Converts raw records; failures only affect the record at hand.
#[async_trait]
pub trait Mapper: Send + Sync {
    async fn map(&self, raw: &RawRecord) -> std::result::Result<MappedRecord, MapError>;
}

/// Where a record's document lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub url: String,
    /// Whether the manifestation is XML and its text can be extracted
    pub is_xml: bool,
}

/// Fields read from the record payload, before content resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFields {
    pub identifier: String,
    pub title: Option<String>,
    pub document_type: Option<String>,
    pub creator: Option<String>,
    pub language: Option<String>,
    pub issued: Option<String>,
    pub modified: Option<Checkpoint>,
    pub location: Location,
}

/// Extract metadata and the preferred document location from a record.
///
/// `manifestations` is the preference order for `itemUrl` entries; the
/// plain `enrichedData/url` is the last resort.
pub fn extract_fields(
    payload: &str,
    manifestations: &[&str],
) -> std::result::Result<RecordFields, MapError> {
    let root = xml::parse(payload).map_err(MapError::MalformedXml)?;
    let meta = root.find("originalData").unwrap_or(&root);

    let text_of = |name: &str| {
        meta.find(name)
            .and_then(Element::text_opt)
            .map(|text| normalize_whitespace(&text))
    };

    let identifier = text_of("identifier")
        .or_else(|| root.find("recordIdentifier").and_then(Element::text_opt))
        .ok_or(MapError::MissingIdentifier)?;

    let location = root
        .find("enrichedData")
        .and_then(|enriched| preferred_location(enriched, manifestations))
        .ok_or_else(|| MapError::MissingLocation(identifier.clone()))?;

    Ok(RecordFields {
        title: text_of("title"),
        document_type: text_of("type"),
        creator: text_of("creator"),
        language: text_of("language"),
        issued: text_of("issued").or_else(|| text_of("available")),
        modified: text_of("modified").and_then(|m| Checkpoint::parse(&m)),
        identifier,
        location,
    })
}

fn preferred_location(enriched: &Element, manifestations: &[&str]) -> Option<Location> {
    let items = enriched.find_all("itemUrl");
    for manifestation in manifestations {
        let hit = items
            .iter()
            .filter(|item| item.attr("manifestation") == Some(*manifestation))
            .find_map(|item| item.text_opt());
        if let Some(url) = hit {
            return Some(Location {
                url,
                is_xml: manifestation.starts_with("xml"),
            });
        }
    }

    enriched
        .find("url")
        .and_then(Element::text_opt)
        .map(|url| Location { url, is_xml: false })
}

/// [`Mapper`] for `gzd` records of one collection.
pub struct RecordMapper {
    collection: Collection,
    transport: Option<Arc<dyn Transport>>,
    scrubber: Option<NameScrubber>,
}

impl RecordMapper {
    /// Build a mapper. `transport` is only used when content fetching is on.
    pub fn new(
        collection: Collection,
        config: &MapperConfig,
        transport: Option<Arc<dyn Transport>>,
    ) -> Result<Self> {
        let scrubber = if config.scrub_names {
            Some(NameScrubber::new()?)
        } else {
            None
        };
        Ok(Self {
            collection,
            transport: transport.filter(|_| config.fetch_content),
            scrubber,
        })
    }

    async fn resolve_content(&self, location: &Location) -> std::result::Result<String, MapError> {
        let transport = match &self.transport {
            Some(transport) if location.is_xml => transport,
            _ => return Ok(NON_XML_PLACEHOLDER.to_string()),
        };

        let unavailable = |reason: String| MapError::ContentUnavailable {
            url: location.url.clone(),
            reason,
        };

        let body = transport
            .get(&location.url)
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        let text = String::from_utf8_lossy(&body);
        let document = xml::parse(&text).map_err(unavailable)?;
        let content = document.text();

        if content.trim().is_empty() {
            return Err(unavailable("document has no text".to_string()));
        }
        Ok(content)
    }
}

#[async_trait]
impl Mapper for RecordMapper {
    async fn map(&self, raw: &RawRecord) -> std::result::Result<MappedRecord, MapError> {
        let fields = extract_fields(&raw.payload, self.collection.manifestations())?;
        let content = self.resolve_content(&fields.location).await?;
        let content = match &self.scrubber {
            Some(scrubber) => scrubber.scrub(&content),
            None => content,
        };

        log::debug!("Mapped {} -> {}", fields.identifier, fields.location.url);

        Ok(MappedRecord {
            url: fields.location.url,
            content,
            source: self.collection.label().to_string(),
            identifier: fields.identifier,
            title: fields.title,
            document_type: fields.document_type,
            creator: fields.creator,
            language: fields.language,
            issued: fields.issued,
            modified: raw.modified.or(fields.modified),
            fetched_at: Utc::now(),
        })
    }
}

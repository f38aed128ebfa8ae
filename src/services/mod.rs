//! Service layer for the harvester.
//!
//! This module contains the business logic for:
//! - SRU page fetching (`SruClient`)
//! - Record mapping and content resolution (`RecordMapper`)
//! - Name pseudonymisation (`NameScrubber`)

mod mapper;
mod scrubber;
mod sru;

pub use mapper::{
    Location, Mapper, NON_XML_PLACEHOLDER, RecordFields, RecordMapper, extract_fields,
};
pub use scrubber::NameScrubber;
pub use sru::{MAX_PAGE_SIZE, Page, PageSource, SruClient, parse_page};

// src/lib.rs

//! Incremental SRU harvester library.
//!
//! Pages through an SRU 2.0 endpoint from a persisted watermark, maps each
//! `gzd` record to a flat JSON line, and commits size-bounded JSONL shards to
//! a local directory or a Hugging Face dataset.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

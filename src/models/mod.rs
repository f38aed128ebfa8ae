// src/models/mod.rs

//! Domain models for the harvester.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod checkpoint;
mod collection;
mod config;
mod record;

// Re-export all public types
pub use checkpoint::{Checkpoint, CheckpointState};
pub use collection::Collection;
pub use config::{
    CheckpointConfig, Config, MapperConfig, OutputConfig, RetryConfig, RunConfig, SinkKind,
    SruConfig, UploadConfig,
};
pub use record::{MappedRecord, RawRecord};

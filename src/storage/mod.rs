//! Storage Module
//!
//! Persistent storage layer using SSTable-like format, plus the store
//! manifest that records which column families exist.
//!
//! ## Responsibilities
//! - Persist each family's data to disk in sorted format
//! - Point lookups newest → oldest across SSTables
//! - Durable family catalog (manifest)

mod sstable;
mod manager;
mod manifest;

pub use sstable::{SSTable, SSTableBuilder, SSTableReader};
pub use manager::StorageManager;
pub use manifest::Manifest;

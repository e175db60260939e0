//! # kvdb
//!
//! Many named key-value databases inside one embedded, persistent store,
//! shared by many independent consumers ("scopes"):
//! - One column family per database, each with its own WAL and SSTables
//! - Scope-aware reference counting of live handlers
//! - Databases cannot be deleted while any handler on them is alive
//! - Bulk load of JSON object files
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Consumers (scopes)                           │
//! └──────────────┬───────────────────────────────┬──────────────┘
//!                │ get_handler / create / delete │ get / set / remove
//! ┌──────────────▼──────────────┐        ┌───────▼──────────────┐
//! │        KvdbManager          │ issues │     KvdbHandler      │
//! │  databases + registry       ├───────►│  (db, scope) bound   │
//! │  (one mutex)                │◄───────┤  release on drop     │
//! └──────────────┬──────────────┘        └───────┬──────────────┘
//!                │                               │
//! ┌──────────────▼───────────────────────────────▼──────────────┐
//! │                          Store                               │
//! │   MANIFEST  ·  ColumnFamily (WAL → MemTable → SSTables) ...  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;
pub mod memtable;
pub mod storage;
pub mod engine;
pub mod kvdb;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ContractViolation, KvdbError, Result};
pub use config::{Config, WalSyncStrategy};
pub use engine::{ColumnFamily, Store, DEFAULT_FAMILY};
pub use kvdb::{HandlerRegistry, KvdbHandler, KvdbManager, RefInfo};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of kvdb
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Error types for kvdb
//!
//! Provides a unified error type for all operations, from the WAL up to the
//! database manager.

use thiserror::Error;

/// Result type alias using KvdbError
pub type Result<T> = std::result::Result<T, KvdbError>;

/// Unified error type for kvdb operations
#[derive(Debug, Error)]
pub enum KvdbError {
    // -------------------------------------------------------------------------
    // Manager Errors
    // -------------------------------------------------------------------------
    #[error("Could not open the storage engine: {0}")]
    EngineOpen(String),

    #[error("The DB '{0}' does not exist")]
    NamespaceNotFound(String),

    #[error("Could not remove the DB '{name}'. Usage reference count: {count}")]
    NamespaceInUse { name: String, count: usize },

    #[error("Storage engine failure: {0}")]
    EngineOperation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Programming error: {0}")]
    Programming(#[from] ContractViolation),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Manager not initialized. Call initialize() first.")]
    NotInitialized,

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<bincode::Error> for KvdbError {
    fn from(e: bincode::Error) -> Self {
        KvdbError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for KvdbError {
    fn from(e: serde_json::Error) -> Self {
        KvdbError::Serialization(e.to_string())
    }
}

/// A caller broke the handler acquire/release contract.
///
/// These are never expected in a correct program; they mean the usage
/// counts no longer match the live handlers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    #[error("release for DB '{db}' without any registered handler")]
    UnknownDatabase { db: String },

    #[error("release for DB '{db}' from scope '{scope}' which holds no handler")]
    UnknownScope { db: String, scope: String },

    #[error("handler count for DB '{db}', scope '{scope}' is already zero")]
    CountExhausted { db: String, scope: String },

    #[error("handler for DB '{db}', scope '{scope}' released twice")]
    DoubleRelease { db: String, scope: String },
}

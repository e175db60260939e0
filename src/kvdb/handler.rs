//! KVDB Handler
//!
//! Scope-bound access to one database. A handler is counted in the manager's
//! registry from the moment it is issued until it is released, which is what
//! keeps the database from being deleted underneath it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::error;

use crate::engine::ColumnFamily;
use crate::error::{ContractViolation, Result};
use crate::KvdbError;

use super::manager::Catalog;

/// Handle on one database for one scope
///
/// ## Lifecycle
/// `Active` after `KvdbManager::get_handler`, `Released` after `release()`
/// or drop, whichever comes first. Dropping an active handler releases it;
/// calling `release()` on a released handler is a `ContractViolation`, and
/// every data operation on a released handler fails with `InvalidState`.
///
/// Handlers are `Send + Sync` and may be released from any thread.
pub struct KvdbHandler {
    family: Arc<ColumnFamily>,
    db_name: String,
    scope_name: String,
    catalog: Arc<Mutex<Catalog>>,
    released: AtomicBool,
}

impl KvdbHandler {
    pub(crate) fn new(
        family: Arc<ColumnFamily>,
        db_name: String,
        scope_name: String,
        catalog: Arc<Mutex<Catalog>>,
    ) -> Self {
        Self {
            family,
            db_name,
            scope_name,
            catalog,
            released: AtomicBool::new(false),
        }
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    pub fn scope_name(&self) -> &str {
        &self.scope_name
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Data Operations
    // =========================================================================

    /// Raw value of a key
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.ensure_active()?;
        self.family.get(key.as_bytes()).map_err(engine_failure)
    }

    /// Value of a key as UTF-8 text
    pub fn get_str(&self, key: &str) -> Result<Option<String>> {
        self.get(key)?
            .map(|bytes| {
                String::from_utf8(bytes).map_err(|_| {
                    KvdbError::InvalidInput(format!("value of key '{}' is not UTF-8", key))
                })
            })
            .transpose()
    }

    /// Value of a key parsed as JSON
    pub fn get_json(&self, key: &str) -> Result<Option<serde_json::Value>> {
        self.get(key)?
            .map(|bytes| serde_json::from_slice(&bytes).map_err(KvdbError::from))
            .transpose()
    }

    pub fn set(&self, key: &str, value: impl AsRef<[u8]>) -> Result<()> {
        self.ensure_active()?;
        self.family
            .put(key.as_bytes(), value.as_ref())
            .map_err(engine_failure)
    }

    /// Store a value as compact JSON text
    pub fn set_json(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let text = serde_json::to_string(value)?;
        self.set(key, text)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.ensure_active()?;
        self.family.delete(key.as_bytes()).map_err(engine_failure)
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    // =========================================================================
    // Release
    // =========================================================================

    /// Give the database back before the handler goes out of scope
    pub fn release(&self) -> Result<()> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Err(ContractViolation::DoubleRelease {
                db: self.db_name.clone(),
                scope: self.scope_name.clone(),
            }
            .into());
        }

        self.unregister()
    }

    fn unregister(&self) -> Result<()> {
        self.catalog
            .lock()
            .registry
            .release(&self.db_name, &self.scope_name)?;
        Ok(())
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_released() {
            return Err(KvdbError::InvalidState(format!(
                "handler for DB '{}' (scope '{}') has been released",
                self.db_name, self.scope_name
            )));
        }
        Ok(())
    }
}

impl Drop for KvdbHandler {
    fn drop(&mut self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Err(e) = self.unregister() {
            error!(
                db = %self.db_name,
                scope = %self.scope_name,
                error = %e,
                "handler release failed"
            );
        }
    }
}

impl std::fmt::Debug for KvdbHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvdbHandler")
            .field("db_name", &self.db_name)
            .field("scope_name", &self.scope_name)
            .field("released", &self.is_released())
            .finish()
    }
}

fn engine_failure(e: KvdbError) -> KvdbError {
    KvdbError::EngineOperation(e.to_string())
}

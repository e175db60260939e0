//! Database Manager
//!
//! Owns the physical store and the set of open databases (column families),
//! and hands out scope-bound handlers counted in the `HandlerRegistry`.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::engine::{ColumnFamily, Store, DEFAULT_FAMILY};
use crate::error::Result;
use crate::KvdbError;

use super::handler::KvdbHandler;
use super::registry::{HandlerRegistry, RefInfo};

/// Scope under which `load_from_file` holds its database
pub const LOAD_SCOPE: &str = "kvdb::load";

/// State guarded by the manager's single lock
///
/// The database set and the registry live under one mutex so that handler
/// acquisition and database deletion exclude each other.
pub(crate) struct Catalog {
    store: Option<Store>,
    databases: HashMap<String, Arc<ColumnFamily>>,
    /// Backward-compatibility family; tracked but never exposed
    default_family: Option<Arc<ColumnFamily>>,
    pub(crate) registry: HandlerRegistry,
}

impl Catalog {
    fn store(&self) -> Result<&Store> {
        self.store.as_ref().ok_or(KvdbError::NotInitialized)
    }
}

/// Manages the logical databases of one store
///
/// Construct one per store at startup and share it by reference (or in an
/// `Arc`) with every consumer.
///
/// ## Locking
/// Every operation that reads or changes the database set or the registry
/// runs under the catalog mutex. Reads and writes through a handler do not
/// take it.
pub struct KvdbManager {
    config: Config,
    catalog: Arc<Mutex<Catalog>>,
}

impl KvdbManager {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            catalog: Arc::new(Mutex::new(Catalog {
                store: None,
                databases: HashMap::new(),
                default_family: None,
                registry: HandlerRegistry::new(),
            })),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open the store and recover every existing database
    ///
    /// Fails with `EngineOpen` if the store cannot be opened; the caller is
    /// not expected to carry on without it. Initializing twice is a no-op.
    pub fn initialize(&self) -> Result<()> {
        let mut catalog = self.catalog.lock();
        if catalog.store.is_some() {
            return Ok(());
        }

        let store = Store::open(&self.config).map_err(|e| {
            KvdbError::EngineOpen(format!("{}: {}", self.config.store_path().display(), e))
        })?;

        for family in store.families() {
            if family.name() == DEFAULT_FAMILY {
                catalog.default_family = Some(family);
            } else {
                catalog.databases.insert(family.name().to_string(), family);
            }
        }
        catalog.store = Some(store);

        info!(
            path = %self.config.store_path().display(),
            databases = catalog.databases.len(),
            "KVDB manager initialized"
        );
        Ok(())
    }

    /// Close the store and release every database handle
    ///
    /// Data stays on disk; a later `initialize()` recovers it. Handlers that
    /// are still alive keep their registry entries and can be released
    /// normally, but their reads and writes fail from here on.
    ///
    /// If the store cannot be closed the error is returned and the manager
    /// stays initialized, so `finalize()` can be called again.
    pub fn finalize(&self) -> Result<()> {
        let mut catalog = self.catalog.lock();
        let store = match catalog.store.as_ref() {
            Some(store) => store,
            None => return Ok(()),
        };

        let outstanding = catalog.registry.total_usage();
        if outstanding > 0 {
            warn!(
                handlers = outstanding,
                usage = ?catalog.registry.usage_by_database(),
                "finalizing KVDB manager with live handlers"
            );
        }

        store
            .close()
            .map_err(|e| KvdbError::EngineOperation(format!("Could not close the store: {}", e)))?;

        catalog.store = None;
        catalog.databases.clear();
        catalog.default_family = None;

        info!(path = %self.config.store_path().display(), "KVDB manager finalized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.catalog.lock().store.is_some()
    }

    // =========================================================================
    // Database Management
    // =========================================================================

    /// Create a database; succeeds without change if it already exists
    pub fn create_db(&self, name: &str) -> Result<()> {
        Self::validate_name(name)?;

        let mut catalog = self.catalog.lock();
        let store = catalog.store()?;

        if catalog.databases.contains_key(name) {
            return Ok(());
        }

        let family = store.create_family(name).map_err(|e| {
            KvdbError::EngineOperation(format!("Could not create DB {}: {}", name, e))
        })?;
        catalog.databases.insert(name.to_string(), family);

        info!(db = name, "DB created");
        Ok(())
    }

    /// Delete a database and all of its data
    ///
    /// Refused with `NamespaceInUse` while any handler on it is alive. The
    /// usage check and the drop happen under one lock hold, so no handler
    /// can be acquired in between.
    pub fn delete_db(&self, name: &str) -> Result<()> {
        let mut catalog = self.catalog.lock();
        let store = catalog.store()?;

        let count = catalog.registry.database_usage(name);
        if count > 0 {
            return Err(KvdbError::NamespaceInUse {
                name: name.to_string(),
                count,
            });
        }

        let family = catalog
            .databases
            .get(name)
            .cloned()
            .ok_or_else(|| KvdbError::NamespaceNotFound(name.to_string()))?;

        store.drop_family(&family).map_err(|e| {
            KvdbError::EngineOperation(format!("Could not remove the DB {}: {}", name, e))
        })?;
        catalog.databases.remove(name);

        info!(db = name, "DB deleted");
        Ok(())
    }

    pub fn exists_db(&self, name: &str) -> bool {
        self.catalog.lock().databases.contains_key(name)
    }

    /// Names of every database, sorted
    pub fn list_dbs(&self) -> Vec<String> {
        let catalog = self.catalog.lock();
        let mut names: Vec<String> = catalog.databases.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Get a handler on `db_name` for `scope_name`
    ///
    /// The handler counts as one use of the database until it is released
    /// or dropped.
    pub fn get_handler(&self, db_name: &str, scope_name: &str) -> Result<KvdbHandler> {
        let mut catalog = self.catalog.lock();
        catalog.store()?;

        let family = catalog
            .databases
            .get(db_name)
            .cloned()
            .ok_or_else(|| KvdbError::NamespaceNotFound(db_name.to_string()))?;

        catalog.registry.acquire(db_name, scope_name);

        Ok(KvdbHandler::new(
            family,
            db_name.to_string(),
            scope_name.to_string(),
            Arc::clone(&self.catalog),
        ))
    }

    /// Bulk-load a JSON object file into a database
    ///
    /// Each top-level key is written with its value serialized as compact
    /// JSON, in sorted key order. The load is not atomic: if a write fails,
    /// the keys written before it stay in the database.
    pub fn load_from_file(&self, db_name: &str, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let handler = self.get_handler(db_name, LOAD_SCOPE)?;

        if path.as_os_str().is_empty() {
            return Err(KvdbError::InvalidInput("The path is empty.".to_string()));
        }

        let contents = fs::read(path).map_err(|e| {
            KvdbError::InvalidInput(format!(
                "An error occurred while opening the file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let document: serde_json::Value = serde_json::from_slice(&contents).map_err(|e| {
            KvdbError::InvalidInput(format!(
                "An error occurred while parsing the JSON file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let entries = match document {
            serde_json::Value::Object(entries) => entries,
            _ => {
                return Err(KvdbError::InvalidInput(format!(
                    "An error occurred while parsing the JSON file '{}': JSON is not an object",
                    path.display()
                )))
            }
        };

        for (key, value) in &entries {
            handler.set_json(key, value).map_err(|e| {
                error!(db = db_name, key = %key, error = %e, "bulk load aborted");
                KvdbError::EngineOperation(format!(
                    "An error occurred while inserting data key {}: {}",
                    key, e
                ))
            })?;
        }

        info!(
            db = db_name,
            path = %path.display(),
            entries = entries.len(),
            "DB loaded from file"
        );
        Ok(())
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Databases in use → scopes using them → handler count
    pub fn usage_info(&self) -> BTreeMap<String, RefInfo> {
        self.catalog.lock().registry.usage_by_database()
    }

    /// Scopes holding handlers → databases they use → handler count
    pub fn scope_usage_info(&self) -> BTreeMap<String, RefInfo> {
        self.catalog.lock().registry.usage_by_scope()
    }

    /// Live handlers on one database
    pub fn database_usage(&self, name: &str) -> usize {
        self.catalog.lock().registry.database_usage(name)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn validate_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(KvdbError::InvalidInput(
                "DB name must not be empty".to_string(),
            ));
        }
        if name == DEFAULT_FAMILY {
            return Err(KvdbError::InvalidInput(format!(
                "DB name '{}' is reserved",
                DEFAULT_FAMILY
            )));
        }
        Ok(())
    }
}

impl Drop for KvdbManager {
    fn drop(&mut self) {
        if let Err(e) = self.finalize() {
            error!(error = %e, "failed to finalize KVDB manager on drop");
        }
    }
}

//! Engine Module
//!
//! The physical store: one directory holding any number of named column
//! families, each an independent LSM tree.
//!
//! ## Responsibilities
//! - Open/create the store and recover every family on startup
//! - Create and drop families, keeping the manifest durable
//! - Close all families on shutdown
//!
//! ## Layout
//! ```text
//! {store}/
//!   ├── MANIFEST
//!   └── families/
//!         ├── 000001/   (wal.log, sstables/)
//!         └── 000002/
//! ```

mod family;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::storage::Manifest;
use crate::KvdbError;

pub use family::ColumnFamily;

/// Name of the family every store carries for backward compatibility
pub const DEFAULT_FAMILY: &str = "default";

/// The physical store
pub struct Store {
    path: PathBuf,
    config: Config,
    inner: Mutex<StoreInner>,
}

struct StoreInner {
    manifest: Manifest,
    families: HashMap<String, Arc<ColumnFamily>>,
    closed: bool,
}

impl Store {
    const FAMILIES_DIR: &'static str = "families";

    /// Open or create the store at `config.store_path()`
    ///
    /// On startup:
    /// 1. Create the store directory if missing
    /// 2. Load the manifest
    /// 3. Remove family directories the manifest does not name
    /// 4. Open every family listed
    /// 5. Create the default family if the store lacks one
    pub fn open(config: &Config) -> Result<Self> {
        let path = config.store_path();
        let families_dir = path.join(Self::FAMILIES_DIR);
        fs::create_dir_all(&families_dir)?;

        let loaded = Manifest::load(&path)?;
        let mut dirty = loaded.is_none();
        let mut manifest = loaded.unwrap_or_default();

        Self::remove_orphans(&families_dir, &manifest)?;

        let mut families = HashMap::new();
        for (name, id) in &manifest.families {
            let family = ColumnFamily::open(name, *id, &Self::family_dir(&path, *id), config)?;
            families.insert(name.clone(), Arc::new(family));
        }

        if !manifest.contains(DEFAULT_FAMILY) {
            let id = manifest.allocate(DEFAULT_FAMILY);
            let family =
                ColumnFamily::open(DEFAULT_FAMILY, id, &Self::family_dir(&path, id), config)?;
            families.insert(DEFAULT_FAMILY.to_string(), Arc::new(family));
            dirty = true;
        }

        if dirty {
            manifest.persist(&path)?;
        }

        info!(
            path = %path.display(),
            families = families.len(),
            "opened store"
        );

        Ok(Self {
            path,
            config: config.clone(),
            inner: Mutex::new(StoreInner {
                manifest,
                families,
                closed: false,
            }),
        })
    }

    /// List the families of the store at `path` without opening it
    ///
    /// Empty when no store exists there.
    pub fn list_families(path: &Path) -> Result<Vec<String>> {
        Ok(Manifest::load(path)?
            .map(|manifest| manifest.names())
            .unwrap_or_default())
    }

    /// Every open family, the default one included
    pub fn families(&self) -> Vec<Arc<ColumnFamily>> {
        self.inner.lock().families.values().cloned().collect()
    }

    pub fn family(&self, name: &str) -> Option<Arc<ColumnFamily>> {
        self.inner.lock().families.get(name).cloned()
    }

    /// Create a new, empty family
    ///
    /// The directory is created before the manifest names it, so a crash in
    /// between leaves only an orphan that the next open removes.
    pub fn create_family(&self, name: &str) -> Result<Arc<ColumnFamily>> {
        let mut inner = self.inner.lock();
        Self::ensure_not_closed(&inner)?;

        if inner.manifest.contains(name) {
            return Err(KvdbError::Storage(format!(
                "column family '{}' already exists",
                name
            )));
        }

        let mut manifest = inner.manifest.clone();
        let id = manifest.allocate(name);
        let dir = Self::family_dir(&self.path, id);

        let family = Arc::new(ColumnFamily::open(name, id, &dir, &self.config)?);
        if let Err(e) = manifest.persist(&self.path) {
            family.mark_dropped();
            if let Err(cleanup) = fs::remove_dir_all(&dir) {
                warn!(
                    family = name,
                    path = %dir.display(),
                    error = %cleanup,
                    "could not delete unregistered family directory; it is removed on next open"
                );
            }
            return Err(e);
        }

        inner.manifest = manifest;
        inner.families.insert(name.to_string(), Arc::clone(&family));

        info!(family = name, id, "created column family");
        Ok(family)
    }

    /// Drop a family and delete its data
    ///
    /// If the manifest cannot be rewritten the family stays fully usable.
    pub fn drop_family(&self, family: &ColumnFamily) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::ensure_not_closed(&inner)?;

        match inner.manifest.families.get(family.name()) {
            Some(&id) if id == family.id() => {}
            _ => {
                return Err(KvdbError::Storage(format!(
                    "column family '{}' is not part of this store",
                    family.name()
                )))
            }
        }

        let mut manifest = inner.manifest.clone();
        manifest.remove(family.name());
        manifest.persist(&self.path)?;

        family.mark_dropped();
        inner.manifest = manifest;
        inner.families.remove(family.name());

        if let Err(e) = fs::remove_dir_all(family.dir()) {
            warn!(
                family = family.name(),
                error = %e,
                "could not delete dropped family directory; it is removed on next open"
            );
        }

        info!(family = family.name(), id = family.id(), "dropped column family");
        Ok(())
    }

    /// Flush and close every family. Closing twice does nothing.
    ///
    /// Every family gets a close attempt even if an earlier one fails; the
    /// first error is returned and the store stays open so the call can be
    /// retried.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Ok(());
        }

        let mut first_error = None;
        for family in inner.families.values() {
            if let Err(e) = family.close() {
                warn!(family = family.name(), error = %e, "could not close column family");
                first_error.get_or_insert(e);
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }
        inner.closed = true;

        info!(path = %self.path.display(), "closed store");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn ensure_not_closed(inner: &StoreInner) -> Result<()> {
        if inner.closed {
            return Err(KvdbError::Storage("store is closed".to_string()));
        }
        Ok(())
    }

    fn family_dir(store_path: &Path, id: u64) -> PathBuf {
        store_path.join(Self::FAMILIES_DIR).join(format!("{:06}", id))
    }

    fn remove_orphans(families_dir: &Path, manifest: &Manifest) -> Result<()> {
        let known: Vec<u64> = manifest.families.values().copied().collect();

        for entry in fs::read_dir(families_dir)? {
            let dir = entry?.path();
            let id = dir
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.parse::<u64>().ok());

            match id {
                Some(id) if known.contains(&id) => {}
                _ => {
                    warn!(path = %dir.display(), "removing orphaned family data");
                    if dir.is_dir() {
                        fs::remove_dir_all(&dir)?;
                    } else {
                        fs::remove_file(&dir)?;
                    }
                }
            }
        }

        Ok(())
    }
}

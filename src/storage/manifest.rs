//! Store Manifest
//!
//! The manifest is the durable list of column families in a store: family
//! name → numeric id. The id names the family's directory, so arbitrary
//! family names never touch the filesystem.
//!
//! ## File Format
//! ```text
//! [CRC32 of body (4)][Body length (4)][bincode(Manifest)]
//! ```
//! Rewrites go to `MANIFEST.tmp` and are renamed over `MANIFEST`.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::KvdbError;

use super::sstable::read_u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Id handed to the next created family
    pub next_family_id: u64,

    /// Family name → family id
    pub families: BTreeMap<String, u64>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            next_family_id: 1,
            families: BTreeMap::new(),
        }
    }
}

impl Manifest {
    pub const FILENAME: &'static str = "MANIFEST";

    pub fn path(store_dir: &Path) -> PathBuf {
        store_dir.join(Self::FILENAME)
    }

    /// Load the manifest of a store; `None` if the store has none yet
    pub fn load(store_dir: &Path) -> Result<Option<Self>> {
        let path = Self::path(store_dir);
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&path)?;
        if bytes.len() < 8 {
            return Err(KvdbError::Storage(format!(
                "manifest {} is truncated",
                path.display()
            )));
        }

        let crc = read_u32(&bytes[0..4]);
        let len = read_u32(&bytes[4..8]) as usize;
        let body = &bytes[8..];
        if body.len() != len || crc32fast::hash(body) != crc {
            return Err(KvdbError::Storage(format!(
                "manifest {} failed its checksum",
                path.display()
            )));
        }

        Ok(Some(bincode::deserialize(body)?))
    }

    /// Atomically replace the manifest on disk
    pub fn persist(&self, store_dir: &Path) -> Result<()> {
        let body = bincode::serialize(self)?;
        let tmp_path = store_dir.join(format!("{}.tmp", Self::FILENAME));

        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&crc32fast::hash(&body).to_le_bytes())?;
            file.write_all(&(body.len() as u32).to_le_bytes())?;
            file.write_all(&body)?;
            file.sync_all()?;
        }

        fs::rename(&tmp_path, Self::path(store_dir))?;
        Ok(())
    }

    /// Register a new family and return its id
    pub fn allocate(&mut self, name: &str) -> u64 {
        let id = self.next_family_id;
        self.next_family_id += 1;
        self.families.insert(name.to_string(), id);
        id
    }

    pub fn remove(&mut self, name: &str) -> Option<u64> {
        self.families.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.families.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.families.keys().cloned().collect()
    }
}

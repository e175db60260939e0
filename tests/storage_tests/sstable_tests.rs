//! Tests for SSTables, the StorageManager and the manifest
//!
//! These tests verify:
//! - Building and reading SSTables, tombstones included
//! - Checksum validation on open
//! - Newest-first lookups across flushes and rediscovery on reopen
//! - Manifest persistence

use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};

use kvdb::memtable::MemTable;
use kvdb::storage::{Manifest, SSTableBuilder, SSTableReader, StorageManager};
use kvdb::KvdbError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn memtable_with(entries: &[(&[u8], &[u8])]) -> MemTable {
    let memtable = MemTable::new();
    for (key, value) in entries {
        memtable.put(key.to_vec(), value.to_vec());
    }
    memtable
}

// =============================================================================
// SSTable Tests
// =============================================================================

#[test]
fn test_build_and_read() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("sstable_000001.sst");

    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"apple", b"red").unwrap();
    builder.add_tombstone(b"banana").unwrap();
    builder.add(b"cherry", b"dark").unwrap();
    let meta = builder.finish().unwrap();

    assert_eq!(meta.entry_count(), 3);
    assert!(meta.might_contain(b"b"));
    assert!(!meta.might_contain(b"zebra"));

    let reader = SSTableReader::open(&path).unwrap();
    assert_eq!(reader.get(b"apple").unwrap(), Some(b"red".to_vec()));
    assert_eq!(reader.get(b"banana").unwrap(), None);
    assert!(matches!(reader.get(b"blueberry"), Err(KvdbError::KeyNotFound)));
    assert_eq!(reader.min_key(), Some(&b"apple"[..]));
    assert_eq!(reader.max_key(), Some(&b"cherry"[..]));
}

#[test]
fn test_builder_rejects_unsorted_keys() {
    let temp = TempDir::new().unwrap();
    let mut builder = SSTableBuilder::new(&temp.path().join("t.sst")).unwrap();

    builder.add(b"b", b"1").unwrap();
    assert!(matches!(builder.add(b"a", b"2"), Err(KvdbError::Storage(_))));
}

#[test]
fn test_open_detects_data_corruption() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("sstable_000001.sst");

    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"key", b"value").unwrap();
    builder.finish().unwrap();

    {
        let mut file = OpenOptions::new().write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start(14 + 8)).unwrap(); // first key byte
        file.write_all(b"X").unwrap();
    }

    assert!(matches!(SSTableReader::open(&path), Err(KvdbError::Storage(_))));
}

// =============================================================================
// StorageManager Tests
// =============================================================================

#[test]
fn test_newest_sstable_wins() {
    let temp = TempDir::new().unwrap();
    let manager = StorageManager::open(temp.path()).unwrap();

    manager.flush(&memtable_with(&[(b"k", b"old"), (b"x", b"1")])).unwrap();
    manager.flush(&memtable_with(&[(b"k", b"new")])).unwrap();

    assert_eq!(manager.sstable_count(), 2);
    assert_eq!(manager.get(b"k").unwrap(), Some(b"new".to_vec()));
    assert_eq!(manager.get(b"x").unwrap(), Some(b"1".to_vec()));
    assert_eq!(manager.get(b"nope").unwrap(), None);
}

#[test]
fn test_tombstone_shadows_older_value() {
    let temp = TempDir::new().unwrap();
    let manager = StorageManager::open(temp.path()).unwrap();

    manager.flush(&memtable_with(&[(b"k", b"v")])).unwrap();
    let deletes = MemTable::new();
    deletes.delete(b"k".to_vec());
    manager.flush(&deletes).unwrap();

    assert_eq!(manager.get(b"k").unwrap(), None);
}

#[test]
fn test_reopen_rediscovers_and_skips_tmp_files() {
    let temp = TempDir::new().unwrap();
    {
        let manager = StorageManager::open(temp.path()).unwrap();
        manager.flush(&memtable_with(&[(b"a", b"1")])).unwrap();
        manager.flush(&memtable_with(&[(b"b", b"2")])).unwrap();
    }
    fs::write(temp.path().join("sstable_000003.tmp"), b"half written").unwrap();

    let manager = StorageManager::open(temp.path()).unwrap();

    assert_eq!(manager.sstable_count(), 2);
    assert_eq!(manager.next_sstable_id(), 3);
    assert_eq!(manager.get(b"a").unwrap(), Some(b"1".to_vec()));
    assert!(!temp.path().join("sstable_000003.tmp").exists());
}

#[test]
fn test_flush_empty_memtable_fails() {
    let temp = TempDir::new().unwrap();
    let manager = StorageManager::open(temp.path()).unwrap();

    assert!(matches!(manager.flush(&MemTable::new()), Err(KvdbError::Storage(_))));
}

// =============================================================================
// Manifest Tests
// =============================================================================

#[test]
fn test_manifest_round_trip_and_absence() {
    let temp = TempDir::new().unwrap();
    assert!(Manifest::load(temp.path()).unwrap().is_none());

    let mut manifest = Manifest::default();
    assert_eq!(manifest.allocate("default"), 1);
    assert_eq!(manifest.allocate("users"), 2);
    manifest.remove("users");
    manifest.persist(temp.path()).unwrap();

    let loaded = Manifest::load(temp.path()).unwrap().unwrap();
    assert_eq!(loaded, manifest);
    assert_eq!(loaded.next_family_id, 3);
    assert_eq!(loaded.names(), vec!["default".to_string()]);
}

#[test]
fn test_manifest_checksum_failure() {
    let temp = TempDir::new().unwrap();
    let mut manifest = Manifest::default();
    manifest.allocate("a");
    manifest.persist(temp.path()).unwrap();

    let path = Manifest::path(temp.path());
    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x55;
    fs::write(&path, bytes).unwrap();

    assert!(matches!(Manifest::load(temp.path()), Err(KvdbError::Storage(_))));
}

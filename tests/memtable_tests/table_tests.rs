//! MemTable Tests
//!
//! Tests verify:
//! - Basic put/get/delete
//! - Size tracking on insert and overwrite
//! - Sorted iteration and clear
//! - Concurrent readers alongside a writer

use std::sync::Arc;
use std::thread;

use kvdb::memtable::{MemTable, MemTableEntry};

#[test]
fn test_new_memtable_is_empty() {
    let memtable = MemTable::new();
    assert_eq!(memtable.entry_count(), 0);
    assert_eq!(memtable.size(), 0);
    assert!(memtable.is_empty());
}

#[test]
fn test_put_get_and_tombstone() {
    let memtable = MemTable::new();

    memtable.put(b"key1".to_vec(), b"value1".to_vec());
    assert_eq!(
        memtable.get(b"key1"),
        Some(MemTableEntry::Value(b"value1".to_vec()))
    );

    memtable.delete(b"key1".to_vec());
    assert_eq!(memtable.get(b"key1"), Some(MemTableEntry::Tombstone));
    assert_eq!(memtable.get(b"missing"), None);
}

#[test]
fn test_size_tracks_overwrites() {
    let memtable = MemTable::new();

    assert_eq!(memtable.put(b"key".to_vec(), b"12345".to_vec()), 8);
    // Key bytes are counted once; only the value delta applies
    assert_eq!(memtable.put(b"key".to_vec(), b"12".to_vec()), 5);
    assert_eq!(memtable.delete(b"key".to_vec()), 3);
    assert_eq!(memtable.put(b"k2".to_vec(), b"v".to_vec()), 6);
    assert_eq!(memtable.size(), 6);
}

#[test]
fn test_iter_is_sorted_and_clear_resets() {
    let memtable = MemTable::new();
    memtable.put(b"c".to_vec(), b"3".to_vec());
    memtable.put(b"a".to_vec(), b"1".to_vec());
    memtable.delete(b"b".to_vec());

    let keys: Vec<Vec<u8>> = memtable.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);

    memtable.clear();
    assert!(memtable.is_empty());
    assert_eq!(memtable.size(), 0);
}

#[test]
fn test_concurrent_readers_with_writer() {
    let memtable = Arc::new(MemTable::new());
    for i in 0..100 {
        memtable.put(format!("key{:03}", i).into_bytes(), b"v".to_vec());
    }

    let writer = {
        let memtable = Arc::clone(&memtable);
        thread::spawn(move || {
            for i in 100..200 {
                memtable.put(format!("key{:03}", i).into_bytes(), b"v".to_vec());
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let memtable = Arc::clone(&memtable);
            thread::spawn(move || {
                for i in 0..100 {
                    let key = format!("key{:03}", i).into_bytes();
                    assert_eq!(memtable.get(&key), Some(MemTableEntry::Value(b"v".to_vec())));
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(memtable.entry_count(), 200);
}

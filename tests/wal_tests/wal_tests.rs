//! Tests for the WAL
//!
//! These tests verify:
//! - LSN sequencing, including across reopen
//! - Reading back appended operations
//! - Recovery from torn tails and checksum failures
//! - Verify mode leaves the file untouched

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use kvdb::config::WalSyncStrategy;
use kvdb::wal::{Operation, WalEntry, WalReader, WalRecovery, WalWriter, HEADER_SIZE};
use kvdb::KvdbError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

fn put(key: &str, value: &str) -> Operation {
    Operation::Put {
        key: key.as_bytes().to_vec(),
        value: value.as_bytes().to_vec(),
    }
}

fn write_entries_via_writer(path: &PathBuf, count: usize) {
    let mut writer = WalWriter::open(path, WalSyncStrategy::EveryWrite).unwrap();
    for i in 0..count {
        writer
            .append(put(&format!("key{}", i), &format!("value{}", i)))
            .unwrap();
    }
}

// =============================================================================
// Writer Tests
// =============================================================================

#[test]
fn test_lsn_starts_at_one_and_increments() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    assert_eq!(writer.append(put("a", "1")).unwrap(), 1);
    assert_eq!(writer.append(put("b", "2")).unwrap(), 2);
    assert_eq!(writer.append(Operation::Delete { key: b"a".to_vec() }).unwrap(), 3);
    assert_eq!(writer.current_lsn(), 4);
}

#[test]
fn test_reopen_continues_lsn_sequence() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 3);

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.current_lsn(), 4);
    assert_eq!(writer.append(put("k", "v")).unwrap(), 4);

    let (entries, _) = WalRecovery::recover(&wal_path).unwrap();
    assert_eq!(entries.len(), 4);
}

#[test]
fn test_batched_sync_still_readable() {
    let (_temp, wal_path) = setup_temp_wal();
    {
        let mut writer =
            WalWriter::open(&wal_path, WalSyncStrategy::EveryNEntries { count: 10 }).unwrap();
        for i in 0..5 {
            writer.append(put(&format!("k{}", i), "v")).unwrap();
        }
    }

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();
    assert_eq!(entries.len(), 5);
    assert_eq!(result.last_lsn, 5);
}

#[test]
fn test_truncate_empties_log() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    writer.append(put("a", "1")).unwrap();
    writer.append(put("b", "2")).unwrap();

    writer.truncate().unwrap();

    assert_eq!(fs::metadata(&wal_path).unwrap().len(), 0);
    writer.append(put("c", "3")).unwrap();

    let (entries, _) = WalRecovery::recover(&wal_path).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].operation, put("c", "3"));
}

// =============================================================================
// Reader Tests
// =============================================================================

#[test]
fn test_reader_returns_operations_in_order() {
    let (_temp, wal_path) = setup_temp_wal();
    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        writer.append(put("k1", "v1")).unwrap();
        writer.append(Operation::Delete { key: b"k1".to_vec() }).unwrap();
    }

    let mut reader = WalReader::open(&wal_path).unwrap();
    let first = reader.next_entry().unwrap().unwrap();
    let second = reader.next_entry().unwrap().unwrap();

    assert_eq!(first.lsn, 1);
    assert_eq!(first.operation, put("k1", "v1"));
    assert_eq!(second.operation, Operation::Delete { key: b"k1".to_vec() });
    assert!(reader.next_entry().unwrap().is_none());
}

#[test]
fn test_reader_iterator_stops_at_corruption() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 2);
    {
        let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
        file.write_all(&[0xAB; 5]).unwrap();
    }

    let results: Vec<_> = WalReader::open(&wal_path).unwrap().entries().collect();

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[1].is_ok());
    assert!(matches!(results[2], Err(KvdbError::WalCorruption(_))));
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_recover_missing_file_is_empty() {
    let (_temp, wal_path) = setup_temp_wal();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert!(entries.is_empty());
    assert_eq!(result.entries_recovered, 0);
    assert!(!result.was_truncated);
}

#[test]
fn test_recover_truncates_partial_header() {
    let (_temp, wal_path) = setup_temp_wal();
    let good = WalEntry::new(1, put("k", "v")).serialize().unwrap();
    {
        let mut file = File::create(&wal_path).unwrap();
        file.write_all(&good).unwrap();
        file.write_all(&[0u8; HEADER_SIZE / 2]).unwrap();
    }

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(result.entries_corrupted, 1);
    assert!(result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), good.len() as u64);
}

#[test]
fn test_recover_stops_at_checksum_mismatch() {
    let (_temp, wal_path) = setup_temp_wal();
    let first = WalEntry::new(1, put("a", "1")).serialize().unwrap();
    let mut second = WalEntry::new(2, put("b", "2")).serialize().unwrap();
    let last = second.len() - 1;
    second[last] ^= 0xFF;
    {
        let mut file = File::create(&wal_path).unwrap();
        file.write_all(&first).unwrap();
        file.write_all(&second).unwrap();
    }

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(result.last_lsn, 1);
    assert_eq!(result.entries_corrupted, 1);
    assert!(result.was_truncated);
}

#[test]
fn test_verify_does_not_modify_file() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 2);
    {
        let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
        file.write_all(&[1, 2, 3]).unwrap();
    }
    let len_before = fs::metadata(&wal_path).unwrap().len();

    let result = WalRecovery::verify(&wal_path).unwrap();

    assert_eq!(result.entries_recovered, 2);
    assert_eq!(result.entries_corrupted, 1);
    assert!(!result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), len_before);
}

#[test]
fn test_writer_refuses_corrupted_tail() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 1);
    {
        let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
        file.write_all(&[9; 4]).unwrap();
    }

    let result = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite);
    assert!(matches!(result, Err(KvdbError::WalCorruption(_))));

    WalRecovery::recover(&wal_path).unwrap();
    let writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.current_lsn(), 2);
}

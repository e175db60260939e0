//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::Result;
use crate::KvdbError;

use super::entry::FrameHeader;
use super::{WalEntry, HEADER_SIZE};

/// Upper bound on a single encoded entry; anything larger is a corrupt length
const MAX_BODY_SIZE: u32 = 256 * 1024 * 1024;

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,
    /// Offset just past the last entry successfully read
    position: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// Returns:
    /// - `Ok(Some(entry))`: a valid entry
    /// - `Ok(None)`: clean end of log
    /// - `Err(WalCorruption)`: torn write or checksum failure at `position()`
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        let read = read_fully(&mut self.reader, &mut header_bytes)?;
        if read == 0 {
            return Ok(None);
        }
        if read < HEADER_SIZE {
            return Err(KvdbError::WalCorruption(format!(
                "partial header at offset {} ({} of {} bytes)",
                self.position, read, HEADER_SIZE
            )));
        }

        let header = FrameHeader::parse(&header_bytes);
        if header.len > MAX_BODY_SIZE {
            return Err(KvdbError::WalCorruption(format!(
                "implausible entry length {} at offset {}",
                header.len, self.position
            )));
        }

        let mut body = vec![0u8; header.len as usize];
        let read = read_fully(&mut self.reader, &mut body)?;
        if read < body.len() {
            return Err(KvdbError::WalCorruption(format!(
                "partial entry at offset {} ({} of {} bytes)",
                self.position,
                read,
                body.len()
            )));
        }

        let entry = WalEntry::deserialize(&header, &body)?;
        self.position += (HEADER_SIZE + body.len()) as u64;
        Ok(Some(entry))
    }

    /// Offset just past the last valid entry read so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Iterate over all valid entries; stops after the first error
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }
}

/// Iterator over WAL entries
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Read until `buf` is full or EOF; returns bytes read
fn read_fully(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

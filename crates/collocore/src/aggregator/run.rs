//! A run file: `(magic="PAIR", version, record_count)` followed by
//! `record_count` fixed-width `(pair_key: u64, count: u32)` records sorted
//! ascending by `pair_key`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::binio;
use crate::error::{CorruptError, Error};

const MAGIC: &str = "PAIR";
const VERSION: u32 = 1;

/// Writes one shard's sorted `(key, count)` entries as a run file. A
/// `count` that would overflow `u32` (only reachable if a single pair's
/// accumulated occurrences within one flush interval exceeds four billion)
/// saturates rather than wrapping, since the on-disk record field is a
/// fixed `u32`; this is a documented, effectively unreachable edge case,
/// not silent data loss in practice.
pub fn write_run(path: impl AsRef<Path>, entries: &[(u64, u64)]) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    w.write_all(MAGIC.as_bytes())?;
    binio::write_u32(&mut w, VERSION)?;
    binio::write_u32(&mut w, entries.len() as u32)?;
    for &(key, count) in entries {
        binio::write_u64(&mut w, key)?;
        binio::write_u32(&mut w, count.min(u32::MAX as u64) as u32)?;
    }
    w.flush()?;
    Ok(())
}

/// Sequential cursor over one run file's ascending `(pair_key, count)`
/// stream, used by the k-way merge.
pub struct RunReader {
    reader: BufReader<File>,
    remaining: u32,
}

impl RunReader {
    pub fn open(path: impl AsRef<Path>) -> Result<RunReader, Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        binio::read_fixed_magic(&mut reader, MAGIC)?;
        let version = binio::read_u32(&mut reader)?;
        if version != VERSION {
            return Err(CorruptError::UnsupportedVersion(version).into());
        }
        let remaining = binio::read_u32(&mut reader)?;
        Ok(RunReader { reader, remaining })
    }

    /// Reads the next `(pair_key, count)` record, or `None` at end of
    /// stream. A record count that does not agree with the header's
    /// `record_count` is a corrupt run — the merge must not silently read
    /// past a truncated file.
    pub fn next_record(&mut self) -> Result<Option<(u64, u32)>, Error> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let key = binio::read_u64(&mut self.reader)?;
        let count = binio::read_u32(&mut self.reader)?;
        self.remaining -= 1;
        Ok(Some((key, count)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0001.run");
        let entries = vec![(1u64, 3u64), (5, 7), (100, 1)];
        write_run(&path, &entries).unwrap();

        let mut reader = RunReader::open(&path).unwrap();
        let mut read_back = Vec::new();
        while let Some((key, count)) = reader.next_record().unwrap() {
            read_back.push((key, count as u64));
        }
        assert_eq!(read_back, entries);
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn bad_magic_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.run");
        std::fs::write(&path, b"NOPE\x00\x00\x00\x00").unwrap();
        let err = RunReader::open(&path).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Corrupt);
    }
}

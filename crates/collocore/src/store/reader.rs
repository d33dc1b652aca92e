//! Opens the store file read-only, keeps an in-memory
//! `head_lemma → data_offset` map built once from the key-index section,
//! and decodes a single entry lazily from the mmap on each `get` — O(1)
//! effective lookup, no I/O beyond page faults.

use std::collections::HashMap;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use memmap2::Mmap;

use crate::binio;
use crate::entry::CollocationEntry;
use crate::error::{CorruptError, Error, PreconditionError, ResourceError};
use crate::fingerprint::Fingerprint;

use super::format::{self, StoreHeader};

/// Immutable once constructed: every `get`/`has` call only reads, so many
/// threads may call them concurrently without any locking.
pub struct StoreReader {
    mmap: Mmap,
    header: StoreHeader,
    index: HashMap<String, u64>,
}

impl StoreReader {
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn open(path: impl AsRef<Path>, expected: Option<Fingerprint>) -> Result<StoreReader, Error> {
        let path = path.as_ref();
        let file = File::open(path)?;
        // Safety: the store file is produced by `StoreWriter` via
        // fsync-then-atomic-rename, so once `File::open` succeeds the
        // content observed through the mapping is a complete, immutable
        // snapshot; nothing else in this process writes to it.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| ResourceError::Mmap(e.to_string()))?;

        let header = format::read_header(&mut Cursor::new(&mmap[..]))?;
        if let Some(expected) = expected {
            if !expected.matches(&header.fingerprint) {
                return Err(PreconditionError::FingerprintMismatch {
                    store: header.fingerprint.build_uuid.to_string(),
                    lexicon: expected.build_uuid.to_string(),
                }
                .into());
            }
        }

        let index = read_key_index(&mmap, &header)?;
        Ok(StoreReader { mmap, header, index })
    }

    pub fn header(&self) -> &StoreHeader {
        &self.header
    }

    pub fn has(&self, head_lemma: &str) -> bool {
        self.index.contains_key(&head_lemma.to_lowercase())
    }

    /// Case-folds `head_lemma`, looks up its offset, and decodes one entry
    /// from the mmap. `Ok(None)` means the key is absent; `Err` means the
    /// bytes at a known-good offset failed to decode, which is always a
    /// `Corrupt` error — a missing key is never conflated with a decode
    /// failure.
    pub fn get(&self, head_lemma: &str) -> Result<Option<CollocationEntry>, Error> {
        let Some(&offset) = self.index.get(&head_lemma.to_lowercase()) else {
            return Ok(None);
        };
        if offset >= self.mmap.len() as u64 {
            return Err(CorruptError::OffsetOutOfBounds { offset, len: self.mmap.len() as u64 }.into());
        }
        let mut cursor = Cursor::new(&self.mmap[offset as usize..]);
        let entry = format::read_entry(&mut cursor)?;
        Ok(Some(entry))
    }
}

fn read_key_index(mmap: &Mmap, header: &StoreHeader) -> Result<HashMap<String, u64>, Error> {
    let offset = header.key_index_offset as usize;
    if offset > mmap.len() {
        return Err(CorruptError::OffsetOutOfBounds {
            offset: header.key_index_offset,
            len: mmap.len() as u64,
        }
        .into());
    }
    let mut cursor = Cursor::new(&mmap[offset..]);
    let bucket_count = binio::read_u32(&mut cursor)? as usize;
    let mut index = HashMap::with_capacity(bucket_count);
    let mut previous: Option<String> = None;
    for i in 0..bucket_count {
        let lemma = binio::read_str_u16(&mut cursor)?;
        let data_offset = binio::read_u64(&mut cursor)?;
        if let Some(prev) = &previous {
            if prev >= &lemma {
                return Err(CorruptError::KeyIndexNotSorted(i).into());
            }
        }
        previous = Some(lemma.clone());
        index.insert(lemma, data_offset);
    }
    Ok(index)
}

//! Writes a single-file, memory-mappable, append-free collocation store,
//! fsyncing before an atomic rename into place so readers never observe
//! a partially written file.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use crate::binio;
use crate::entry::CollocationEntry;
use crate::error::Error;
use crate::fingerprint::Fingerprint;

use super::format::{self, StoreHeader, HEADER_LEN};

pub struct StoreWriter {
    window: u32,
    top_k: u32,
    total_corpus_tokens: u64,
    fingerprint: Fingerprint,
}

impl StoreWriter {
    pub fn new(window: u32, top_k: u32, total_corpus_tokens: u64, fingerprint: Fingerprint) -> Self {
        StoreWriter { window, top_k, total_corpus_tokens, fingerprint }
    }

    /// Streams `entries` (in any order — they are re-sorted by
    /// `head_lemma` for the key index) into `path`, via a temp file
    /// fsynced and atomically renamed into place.
    #[tracing::instrument(level = "info", skip_all)]
    pub fn write(
        &self,
        path: impl AsRef<Path>,
        entries: impl IntoIterator<Item = CollocationEntry>,
    ) -> Result<(), Error> {
        let path = path.as_ref();
        let tmp_path = path.with_extension("tmp");

        let file = File::create(&tmp_path)?;
        let mut w = BufWriter::new(file);

        // Placeholder header; key_index_offset and entry_count get patched
        // in once both are known.
        let placeholder = StoreHeader {
            entry_count: 0,
            window: self.window,
            top_k: self.top_k,
            total_corpus_tokens: self.total_corpus_tokens,
            fingerprint: self.fingerprint,
            key_index_offset: 0,
        };
        format::write_header(&mut w, &placeholder)?;

        let mut offsets: Vec<(String, u64)> = Vec::new();
        let mut entry_count = 0u32;
        let mut cursor = HEADER_LEN;
        for entry in entries {
            if entry.collocates.is_empty() {
                // A head with no surviving collocates is simply omitted.
                continue;
            }
            offsets.push((entry.head_lemma.clone(), cursor));
            let mut buf = Vec::new();
            format::write_entry(&mut buf, &entry)?;
            w.write_all(&buf)?;
            cursor += buf.len() as u64;
            entry_count += 1;
        }

        let key_index_offset = cursor;
        offsets.sort_by(|a, b| a.0.cmp(&b.0));
        binio::write_u32(&mut w, offsets.len() as u32)?;
        for (lemma, offset) in &offsets {
            binio::write_str_u16(&mut w, lemma)?;
            binio::write_u64(&mut w, *offset)?;
        }
        w.flush()?;

        let mut file = w.into_inner().map_err(|e| e.into_error())?;
        file.seek(SeekFrom::Start(0))?;
        let header = StoreHeader {
            entry_count,
            window: self.window,
            top_k: self.top_k,
            total_corpus_tokens: self.total_corpus_tokens,
            fingerprint: self.fingerprint,
            key_index_offset,
        };
        format::write_header(&mut file, &header)?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

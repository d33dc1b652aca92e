//! The on-disk layout and its (de)serialization primitives, shared by the
//! writer and the reader so the two never drift apart.
//!
//! ```text
//! magic(4) version(4) entry_count(4) window(4) top_k(4)
//! total_corpus_tokens(8) fingerprint(40) key_index_offset(8)
//! [entry]* [key index]
//! ```

use std::io::{Read, Write};

use crate::binio;
use crate::entry::{CollocateRecord, CollocationEntry};
use crate::error::Error;
use crate::fingerprint::Fingerprint;

pub const MAGIC: &str = "COLL";
pub const VERSION: u32 = 1;
/// `magic(4) + version(4) + entry_count(4) + window(4) + top_k(4) +
/// total_corpus_tokens(8) + fingerprint(40) + key_index_offset(8)`.
pub const HEADER_LEN: u64 = 4 + 4 + 4 + 4 + 4 + 8 + 40 + 8;

#[derive(Debug, Clone, Copy)]
pub struct StoreHeader {
    pub entry_count: u32,
    pub window: u32,
    pub top_k: u32,
    pub total_corpus_tokens: u64,
    pub fingerprint: Fingerprint,
    pub key_index_offset: u64,
}

pub fn write_header(w: &mut impl Write, header: &StoreHeader) -> Result<(), Error> {
    w.write_all(MAGIC.as_bytes())?;
    binio::write_u32(w, VERSION)?;
    binio::write_u32(w, header.entry_count)?;
    binio::write_u32(w, header.window)?;
    binio::write_u32(w, header.top_k)?;
    binio::write_u64(w, header.total_corpus_tokens)?;
    w.write_all(&header.fingerprint.to_bytes())?;
    binio::write_u64(w, header.key_index_offset)?;
    Ok(())
}

pub fn read_header(r: &mut impl Read) -> Result<StoreHeader, Error> {
    binio::read_fixed_magic(r, MAGIC)?;
    let version = binio::read_u32(r)?;
    if version != VERSION {
        return Err(crate::error::CorruptError::UnsupportedVersion(version).into());
    }
    let entry_count = binio::read_u32(r)?;
    let window = binio::read_u32(r)?;
    let top_k = binio::read_u32(r)?;
    let total_corpus_tokens = binio::read_u64(r)?;
    let mut fp_bytes = [0u8; 40];
    r.read_exact(&mut fp_bytes)?;
    let fingerprint = Fingerprint::from_bytes(&fp_bytes).ok_or(
        crate::error::CorruptError::TruncatedRecord { context: "fingerprint", needed: 40, had: 0 },
    )?;
    let key_index_offset = binio::read_u64(r)?;
    Ok(StoreHeader { entry_count, window, top_k, total_corpus_tokens, fingerprint, key_index_offset })
}

pub fn write_entry(w: &mut impl Write, entry: &CollocationEntry) -> Result<(), Error> {
    binio::write_str_u16(w, &entry.head_lemma)?;
    binio::write_u64(w, entry.head_total_freq)?;
    binio::write_u16(w, entry.collocates.len() as u16)?;
    for coll in &entry.collocates {
        binio::write_str_u8(w, &coll.coll_lemma, false)?;
        binio::write_str_u8(w, &coll.coll_pos, true)?;
        binio::write_u64(w, coll.cooccurrence)?;
        binio::write_u64(w, coll.coll_total_freq)?;
        binio::write_f32(w, coll.log_dice)?;
    }
    Ok(())
}

pub fn read_entry(r: &mut impl Read) -> Result<CollocationEntry, Error> {
    let head_lemma = binio::read_str_u16(r)?;
    let head_total_freq = binio::read_u64(r)?;
    let coll_count = binio::read_u16(r)? as usize;
    let mut collocates = Vec::with_capacity(coll_count);
    for _ in 0..coll_count {
        let coll_lemma = binio::read_str_u8(r)?;
        let coll_pos = binio::read_str_u8(r)?;
        let cooccurrence = binio::read_u64(r)?;
        let coll_total_freq = binio::read_u64(r)?;
        let log_dice = binio::read_f32(r)?;
        collocates.push(CollocateRecord { coll_lemma, coll_pos, cooccurrence, coll_total_freq, log_dice });
    }
    Ok(CollocationEntry { head_lemma, head_total_freq, collocates })
}

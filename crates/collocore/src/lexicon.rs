//! Assigns dense ids to lemmas, tracks frequency and dominant POS, and
//! persists the result to a companion file. The shape is a monotonic
//! growth phase followed by an immutable phase: [`LexiconBuilder`] is the
//! mutable phase, [`Lexicon`] is the finalized, read-only phase, and
//! `LexiconBuilder::finalize` is the one-way transition between them.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::binio;
use crate::error::{CorruptError, Error, PreconditionError};
use crate::fingerprint::Fingerprint;

pub type LemmaId = u32;

/// Reserved id meaning "no such lemma in the finalized lexicon". Never a
/// valid id; `0` is a perfectly ordinary valid id.
pub const UNKNOWN_LEMMA_ID: LemmaId = u32::MAX;

const MAGIC: &str = "LEXC";
const VERSION: u32 = 1;

struct BuilderInner {
    ids: HashMap<String, LemmaId>,
    lemmas: Vec<String>,
    freq: Vec<u64>,
    pos_tally: Vec<HashMap<String, u64>>,
}

/// Single-writer, mutex-protected growth phase. `assign_or_get` is the only
/// hot path many concurrent indexer threads call; the vocabulary saturates
/// quickly, so a new-lemma insert becomes rare after the first pass over a
/// corpus, making one mutex around the whole map an acceptable design
/// rather than a bottleneck.
pub struct LexiconBuilder {
    inner: Mutex<BuilderInner>,
}

impl Default for LexiconBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LexiconBuilder {
    pub fn new() -> Self {
        LexiconBuilder {
            inner: Mutex::new(BuilderInner {
                ids: HashMap::new(),
                lemmas: Vec::new(),
                freq: Vec::new(),
                pos_tally: Vec::new(),
            }),
        }
    }

    /// Case-folds `lemma`, returning its id (assigning a fresh one on first
    /// sight). Idempotent across repeated calls with the same lemma.
    pub fn assign_or_get(&self, lemma: &str) -> LemmaId {
        let folded = lemma.to_lowercase();
        let mut inner = self.inner.lock().unwrap();
        if let Some(&id) = inner.ids.get(&folded) {
            return id;
        }
        let id = inner.lemmas.len() as LemmaId;
        inner.lemmas.push(folded.clone());
        inner.freq.push(0);
        inner.pos_tally.push(HashMap::new());
        inner.ids.insert(folded, id);
        id
    }

    pub fn increment(&self, id: LemmaId, pos_tag: &str) {
        let mut inner = self.inner.lock().unwrap();
        let idx = id as usize;
        inner.freq[idx] += 1;
        *inner.pos_tally[idx].entry(pos_tag.to_string()).or_insert(0) += 1;
    }

    /// Consumes the builder, resolving the per-id dominant POS tally (ties
    /// broken by lexicographically smallest tag, for determinism) and
    /// binding the result to `fingerprint`.
    #[tracing::instrument(level = "info", skip_all)]
    pub fn finalize(self, fingerprint: Fingerprint) -> Lexicon {
        let inner = self.inner.into_inner().unwrap();
        let dominant_pos = inner
            .pos_tally
            .into_iter()
            .map(|tally| {
                tally
                    .into_iter()
                    .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
                    .map(|(tag, _)| tag)
                    .unwrap_or_default()
            })
            .collect();
        Lexicon {
            fingerprint,
            lemmas: inner.lemmas,
            freq: inner.freq,
            dominant_pos,
            ids: inner.ids,
        }
    }
}

/// Immutable, finalized lexicon: `id` is an index into parallel vectors.
#[derive(Debug, Clone)]
pub struct Lexicon {
    fingerprint: Fingerprint,
    lemmas: Vec<String>,
    freq: Vec<u64>,
    dominant_pos: Vec<String>,
    ids: HashMap<String, LemmaId>,
}

impl Lexicon {
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn len(&self) -> usize {
        self.lemmas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lemmas.is_empty()
    }

    pub fn resolve(&self, lemma: &str) -> Option<LemmaId> {
        self.ids.get(&lemma.to_lowercase()).copied()
    }

    /// Like [`Lexicon::resolve`], but returns [`UNKNOWN_LEMMA_ID`] instead
    /// of `None`. Callers building pair observations must use this (never
    /// `.unwrap_or(0)`) so an unresolved lemma is distinguishable from the
    /// perfectly valid id `0`.
    pub fn resolve_or_unknown(&self, lemma: &str) -> LemmaId {
        self.resolve(lemma).unwrap_or(UNKNOWN_LEMMA_ID)
    }

    pub fn get_freq(&self, id: LemmaId) -> u64 {
        self.freq.get(id as usize).copied().unwrap_or(0)
    }

    pub fn get_lemma(&self, id: LemmaId) -> Option<&str> {
        self.lemmas.get(id as usize).map(String::as_str)
    }

    pub fn get_dominant_pos(&self, id: LemmaId) -> Option<&str> {
        self.dominant_pos.get(id as usize).map(String::as_str)
    }

    /// Writes `magic, version, entry_count, fingerprint`, then the
    /// `(lemma, freq, dominant_pos)` records in id order, then a
    /// lex-ascending `lemma → id` key index — the same shape as the
    /// collocation store, minus the mmap-friendly offset table.
    #[tracing::instrument(level = "info", skip_all)]
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        let tmp_path = path.with_extension("tmp");
        {
            let file = File::create(&tmp_path)?;
            let mut w = BufWriter::new(file);

            w.write_all(MAGIC.as_bytes())?;
            binio::write_u32(&mut w, VERSION)?;
            binio::write_u32(&mut w, self.lemmas.len() as u32)?;
            w.write_all(&self.fingerprint.to_bytes())?;

            for id in 0..self.lemmas.len() {
                binio::write_str_u16(&mut w, &self.lemmas[id])?;
                binio::write_u64(&mut w, self.freq[id])?;
                binio::write_str_u8(&mut w, &self.dominant_pos[id], true)?;
            }

            let mut sorted: Vec<(&str, LemmaId)> =
                self.ids.iter().map(|(k, &v)| (k.as_str(), v)).collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            binio::write_u32(&mut w, sorted.len() as u32)?;
            for (lemma, id) in sorted {
                binio::write_str_u16(&mut w, lemma)?;
                binio::write_u32(&mut w, id)?;
            }
            w.flush()?;
        }
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Opens and fully decodes a lexicon file, refusing it if its
    /// fingerprint does not match `expected` (pass `None` to skip the
    /// check, e.g. while building a lexicon with no paired store yet).
    pub fn open(path: impl AsRef<Path>, expected: Option<Fingerprint>) -> Result<Lexicon, Error> {
        let file = File::open(path.as_ref())?;
        let mut r = BufReader::new(file);

        binio::read_fixed_magic(&mut r, MAGIC)?;
        let version = binio::read_u32(&mut r)?;
        if version != VERSION {
            return Err(CorruptError::UnsupportedVersion(version).into());
        }
        let entry_count = binio::read_u32(&mut r)? as usize;
        let mut fp_bytes = [0u8; 40];
        r.read_exact(&mut fp_bytes)?;
        let fingerprint = Fingerprint::from_bytes(&fp_bytes).ok_or(CorruptError::TruncatedRecord {
            context: "fingerprint",
            needed: 40,
            had: 0,
        })?;

        if let Some(expected) = expected {
            if !expected.matches(&fingerprint) {
                return Err(PreconditionError::FingerprintMismatch {
                    store: expected.build_uuid.to_string(),
                    lexicon: fingerprint.build_uuid.to_string(),
                }
                .into());
            }
        }

        let mut lemmas = Vec::with_capacity(entry_count);
        let mut freq = Vec::with_capacity(entry_count);
        let mut dominant_pos = Vec::with_capacity(entry_count);
        for _ in 0..entry_count {
            lemmas.push(binio::read_str_u16(&mut r)?);
            freq.push(binio::read_u64(&mut r)?);
            dominant_pos.push(binio::read_str_u8(&mut r)?);
        }

        let bucket_count = binio::read_u32(&mut r)? as usize;
        let mut ids = HashMap::with_capacity(bucket_count);
        let mut previous: Option<String> = None;
        for i in 0..bucket_count {
            let lemma = binio::read_str_u16(&mut r)?;
            let id = binio::read_u32(&mut r)?;
            if let Some(prev) = &previous {
                if prev >= &lemma {
                    return Err(CorruptError::KeyIndexNotSorted(i).into());
                }
            }
            previous = Some(lemma.clone());
            ids.insert(lemma, id);
        }

        Ok(Lexicon { fingerprint, lemmas, freq, dominant_pos, ids })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_or_get_is_idempotent() {
        let builder = LexiconBuilder::new();
        let a = builder.assign_or_get("Dog");
        let b = builder.assign_or_get("dog");
        assert_eq!(a, b);
        let c = builder.assign_or_get("cat");
        assert_ne!(a, c);
    }

    #[test]
    fn unknown_lemma_never_resolves_to_id_zero() {
        let builder = LexiconBuilder::new();
        builder.assign_or_get("dog");
        let lexicon = builder.finalize(Fingerprint::new(b"cfg"));
        assert_eq!(lexicon.resolve("cat"), None);
        assert_eq!(lexicon.resolve_or_unknown("cat"), UNKNOWN_LEMMA_ID);
        assert_ne!(UNKNOWN_LEMMA_ID, 0);
    }

    #[test]
    fn dominant_pos_is_the_most_frequent_tag() {
        let builder = LexiconBuilder::new();
        let id = builder.assign_or_get("runs");
        builder.increment(id, "VBZ");
        builder.increment(id, "VBZ");
        builder.increment(id, "NNS");
        let lexicon = builder.finalize(Fingerprint::new(b"cfg"));
        assert_eq!(lexicon.get_dominant_pos(id), Some("VBZ"));
        assert_eq!(lexicon.get_freq(id), 3);
    }

    #[test]
    fn write_then_open_round_trips() {
        let builder = LexiconBuilder::new();
        let dog = builder.assign_or_get("dog");
        builder.increment(dog, "NN");
        let cat = builder.assign_or_get("cat");
        builder.increment(cat, "NN");
        builder.increment(cat, "NN");
        let fingerprint = Fingerprint::new(b"cfg");
        let lexicon = builder.finalize(fingerprint);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lexicon.bin");
        lexicon.write(&path).unwrap();

        let reopened = Lexicon::open(&path, Some(fingerprint)).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.resolve("dog"), Some(dog));
        assert_eq!(reopened.get_freq(cat), 2);
        assert_eq!(reopened.get_dominant_pos(cat), Some("NN"));
    }

    #[test]
    fn mismatched_fingerprint_is_refused() {
        let builder = LexiconBuilder::new();
        builder.assign_or_get("dog");
        let lexicon = builder.finalize(Fingerprint::new(b"cfg"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lexicon.bin");
        lexicon.write(&path).unwrap();

        let other = Fingerprint::new(b"different cfg");
        let err = Lexicon::open(&path, Some(other)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Precondition);
    }
}

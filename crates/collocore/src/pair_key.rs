//! The 64-bit pair key: `(head_id << 32) | coll_id`. Sorting by this key
//! groups all pairs of one head contiguously and, within one head, groups
//! by collocate contiguously — the sort order the aggregator's run files
//! and the merger both rely on.

use crate::lexicon::LemmaId;

pub fn pair_key(head_id: LemmaId, coll_id: LemmaId) -> u64 {
    ((head_id as u64) << 32) | coll_id as u64
}

pub fn split_pair_key(key: u64) -> (LemmaId, LemmaId) {
    ((key >> 32) as LemmaId, (key & 0xFFFF_FFFF) as LemmaId)
}

pub fn head_id_of(key: u64) -> LemmaId {
    (key >> 32) as LemmaId
}

/// `14 + log2(2·f(A,B) / (f(A) + f(B)))`. The `14` is part of the on-disk
/// contract and must never change independently of the format version.
/// Computed in `f64` then narrowed to `f32` at the call site.
pub fn log_dice(head_freq: u64, coll_freq: u64, cooccurrence: u64) -> f64 {
    debug_assert!(cooccurrence > 0, "a pair with zero cooccurrence must never be emitted");
    14.0 + (2.0 * cooccurrence as f64 / (head_freq as f64 + coll_freq as f64)).log2()
}

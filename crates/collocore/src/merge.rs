//! Per shard, k-way merges sorted runs by pair key, groups by head,
//! filters by thresholds, computes logDice, and keeps the top-K
//! collocates per head.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::aggregator::RunReader;
use crate::entry::{CollocateRecord, CollocationEntry};
use crate::error::Error;
use crate::lexicon::Lexicon;
use crate::pair_key::{head_id_of, log_dice, split_pair_key};

#[derive(Debug, Clone, Copy)]
pub struct MergeParams {
    pub min_head_freq: u64,
    pub min_cooc: u64,
    pub top_k: usize,
}

struct HeapItem {
    key: u64,
    count: u32,
    stream: usize,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
impl Eq for HeapItem {}
impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse `key` to get a min-heap on pair-key.
        other.key.cmp(&self.key)
    }
}
impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Pull-based k-way merge over a shard's run files, summing counts across
/// every stream that currently holds the smallest pending pair key.
pub struct RunMerger {
    streams: Vec<RunReader>,
    heap: BinaryHeap<HeapItem>,
}

impl RunMerger {
    pub fn new(mut streams: Vec<RunReader>) -> Result<Self, Error> {
        let mut heap = BinaryHeap::with_capacity(streams.len());
        for (idx, stream) in streams.iter_mut().enumerate() {
            if let Some((key, count)) = stream.next_record()? {
                heap.push(HeapItem { key, count, stream: idx });
            }
        }
        Ok(RunMerger { streams, heap })
    }

    /// Pops the next distinct pair-key and its summed count across every
    /// stream currently holding that key, refilling each exhausted slot
    /// from its stream.
    fn next_aggregated(&mut self) -> Result<Option<(u64, u64)>, Error> {
        let Some(first) = self.heap.pop() else { return Ok(None) };
        let key = first.key;
        let mut total = first.count as u64;
        self.refill(first.stream)?;

        while let Some(top) = self.heap.peek() {
            if top.key != key {
                break;
            }
            let item = self.heap.pop().unwrap();
            total += item.count as u64;
            self.refill(item.stream)?;
        }
        Ok(Some((key, total)))
    }

    fn refill(&mut self, stream: usize) -> Result<(), Error> {
        if let Some((key, count)) = self.streams[stream].next_record()? {
            self.heap.push(HeapItem { key, count, stream });
        }
        Ok(())
    }
}

/// Consumes `merger`'s merged `(pair_key, count)` stream, grouping runs of
/// equal `head_id`, scoring each head's survivors, and invoking `emit` for
/// every [`CollocationEntry`] that survives thresholds. A head flush
/// occurs whenever the merged stream's `head_id` advances.
#[tracing::instrument(level = "debug", skip_all)]
pub fn merge_shard(
    mut merger: RunMerger,
    lexicon: &Lexicon,
    params: MergeParams,
    mut emit: impl FnMut(CollocationEntry),
) -> Result<(), Error> {
    let mut current_head: Option<u32> = None;
    let mut buffer: Vec<(u32, u64)> = Vec::new();

    while let Some((key, count)) = merger.next_aggregated()? {
        let head = head_id_of(key);
        if current_head != Some(head) {
            if let Some(prev_head) = current_head {
                flush_head(prev_head, &buffer, lexicon, params, &mut emit);
            }
            buffer.clear();
            current_head = Some(head);
        }
        let (_, coll_id) = split_pair_key(key);
        buffer.push((coll_id, count));
    }
    if let Some(prev_head) = current_head {
        flush_head(prev_head, &buffer, lexicon, params, &mut emit);
    }
    Ok(())
}

fn flush_head(
    head_id: u32,
    buffer: &[(u32, u64)],
    lexicon: &Lexicon,
    params: MergeParams,
    emit: &mut impl FnMut(CollocationEntry),
) {
    let head_freq = lexicon.get_freq(head_id);
    if head_freq < params.min_head_freq {
        return;
    }
    let Some(head_lemma) = lexicon.get_lemma(head_id) else { return };

    // Bounded min-heap of size top_k, keyed by `(-log_dice, coll_lemma)` so
    // the worst survivor is always at the top and easy to evict.
    let mut heap: BinaryHeap<ScoredCandidate> = BinaryHeap::with_capacity(params.top_k + 1);
    for &(coll_id, cooc) in buffer {
        if cooc < params.min_cooc {
            continue;
        }
        let coll_freq = lexicon.get_freq(coll_id);
        let Some(coll_lemma) = lexicon.get_lemma(coll_id) else { continue };
        let Some(coll_pos) = lexicon.get_dominant_pos(coll_id) else { continue };
        let score = log_dice(head_freq, coll_freq, cooc);
        let candidate = ScoredCandidate {
            neg_log_dice: -score,
            coll_lemma: coll_lemma.to_string(),
            record: CollocateRecord {
                coll_lemma: coll_lemma.to_string(),
                coll_pos: coll_pos.to_string(),
                cooccurrence: cooc,
                coll_total_freq: coll_freq,
                log_dice: score as f32,
            },
        };
        if heap.len() < params.top_k {
            heap.push(candidate);
        } else if let Some(worst) = heap.peek() {
            if candidate < *worst {
                heap.pop();
                heap.push(candidate);
            }
        }
    }

    if heap.is_empty() {
        return;
    }
    // `ScoredCandidate`'s Ord makes "smaller" mean "better" (higher log_dice,
    // then lexicographically smaller lemma), so `into_sorted_vec`'s
    // ascending order is already best-first.
    let collocates: Vec<CollocateRecord> =
        heap.into_sorted_vec().into_iter().map(|c| c.record).collect();
    emit(CollocationEntry { head_lemma: head_lemma.to_string(), head_total_freq: head_freq, collocates });
}

/// Orders candidates by `(-log_dice, coll_lemma)` ascending, so "smaller"
/// means "better" (higher log_dice, then lexicographically earlier lemma).
/// A plain `BinaryHeap` (a max-heap) then keeps the single worst survivor on
/// top, ready to be evicted first when a better candidate arrives.
struct ScoredCandidate {
    neg_log_dice: f64,
    coll_lemma: String,
    record: CollocateRecord,
}

impl PartialEq for ScoredCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.neg_log_dice == other.neg_log_dice && self.coll_lemma == other.coll_lemma
    }
}
impl Eq for ScoredCandidate {}
impl PartialOrd for ScoredCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ScoredCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Worst-first ordering for the bounded min-heap: larger
        // `neg_log_dice` (i.e. lower logDice) or, on ties, a
        // lexicographically larger lemma, sorts as "greater" so it's the
        // first one a max-heap would pop.
        self.neg_log_dice
            .partial_cmp(&other.neg_log_dice)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.coll_lemma.cmp(&other.coll_lemma))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{AggregatorConfig, PairAggregator, WorkerBatch};
    use crate::fingerprint::Fingerprint;
    use crate::lexicon::LexiconBuilder;
    use crate::token::{SentenceRecord, Token};

    fn token(word: &str, pos: &str, i: usize) -> Token {
        Token {
            position: i as u32,
            surface: word.to_string(),
            lemma: word.to_string(),
            pos: pos.to_string(),
            start_offset: 0,
            end_offset: 0,
        }
    }

    #[test]
    fn dog_collocates_ranked_and_capped_at_top_k() {
        // "the big dog runs quickly", "a small dog sleeps quietly",
        // "the happy cat plays"
        let builder = LexiconBuilder::new();
        let words: &[(&str, &str)] = &[
            ("the", "DET"),
            ("big", "JJ"),
            ("dog", "NN"),
            ("runs", "VBZ"),
            ("quickly", "RB"),
            ("a", "DET"),
            ("small", "JJ"),
            ("sleeps", "VBZ"),
            ("quietly", "RB"),
            ("happy", "JJ"),
            ("cat", "NN"),
            ("plays", "VBZ"),
        ];
        for (w, pos) in words {
            let id = builder.assign_or_get(w);
            builder.increment(id, pos);
        }
        let lexicon = builder.finalize(Fingerprint::new(b"s2"));

        let dir = tempfile::tempdir().unwrap();
        let mut config = AggregatorConfig::new(dir.path());
        config.window = 2;
        config.n_shards = 1;
        let aggregator = PairAggregator::new(config).unwrap();
        let mut batch = WorkerBatch::new(&aggregator);

        let sentences = vec![
            vec!["the", "big", "dog", "runs", "quickly"],
            vec!["a", "small", "dog", "sleeps", "quietly"],
            vec!["the", "happy", "cat", "plays"],
        ];
        for (sid, words) in sentences.iter().enumerate() {
            let tokens =
                words.iter().enumerate().map(|(i, w)| token(w, "X", i)).collect::<Vec<_>>();
            let sentence =
                SentenceRecord { sentence_id: sid as u64, text: words.join(" "), tokens };
            aggregator.process(&sentence, &lexicon, &mut batch).unwrap();
        }
        batch.flush_all(&aggregator);
        let manifest = aggregator.finish().unwrap();

        let params = MergeParams { min_head_freq: 1, min_cooc: 1, top_k: 10 };
        let mut entries = Vec::new();
        for shard_runs in manifest {
            let readers: Result<Vec<_>, Error> = shard_runs.iter().map(RunReader::open).collect();
            let merger = RunMerger::new(readers.unwrap()).unwrap();
            merge_shard(merger, &lexicon, params, |entry| entries.push(entry)).unwrap();
        }

        let dog_entry = entries.iter().find(|e| e.head_lemma == "dog").unwrap();
        let candidate_lemmas: std::collections::HashSet<&str> =
            dog_entry.collocates.iter().map(|c| c.coll_lemma.as_str()).collect();
        for expected in ["big", "small", "the", "a", "runs", "sleeps", "quickly", "quietly"] {
            assert!(candidate_lemmas.contains(expected), "missing {expected}");
        }
        assert!(dog_entry.is_sorted());
    }

    #[test]
    fn entries_respect_min_head_freq_and_min_cooc() {
        let builder = LexiconBuilder::new();
        let rare = builder.assign_or_get("rare");
        builder.increment(rare, "NN");
        let common = builder.assign_or_get("common");
        for _ in 0..10 {
            builder.increment(common, "NN");
        }
        let friend = builder.assign_or_get("friend");
        for _ in 0..10 {
            builder.increment(friend, "NN");
        }
        let lexicon = builder.finalize(Fingerprint::new(b"thresholds"));

        let dir = tempfile::tempdir().unwrap();
        let mut config = AggregatorConfig::new(dir.path());
        config.window = 1;
        config.n_shards = 1;
        let aggregator = PairAggregator::new(config).unwrap();
        let mut batch = WorkerBatch::new(&aggregator);
        let sentence = SentenceRecord {
            sentence_id: 0,
            text: "common friend".into(),
            tokens: vec![token("common", "NN", 0), token("friend", "NN", 1)],
        };
        aggregator.process(&sentence, &lexicon, &mut batch).unwrap();
        // "rare" never co-occurs with anything; it must never appear as a head.
        batch.flush_all(&aggregator);
        let manifest = aggregator.finish().unwrap();

        let params = MergeParams { min_head_freq: 5, min_cooc: 1, top_k: 10 };
        let mut entries = Vec::new();
        for shard_runs in manifest {
            let readers: Result<Vec<_>, Error> = shard_runs.iter().map(RunReader::open).collect();
            let merger = RunMerger::new(readers.unwrap()).unwrap();
            merge_shard(merger, &lexicon, params, |entry| entries.push(entry)).unwrap();
        }
        assert!(entries.iter().all(|e| e.head_lemma != "rare"));
        assert!(entries.iter().any(|e| e.head_lemma == "common"));
    }
}

//! Streams sentence records into sharded `(pair-key, count)` accumulators,
//! spilling sorted runs to disk when a shard grows past its budget.

mod run;
mod shard;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::Error;
use crate::lexicon::{Lexicon, LemmaId, UNKNOWN_LEMMA_ID};
use crate::pair_key::pair_key;
use crate::token::SentenceRecord;

pub use run::RunReader;
pub use shard::Shard;

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Maximum token-distance within a sentence for pair generation.
    pub window: u32,
    /// Power-of-two shard count (`head_id mod n_shards` selects the shard).
    pub n_shards: usize,
    /// A shard is flushed to a run file once it holds this many distinct
    /// pairs (2M pairs is roughly 24 MiB resident in a shard's map).
    pub spill_threshold: usize,
    /// If the sum of all shard sizes exceeds this, the largest shard is
    /// flushed first, regardless of its own threshold.
    pub global_watermark: usize,
    /// Directory run files are written into, namespaced by build UUID by
    /// the caller so a crashed build's partial runs never collide with a
    /// fresh one.
    pub run_dir: PathBuf,
    /// How many pending increments a per-worker batch buffers per shard
    /// before merging into the shared shard under its mutex.
    pub worker_batch_size: usize,
}

impl AggregatorConfig {
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        AggregatorConfig {
            window: 5,
            n_shards: 64,
            spill_threshold: 2_000_000,
            global_watermark: 64 * 2_000_000,
            run_dir: run_dir.into(),
            worker_batch_size: 4096,
        }
    }
}

/// Sharded pair accumulator. Shared across worker threads; each shard is
/// independently mutex-guarded so the only contention point is a flush or a
/// worker's periodic batch merge.
pub struct PairAggregator {
    config: AggregatorConfig,
    shards: Vec<Mutex<Shard>>,
    run_paths: Mutex<Vec<Vec<PathBuf>>>,
    run_counter: Mutex<Vec<u64>>,
}

/// One manifest entry per shard: the ordered list of run files it produced.
pub type RunManifest = Vec<Vec<PathBuf>>;

impl PairAggregator {
    pub fn new(config: AggregatorConfig) -> Result<Self, Error> {
        assert!(config.n_shards.is_power_of_two(), "n_shards must be a power of two");
        std::fs::create_dir_all(&config.run_dir)?;
        let n = config.n_shards;
        Ok(PairAggregator {
            shards: (0..n).map(|_| Mutex::new(Shard::new())).collect(),
            run_paths: Mutex::new(vec![Vec::new(); n]),
            run_counter: Mutex::new(vec![0; n]),
            config,
        })
    }

    fn shard_of(&self, head_id: LemmaId) -> usize {
        (head_id as usize) & (self.config.n_shards - 1)
    }

    /// Processes one sentence: for every ordered position pair `(i, j)`
    /// with `0 < j - i <= window` and neither lemma unknown, both
    /// directions are recorded. Buffers into `batch` rather than locking a
    /// shard per pair.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn process(
        &self,
        sentence: &SentenceRecord,
        lexicon: &Lexicon,
        batch: &mut WorkerBatch,
    ) -> Result<(), Error> {
        let window = self.config.window as usize;
        let ids: Vec<LemmaId> =
            sentence.tokens.iter().map(|t| lexicon.resolve_or_unknown(&t.lemma)).collect();

        for i in 0..ids.len() {
            let head_id = ids[i];
            if head_id == UNKNOWN_LEMMA_ID {
                continue;
            }
            for j in (i + 1)..ids.len() {
                let distance = j - i;
                if distance > window {
                    break;
                }
                let coll_id = ids[j];
                if coll_id == UNKNOWN_LEMMA_ID || coll_id == head_id {
                    continue;
                }
                let forward_shard = self.shard_of(head_id);
                batch.push(self, forward_shard, pair_key(head_id, coll_id))?;
                let backward_shard = self.shard_of(coll_id);
                batch.push(self, backward_shard, pair_key(coll_id, head_id))?;
            }
        }
        Ok(())
    }

    /// Sums every shard's current size; workers (or a dedicated supervisor)
    /// call this to decide whether to trigger a priority flush.
    pub fn total_pending(&self) -> usize {
        self.shards.iter().map(|s| s.lock().unwrap().len()).sum()
    }

    /// If total pending pairs exceed `global_watermark`, flushes the
    /// largest shard. Returns whether a flush happened.
    pub fn check_watermark(&self) -> Result<bool, Error> {
        if self.total_pending() <= self.config.global_watermark {
            return Ok(false);
        }
        let largest = (0..self.config.n_shards)
            .max_by_key(|&i| self.shards[i].lock().unwrap().len())
            .expect("at least one shard");
        let mut shard = self.shards[largest].lock().unwrap();
        self.flush_shard_locked(largest, &mut shard)?;
        Ok(true)
    }

    fn flush_shard_locked(&self, shard_idx: usize, shard: &mut Shard) -> Result<(), Error> {
        if shard.is_empty() {
            return Ok(());
        }
        let entries = shard.drain_sorted();
        let path = self.next_run_path(shard_idx);
        run::write_run(&path, &entries)?;
        self.run_paths.lock().unwrap()[shard_idx].push(path);
        Ok(())
    }

    fn next_run_path(&self, shard_idx: usize) -> PathBuf {
        let mut counters = self.run_counter.lock().unwrap();
        let n = counters[shard_idx];
        counters[shard_idx] += 1;
        self.config.run_dir.join(format!("shard-{shard_idx:04}-run-{n:08}.pair"))
    }

    /// Unconditionally flushes every shard, producing the final run
    /// manifest. Must be called once per build, after all `process` calls
    /// and all workers' `WorkerBatch::flush_all`.
    pub fn finish(&self) -> Result<RunManifest, Error> {
        for idx in 0..self.config.n_shards {
            let mut shard = self.shards[idx].lock().unwrap();
            self.flush_shard_locked(idx, &mut shard)?;
        }
        Ok(self.run_paths.lock().unwrap().clone())
    }

    pub fn run_dir(&self) -> &Path {
        &self.config.run_dir
    }
}

/// A worker thread's private, unlocked buffer of pending pair-key
/// increments, one `Vec` per shard. Filling up to `worker_batch_size`
/// before merging under the shard's mutex is what keeps shard contention
/// confined to the flush/merge step rather than every single increment.
pub struct WorkerBatch {
    pending: Vec<Vec<u64>>,
    limit: usize,
}

impl WorkerBatch {
    pub fn new(aggregator: &PairAggregator) -> Self {
        WorkerBatch {
            pending: vec![Vec::new(); aggregator.config.n_shards],
            limit: aggregator.config.worker_batch_size,
        }
    }

    fn push(&mut self, aggregator: &PairAggregator, shard_idx: usize, key: u64) -> Result<(), Error> {
        self.pending[shard_idx].push(key);
        if self.pending[shard_idx].len() >= self.limit {
            self.flush_one(aggregator, shard_idx)?;
        }
        Ok(())
    }

    /// Merges this batch's pending keys for one shard into the shard under
    /// its mutex, then — still holding the lock — spills the shard to a run
    /// file if it has individually grown past `spill_threshold`. This is
    /// the per-shard budget from spec.md's aggregator design, independent of
    /// `check_watermark`'s sum-of-all-shards trigger: a single
    /// disproportionately hot shard must not be allowed to grow unbounded
    /// just because the other shards stay small.
    fn flush_one(&mut self, aggregator: &PairAggregator, shard_idx: usize) -> Result<(), Error> {
        let keys = std::mem::take(&mut self.pending[shard_idx]);
        if keys.is_empty() {
            return Ok(());
        }
        let mut shard = aggregator.shards[shard_idx].lock().unwrap();
        for key in keys {
            shard.increment(key);
        }
        if shard.len() >= aggregator.config.spill_threshold {
            aggregator.flush_shard_locked(shard_idx, &mut shard)?;
        }
        Ok(())
    }

    /// Merges every remaining pending buffer into its shard. Must be called
    /// by each worker before the aggregator's `finish()`, or pending
    /// increments in flight at the end of processing would be lost.
    pub fn flush_all(&mut self, aggregator: &PairAggregator) -> Result<(), Error> {
        for shard_idx in 0..self.pending.len() {
            self.flush_one(aggregator, shard_idx)?;
        }
        Ok(())
    }
}

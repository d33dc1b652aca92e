//! A corpus-linguistics collocation engine: builds a logDice-scored
//! collocate store from a POS-tagged, pre-tokenized corpus, and answers
//! pattern-constrained point queries against it.
//!
//! The build path is lexicon (assign dense ids, tally frequency and
//! dominant POS) → sharded pair aggregation with disk spill → per-shard
//! k-way merge, threshold filtering and scoring → a single memory-mappable
//! store file, published by fsync + atomic rename. The query path opens
//! that store read-only, compiles and caches a small constraint-language
//! pattern, and filters a head's collocates by pattern, an optional
//! copular-witness-gated relation, and a logDice floor.
//!
//! This crate exposes a library surface only; a binary CLI wrapping
//! [`build_store`] and [`lookup`] as `build-store`/`lookup` subcommands
//! with the documented exit codes is expected to live outside this crate.

pub mod aggregator;
pub mod binio;
pub mod entry;
pub mod error;
pub mod fingerprint;
pub mod grammar_config;
pub mod lexicon;
pub mod merge;
pub mod pair_key;
pub mod posgroup;
pub mod query;
pub mod store;
pub mod token;
pub mod witness;

use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;

use aggregator::{AggregatorConfig, PairAggregator, RunReader, WorkerBatch};
use entry::CollocationEntry;
use error::Error;
use fingerprint::Fingerprint;
use grammar_config::GrammarConfig;
use lexicon::{Lexicon, LexiconBuilder};
use merge::{merge_shard, MergeParams, RunMerger};
use query::{QueryExecutor, QueryParams, ResultRow};
use store::{StoreReader, StoreWriter};
use token::{SentenceReader, SentenceRecord};
use witness::WitnessBackend;

/// How many sentences an ingestion worker processes between watermark
/// checks. Checking on every single sentence would mean locking every
/// shard's mutex for `total_pending()` far more often than a flush could
/// ever be needed.
const WATERMARK_CHECK_INTERVAL: usize = 256;

/// Knobs for one build, corresponding to `build-store`'s CLI flags.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub window: u32,
    pub top_k: usize,
    pub min_head_freq: u64,
    pub min_cooc: u64,
    pub n_shards: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig { window: 5, top_k: 25, min_head_freq: 5, min_cooc: 3, n_shards: 64 }
    }
}

/// Builds a lexicon and collocation store from the CoNLL-U-like corpus at
/// `corpus_path`, under the grammar configuration at `grammar_config_path`,
/// writing `lexicon.bin` and `store.bin` into `output_dir`. The corpus is
/// read twice: once to build the lexicon, once (now that every lemma has a
/// dense id) to aggregate pair observations against it.
#[tracing::instrument(level = "info", skip(config))]
pub fn build_store(
    corpus_path: impl AsRef<Path> + std::fmt::Debug,
    grammar_config_path: impl AsRef<Path> + std::fmt::Debug,
    output_dir: impl AsRef<Path> + std::fmt::Debug,
    config: BuildConfig,
) -> Result<(), Error> {
    let corpus_path = corpus_path.as_ref();
    let output_dir = output_dir.as_ref();
    std::fs::create_dir_all(output_dir)?;

    let grammar = GrammarConfig::load(grammar_config_path)?;
    let fingerprint = Fingerprint::new(grammar.source_bytes());

    let lexicon = build_lexicon(corpus_path, fingerprint)?;
    lexicon.write(output_dir.join("lexicon.bin"))?;

    let run_dir = output_dir.join(format!("runs-{}", fingerprint.build_uuid));
    let (manifest, total_tokens) = aggregate_pairs(corpus_path, &lexicon, &config, &run_dir)?;

    // Shards are independent by construction (§4.2), so every shard's
    // k-way merge runs on its own rayon worker; only the final flatten
    // needs all of them back together.
    let merge_params =
        MergeParams { min_head_freq: config.min_head_freq, min_cooc: config.min_cooc, top_k: config.top_k };
    let entries: Vec<CollocationEntry> = manifest
        .par_iter()
        .filter(|shard_runs| !shard_runs.is_empty())
        .map(|shard_runs| -> Result<Vec<CollocationEntry>, Error> {
            let streams =
                shard_runs.iter().map(RunReader::open).collect::<Result<Vec<_>, Error>>()?;
            let merger = RunMerger::new(streams)?;
            let mut shard_entries = Vec::new();
            merge_shard(merger, &lexicon, merge_params, |entry| shard_entries.push(entry))?;
            Ok(shard_entries)
        })
        .collect::<Result<Vec<Vec<CollocationEntry>>, Error>>()?
        .into_iter()
        .flatten()
        .collect();

    let writer = StoreWriter::new(config.window, config.top_k as u32, total_tokens, fingerprint);
    writer.write(output_dir.join("store.bin"), entries)?;

    let _ = std::fs::remove_dir_all(&run_dir);
    Ok(())
}

fn build_lexicon(corpus_path: &Path, fingerprint: Fingerprint) -> Result<Lexicon, Error> {
    let file = std::fs::File::open(corpus_path)?;
    let mut reader = SentenceReader::new(BufReader::new(file));
    let builder = LexiconBuilder::new();
    while let Some(sentence) = reader.next_sentence()? {
        for tok in &sentence.tokens {
            let id = builder.assign_or_get(&tok.lemma);
            builder.increment(id, &tok.pos);
        }
    }
    Ok(builder.finalize(fingerprint))
}

/// Ingests the corpus through a bounded-channel worker pool: the calling
/// thread reads sentences and hands them to `N` scoped worker threads
/// (`N = available_parallelism`), each owning a private [`WorkerBatch`]
/// and calling [`PairAggregator::process`] against the shared, mutex-guarded
/// shards. This is the "plain producer-consumer with threads and mutexes"
/// shape spec'd for the aggregator — no cooperative-suspension constructs,
/// just threads and a bounded channel providing back-pressure on the reader
/// when every worker is busy.
#[tracing::instrument(level = "info", skip(lexicon, config))]
fn aggregate_pairs(
    corpus_path: &Path,
    lexicon: &Lexicon,
    config: &BuildConfig,
    run_dir: &Path,
) -> Result<(aggregator::RunManifest, u64), Error> {
    let mut aggregator_config = AggregatorConfig::new(run_dir);
    aggregator_config.window = config.window;
    aggregator_config.n_shards = config.n_shards;
    let aggregator = PairAggregator::new(aggregator_config)?;

    let n_workers = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    let (tx, rx) = crossbeam_channel::bounded::<SentenceRecord>(n_workers * 64);
    let total_tokens = AtomicU64::new(0);
    let aggregator_ref = &aggregator;
    let total_tokens_ref = &total_tokens;

    let send_result = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..n_workers)
            .map(|_| {
                let rx = rx.clone();
                scope.spawn(move || -> Result<(), Error> {
                    let mut batch = WorkerBatch::new(aggregator_ref);
                    let mut since_watermark_check = 0usize;
                    for sentence in rx.iter() {
                        total_tokens_ref.fetch_add(sentence.tokens.len() as u64, Ordering::Relaxed);
                        aggregator_ref.process(&sentence, lexicon, &mut batch)?;
                        since_watermark_check += 1;
                        if since_watermark_check >= WATERMARK_CHECK_INTERVAL {
                            since_watermark_check = 0;
                            aggregator_ref.check_watermark()?;
                        }
                    }
                    batch.flush_all(aggregator_ref)?;
                    Ok(())
                })
            })
            .collect();
        drop(rx);

        let file = std::fs::File::open(corpus_path)?;
        let mut reader = SentenceReader::new(BufReader::new(file));
        let send_result: Result<(), Error> = (|| {
            while let Some(sentence) = reader.next_sentence()? {
                // A closed receiver means every worker already returned
                // (one of them hit an error); stop feeding the channel and
                // let the join loop below surface that error.
                if tx.send(sentence).is_err() {
                    break;
                }
            }
            Ok(())
        })();
        drop(tx);

        let mut worker_err = None;
        for handle in handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    worker_err.get_or_insert(e);
                }
                Err(_) => {
                    worker_err.get_or_insert(Error::Io(std::io::Error::other(
                        "aggregator worker thread panicked",
                    )));
                }
            }
        }
        worker_err.map_or(send_result, Err)
    });
    send_result?;

    let manifest = aggregator.finish()?;
    Ok((manifest, total_tokens.load(Ordering::Relaxed)))
}

/// Opens the store at `store_path` (validated against `fingerprint` when
/// given) and runs a single query against it.
#[tracing::instrument(level = "debug", skip(fingerprint, witness))]
pub fn lookup(
    store_path: impl AsRef<Path> + std::fmt::Debug,
    fingerprint: Option<Fingerprint>,
    grammar: &GrammarConfig,
    params: &QueryParams,
    witness: Option<&dyn WitnessBackend>,
) -> Result<Vec<ResultRow>, Error> {
    let reader = StoreReader::open(store_path, fingerprint)?;
    let executor = QueryExecutor::new(&reader, grammar);
    executor.query(params, witness)
}

//! Boundary behaviors and quantified invariants exercised through the
//! public build/lookup surface rather than a single module in isolation.

use std::path::{Path, PathBuf};

use collocore::grammar_config::GrammarConfig;
use collocore::pair_key::log_dice;
use collocore::query::{QueryExecutor, QueryParams};
use collocore::store::StoreReader;
use collocore::{build_store, BuildConfig};

fn write_corpus(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("corpus.conllu");
    std::fs::write(&path, body).unwrap();
    path
}

fn write_grammar(dir: &Path) -> PathBuf {
    let path = dir.join("grammar.toml");
    std::fs::write(&path, "copular_lemmas = [\"be\"]\nrelations = []\n").unwrap();
    path
}

#[test]
fn an_empty_corpus_produces_a_valid_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_corpus(dir.path(), "");
    let grammar = write_grammar(dir.path());
    let output = dir.path().join("out");

    build_store(&corpus, &grammar, &output, BuildConfig { n_shards: 1, ..Default::default() }).unwrap();

    let fingerprint =
        collocore::lexicon::Lexicon::open(output.join("lexicon.bin"), None).unwrap().fingerprint();
    let reader = StoreReader::open(output.join("store.bin"), Some(fingerprint)).unwrap();
    assert_eq!(reader.header().entry_count, 0);
}

#[test]
fn a_head_whose_only_collocate_falls_below_min_cooc_is_absent_from_the_store() {
    let dir = tempfile::tempdir().unwrap();
    // "x" and "y" co-occur exactly once in the whole corpus.
    let corpus = write_corpus(dir.path(), "1\tx\tx\tX\n2\ty\ty\tX\n\n");
    let grammar = write_grammar(dir.path());
    let output = dir.path().join("out");

    let config =
        BuildConfig { window: 1, top_k: 10, min_head_freq: 1, min_cooc: 2, n_shards: 1 };
    build_store(&corpus, &grammar, &output, config).unwrap();

    let fingerprint =
        collocore::lexicon::Lexicon::open(output.join("lexicon.bin"), None).unwrap().fingerprint();
    let reader = StoreReader::open(output.join("store.bin"), Some(fingerprint)).unwrap();
    assert!(!reader.has("x"));
    assert!(!reader.has("y"));
    assert_eq!(reader.header().entry_count, 0);
}

#[test]
fn max_results_zero_returns_an_empty_list_even_for_a_present_head() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_corpus(dir.path(), "1\ta\ta\tX\n2\tb\tb\tX\n3\ta\ta\tX\n\n");
    let grammar_path = write_grammar(dir.path());
    let output = dir.path().join("out");

    let config = BuildConfig { window: 1, top_k: 10, min_head_freq: 1, min_cooc: 1, n_shards: 1 };
    build_store(&corpus, &grammar_path, &output, config).unwrap();

    let fingerprint =
        collocore::lexicon::Lexicon::open(output.join("lexicon.bin"), None).unwrap().fingerprint();
    let reader = StoreReader::open(output.join("store.bin"), Some(fingerprint)).unwrap();
    let grammar = GrammarConfig::load(&grammar_path).unwrap();
    let executor = QueryExecutor::new(&reader, &grammar);

    let params = QueryParams { head: "a".to_string(), max_results: 0, ..Default::default() };
    assert_eq!(executor.query(&params, None).unwrap(), Vec::new());
}

#[test]
fn head_frequency_and_cooccurrence_thresholds_are_enforced_together() {
    let dir = tempfile::tempdir().unwrap();
    // "rare" sits alone in its own sentence and is never paired with
    // anything; "common"/"friend" co-occur often enough to clear both
    // thresholds.
    let mut body = String::new();
    for _ in 0..6 {
        body.push_str("1\tcommon\tcommon\tX\n2\tfriend\tfriend\tX\n\n");
    }
    body.push_str("1\trare\trare\tX\n\n");
    let corpus = write_corpus(dir.path(), &body);
    let grammar = write_grammar(dir.path());
    let output = dir.path().join("out");

    let config = BuildConfig { window: 1, top_k: 10, min_head_freq: 5, min_cooc: 5, n_shards: 1 };
    build_store(&corpus, &grammar, &output, config).unwrap();

    let fingerprint =
        collocore::lexicon::Lexicon::open(output.join("lexicon.bin"), None).unwrap().fingerprint();
    let reader = StoreReader::open(output.join("store.bin"), Some(fingerprint)).unwrap();
    assert!(!reader.has("rare"));
    assert!(reader.has("common"));
    let entry = reader.get("common").unwrap().unwrap();
    assert!(entry.head_total_freq >= 5);
    assert!(entry.collocates.iter().all(|c| c.cooccurrence >= 5));
}

#[test]
fn stored_logdice_recomputes_from_its_own_frequencies_within_tolerance() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_corpus(dir.path(), "1\ta\ta\tX\n2\tb\tb\tX\n3\ta\ta\tX\n\n");
    let grammar = write_grammar(dir.path());
    let output = dir.path().join("out");

    let config = BuildConfig { window: 1, top_k: 10, min_head_freq: 1, min_cooc: 1, n_shards: 1 };
    build_store(&corpus, &grammar, &output, config).unwrap();

    let fingerprint =
        collocore::lexicon::Lexicon::open(output.join("lexicon.bin"), None).unwrap().fingerprint();
    let reader = StoreReader::open(output.join("store.bin"), Some(fingerprint)).unwrap();
    let entry = reader.get("a").unwrap().unwrap();
    let collocate = &entry.collocates[0];

    let recomputed =
        log_dice(entry.head_total_freq, collocate.coll_total_freq, collocate.cooccurrence);
    assert!((recomputed as f32 - collocate.log_dice).abs() < 0.01);
}

#[test]
fn repeated_queries_against_the_same_built_store_are_identical() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_corpus(dir.path(), "1\ta\ta\tX\n2\tb\tb\tX\n3\ta\ta\tX\n\n");
    let grammar_path = write_grammar(dir.path());
    let output = dir.path().join("out");

    let config = BuildConfig { window: 1, top_k: 10, min_head_freq: 1, min_cooc: 1, n_shards: 1 };
    build_store(&corpus, &grammar_path, &output, config).unwrap();

    let fingerprint =
        collocore::lexicon::Lexicon::open(output.join("lexicon.bin"), None).unwrap().fingerprint();
    let reader = StoreReader::open(output.join("store.bin"), Some(fingerprint)).unwrap();
    let grammar = GrammarConfig::load(&grammar_path).unwrap();
    let executor = QueryExecutor::new(&reader, &grammar);

    let params = QueryParams { head: "a".to_string(), ..Default::default() };
    let first = executor.query(&params, None).unwrap();
    let second = executor.query(&params, None).unwrap();
    assert_eq!(first, second);
}

//! The capability the query executor depends on for the AdjPredicate
//! relation gate: the companion inverted index the engine assumes but does
//! not implement. Only the two calls the executor actually needs are
//! exposed, the same narrow-interface shape `milli` uses for its own
//! pluggable tokenizer/embedder traits.

use std::collections::HashSet;

/// A read-only index keyed by lemma. The concrete backend (Lucene,
/// tantivy, a custom posting list) lives outside this crate; only these
/// two calls are consumed.
pub trait WitnessBackend: Send + Sync {
    /// Number of sentences containing `lemma`.
    fn doc_freq(&self, lemma: &str) -> u64;

    /// Sentence ids containing both lemmas within positional proximity
    /// `slop`, unordered (either lemma may precede the other).
    fn near(&self, lemma_a: &str, lemma_b: &str, slop: u32) -> Vec<u64>;

    /// Whether some sentence contains `head` and `coll_lemma` with one of
    /// `copular_lemmas` positioned within `window` of both — the witness
    /// check the AdjPredicate relation gates on. The default implementation
    /// composes two `near` calls per candidate copular lemma and intersects
    /// the resulting sentence-id sets; a concrete backend with a cheaper
    /// three-way span query may override it.
    fn has_copular_witness(
        &self,
        head: &str,
        coll_lemma: &str,
        copular_lemmas: &[String],
        window: u32,
    ) -> bool {
        copular_lemmas.iter().any(|copular| {
            let near_head: HashSet<u64> = self.near(head, copular, window).into_iter().collect();
            if near_head.is_empty() {
                return false;
            }
            self.near(coll_lemma, copular, window).into_iter().any(|id| near_head.contains(&id))
        })
    }
}

/// Deterministic in-memory backend over a fixed set of lemma sequences,
/// suitable for tests that exercise the witness gate without a real index.
pub struct MockWitnessBackend {
    sentences: Vec<Vec<String>>,
}

impl MockWitnessBackend {
    pub fn new(sentences: Vec<Vec<&str>>) -> Self {
        let sentences =
            sentences.into_iter().map(|s| s.into_iter().map(|l| l.to_lowercase()).collect()).collect();
        MockWitnessBackend { sentences }
    }

    fn positions(&self, sentence: &[String], lemma: &str) -> Vec<usize> {
        let lemma = lemma.to_lowercase();
        sentence.iter().enumerate().filter(|(_, l)| **l == lemma).map(|(i, _)| i).collect()
    }
}

impl WitnessBackend for MockWitnessBackend {
    fn doc_freq(&self, lemma: &str) -> u64 {
        let lemma = lemma.to_lowercase();
        self.sentences.iter().filter(|s| s.iter().any(|l| *l == lemma)).count() as u64
    }

    fn near(&self, lemma_a: &str, lemma_b: &str, slop: u32) -> Vec<u64> {
        self.sentences
            .iter()
            .enumerate()
            .filter_map(|(id, sentence)| {
                let a = self.positions(sentence, lemma_a);
                let b = self.positions(sentence, lemma_b);
                let within = a.iter().any(|&i| {
                    b.iter().any(|&j| i != j && (i as i64 - j as i64).unsigned_abs() as u32 <= slop)
                });
                within.then_some(id as u64)
            })
            .collect()
    }
}

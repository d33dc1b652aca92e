//! Answers "what are the top-K collocates of head H matching constraint P
//! with logDice ≥ θ, limited to N rows?" against an opened store. Pattern
//! compilation is cached by its source text, since the same pattern is
//! typically reused across many queries against the same relation.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use regex::RegexBuilder;

use colloc_pattern::{Atom, Bracket, Field, Op, Value};

use crate::error::{Error, InvalidInputError, PreconditionError};
use crate::grammar_config::GrammarConfig;
use crate::posgroup::PosGroup;
use crate::store::StoreReader;
use crate::witness::WitnessBackend;

/// Inputs to one query; defaults match the executor's documented defaults.
#[derive(Debug, Clone)]
pub struct QueryParams {
    pub head: String,
    pub pattern: Option<String>,
    pub min_logdice: f32,
    pub max_results: u32,
    pub relation: Option<String>,
}

impl Default for QueryParams {
    fn default() -> Self {
        QueryParams { head: String::new(), pattern: None, min_logdice: 0.0, max_results: 50, relation: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub coll_lemma: String,
    pub coll_pos: String,
    pub cooccurrence: u64,
    pub log_dice: f32,
    pub relative_freq: f64,
}

enum Matcher {
    Literal(String),
    Regex(regex::Regex),
}

impl Matcher {
    fn matches(&self, value: &str) -> bool {
        match self {
            Matcher::Literal(l) => value.to_lowercase() == *l,
            Matcher::Regex(re) => re.is_match(value),
        }
    }
}

struct CompiledAtom {
    field: Field,
    op: Op,
    matcher: Matcher,
}

impl CompiledAtom {
    fn compile(atom: &Atom) -> Result<CompiledAtom, Error> {
        let matcher = match &atom.value {
            Value::Word(w) => Matcher::Literal(w.to_lowercase()),
            Value::Regex(src) => {
                let re = RegexBuilder::new(src)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| InvalidInputError::InvalidRegex(e.to_string()))?;
                Matcher::Regex(re)
            }
        };
        Ok(CompiledAtom { field: atom.field, op: atom.op, matcher })
    }

    /// `tag` is an alias for `pos`: the executor only ever evaluates a
    /// compiled pattern against one collocate's `(lemma, pos)`, since
    /// `word` is always the same value as `lemma` for a precomputed entry.
    fn eval(&self, lemma: &str, pos: &str) -> bool {
        let value = match self.field {
            Field::Lemma | Field::Word => lemma,
            Field::Pos | Field::Tag => pos,
        };
        let matched = self.matcher.matches(value);
        match self.op {
            Op::Eq => matched,
            Op::Ne => !matched,
        }
    }
}

struct CompiledAndExpr(Vec<CompiledAtom>);

impl CompiledAndExpr {
    fn eval(&self, lemma: &str, pos: &str) -> bool {
        self.0.iter().all(|atom| atom.eval(lemma, pos))
    }
}

struct CompiledBracket {
    negated: bool,
    groups: Vec<CompiledAndExpr>,
}

impl CompiledBracket {
    fn compile(bracket: &Bracket) -> Result<CompiledBracket, Error> {
        let groups = bracket
            .expr
            .0
            .iter()
            .map(|and_expr| {
                let atoms =
                    and_expr.0.iter().map(CompiledAtom::compile).collect::<Result<Vec<_>, Error>>()?;
                Ok(CompiledAndExpr(atoms))
            })
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(CompiledBracket { negated: bracket.negated, groups })
    }

    fn eval(&self, lemma: &str, pos: &str) -> bool {
        let hit = self.groups.iter().any(|group| group.eval(lemma, pos));
        if self.negated {
            !hit
        } else {
            hit
        }
    }
}

pub struct QueryExecutor<'a> {
    store: &'a StoreReader,
    grammar: &'a GrammarConfig,
    pattern_cache: Mutex<LruCache<String, Arc<CompiledBracket>>>,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(store: &'a StoreReader, grammar: &'a GrammarConfig) -> QueryExecutor<'a> {
        QueryExecutor {
            store,
            grammar,
            pattern_cache: Mutex::new(LruCache::new(NonZeroUsize::new(256).unwrap())),
        }
    }

    #[tracing::instrument(level = "debug", skip(self, witness))]
    pub fn query(
        &self,
        params: &QueryParams,
        witness: Option<&dyn WitnessBackend>,
    ) -> Result<Vec<ResultRow>, Error> {
        if params.max_results == 0 {
            return Ok(Vec::new());
        }

        let entry = match self.store.get(&params.head)? {
            Some(entry) => entry,
            None => return Ok(Vec::new()),
        };

        let compiled = match &params.pattern {
            Some(text) => Some(self.compiled_pattern(text)?),
            None => None,
        };

        let relation = match &params.relation {
            Some(id) => Some(
                self.grammar
                    .relation(id)
                    .ok_or_else(|| InvalidInputError::UnknownRelation(id.clone()))?,
            ),
            None => None,
        };

        let mut rows = Vec::new();
        for coll in &entry.collocates {
            // entries are stored strictly descending by log_dice, so the
            // first one that fails the floor means every later one does too.
            if coll.log_dice < params.min_logdice {
                break;
            }
            if let Some(pattern) = &compiled {
                if !pattern.eval(&coll.coll_lemma, &coll.coll_pos) {
                    continue;
                }
            }
            if let Some(relation) = relation {
                // Cheap check first: the pos-group table is a coarse hint,
                // so it rejects a non-matching collocate before the
                // constraint pattern (and the witness backend) ever runs.
                if PosGroup::from_upos(&coll.coll_pos) != relation.collocate_pos_group {
                    continue;
                }
                let relation_pattern = self.compiled_pattern(&relation.constraint)?;
                if !relation_pattern.eval(&coll.coll_lemma, &coll.coll_pos) {
                    continue;
                }
                if relation.requires_copular_witness {
                    let backend = witness
                        .ok_or_else(|| PreconditionError::MissingWitnessBackend(relation.id.clone()))?;
                    if !backend.has_copular_witness(
                        &entry.head_lemma,
                        &coll.coll_lemma,
                        &self.grammar.copular_lemmas,
                        relation.default_slop,
                    ) {
                        continue;
                    }
                }
            }
            rows.push(ResultRow {
                coll_lemma: coll.coll_lemma.clone(),
                coll_pos: coll.coll_pos.clone(),
                cooccurrence: coll.cooccurrence,
                log_dice: coll.log_dice,
                relative_freq: coll.cooccurrence as f64 / entry.head_total_freq as f64,
            });
            if rows.len() >= params.max_results as usize {
                break;
            }
        }
        Ok(rows)
    }

    fn compiled_pattern(&self, text: &str) -> Result<Arc<CompiledBracket>, Error> {
        if let Some(hit) = self.pattern_cache.lock().unwrap().get(text) {
            return Ok(hit.clone());
        }
        let pattern = colloc_pattern::Pattern::parse(text).map_err(InvalidInputError::Pattern)?;
        let bracket = pattern
            .as_single_bracket()
            .ok_or_else(|| InvalidInputError::SequencePattern(text.to_string()))?;
        let compiled = Arc::new(CompiledBracket::compile(bracket)?);
        self.pattern_cache.lock().unwrap().put(text.to_string(), compiled.clone());
        Ok(compiled)
    }
}

//! The grammar configuration: a finite list of copular lemmas (for the
//! AdjPredicate witness gate) plus a finite list of relation definitions,
//! loaded once from TOML at process start. Loading is a hard dependency —
//! a missing or invalid file is always a [`PreconditionError`], never a
//! silent default, the same way `meilisearch`'s own TOML-configured binary
//! treats its settings file.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, PreconditionError};
use crate::posgroup::PosGroup;

#[derive(Debug, Clone, Deserialize)]
pub struct RelationDef {
    pub id: String,
    pub head_pos_group: PosGroup,
    pub collocate_pos_group: PosGroup,
    pub constraint: String,
    #[serde(default)]
    pub requires_copular_witness: bool,
    #[serde(default = "default_slop")]
    pub default_slop: u32,
}

fn default_slop() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
struct RawGrammarConfig {
    copular_lemmas: Vec<String>,
    relations: Vec<RelationDef>,
}

/// The parsed configuration, plus the raw source bytes it was parsed from
/// (fed straight into [`crate::fingerprint::Fingerprint::new`] so a store
/// built under one configuration is refused against another).
#[derive(Debug, Clone)]
pub struct GrammarConfig {
    pub copular_lemmas: Vec<String>,
    pub relations: Vec<RelationDef>,
    source: String,
}

impl GrammarConfig {
    #[tracing::instrument(level = "debug")]
    pub fn load(path: impl AsRef<Path> + std::fmt::Debug) -> Result<GrammarConfig, Error> {
        let path_ref = path.as_ref();
        let source = std::fs::read_to_string(path_ref).map_err(|e| {
            PreconditionError::MissingConfig(format!("{}: {e}", path_ref.display()))
        })?;
        let raw: RawGrammarConfig =
            toml::from_str(&source).map_err(|e| PreconditionError::InvalidConfig(e.to_string()))?;

        if raw.copular_lemmas.is_empty() {
            return Err(PreconditionError::InvalidConfig(
                "copular_lemmas must list at least one lemma".to_string(),
            )
            .into());
        }
        for relation in &raw.relations {
            if relation.id.trim().is_empty() {
                return Err(
                    PreconditionError::InvalidConfig("relation id must not be empty".to_string()).into()
                );
            }
            if let Err(e) = colloc_pattern::Pattern::parse(&relation.constraint) {
                return Err(PreconditionError::InvalidConfig(format!(
                    "relation `{}` has an invalid constraint: {e}",
                    relation.id
                ))
                .into());
            }
        }

        Ok(GrammarConfig { copular_lemmas: raw.copular_lemmas, relations: raw.relations, source })
    }

    pub fn relation(&self, id: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.id == id)
    }

    pub fn is_copular(&self, lemma: &str) -> bool {
        self.copular_lemmas.iter().any(|c| c.eq_ignore_ascii_case(lemma))
    }

    /// The raw TOML source, fed into the build's [`crate::fingerprint::Fingerprint`]
    /// so two different configurations never produce matching fingerprints.
    pub fn source_bytes(&self) -> &[u8] {
        self.source.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_a_valid_configuration() {
        let file = write_config(
            r#"
            copular_lemmas = ["be", "remain", "seem"]

            [[relations]]
            id = "adj-predicate"
            head_pos_group = "noun"
            collocate_pos_group = "adj"
            constraint = "[pos=JJ]"
            requires_copular_witness = true
            default_slop = 6
            "#,
        );
        let config = GrammarConfig::load(file.path()).unwrap();
        assert_eq!(config.copular_lemmas, vec!["be", "remain", "seem"]);
        assert!(config.is_copular("Be"));
        let relation = config.relation("adj-predicate").unwrap();
        assert!(relation.requires_copular_witness);
        assert_eq!(relation.default_slop, 6);
    }

    #[test]
    fn missing_file_is_a_precondition_error() {
        let err = GrammarConfig::load("/nonexistent/grammar.toml").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Precondition);
    }

    #[test]
    fn empty_copular_lemmas_is_rejected() {
        let file = write_config("copular_lemmas = []\nrelations = []\n");
        let err = GrammarConfig::load(file.path()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Precondition);
    }

    #[test]
    fn invalid_constraint_expression_is_rejected() {
        let file = write_config(
            r#"
            copular_lemmas = ["be"]

            [[relations]]
            id = "broken"
            head_pos_group = "noun"
            collocate_pos_group = "adj"
            constraint = "[pos=JJ"
            "#,
        );
        let err = GrammarConfig::load(file.path()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Precondition);
    }
}

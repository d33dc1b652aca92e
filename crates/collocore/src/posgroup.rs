//! The fixed UPOS → coarse POS-group mapping used by relation definitions
//! to cheaply pre-filter collocates before running the (more expensive)
//! constraint-language predicate against them.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PosGroup {
    Noun,
    Verb,
    Adj,
    Adv,
    Prep,
    Det,
    Conj,
    Punct,
    Num,
    Intj,
    Part,
    Other,
}

impl PosGroup {
    /// Maps a POS tag to its coarse group. Accepts both Universal POS tags
    /// (`NOUN`, `ADJ`, ...) and the Penn Treebank tagset (`NN`, `JJ`, ...),
    /// since [`crate::token::SentenceReader`] resolves a token's stored tag
    /// as XPOS-else-UPOS and either convention may end up in a collocate's
    /// stored `pos` field. Unknown tags fall back to `Other` rather than
    /// erroring: the group is an optimization hint, not a validated field.
    pub fn from_upos(tag: &str) -> PosGroup {
        match tag {
            "NOUN" | "PROPN" | "NN" | "NNS" | "NNP" | "NNPS" => PosGroup::Noun,
            "VERB" | "AUX" | "VB" | "VBD" | "VBG" | "VBN" | "VBP" | "VBZ" | "MD" => PosGroup::Verb,
            "ADJ" | "JJ" | "JJR" | "JJS" => PosGroup::Adj,
            "ADV" | "RB" | "RBR" | "RBS" | "WRB" => PosGroup::Adv,
            "ADP" | "IN" => PosGroup::Prep,
            "DET" | "DT" | "PDT" | "WDT" => PosGroup::Det,
            "CCONJ" | "SCONJ" | "CC" => PosGroup::Conj,
            "PUNCT" | "." | "," | ":" | "``" | "''" | "-LRB-" | "-RRB-" | "HYPH" => PosGroup::Punct,
            "NUM" | "CD" => PosGroup::Num,
            "INTJ" | "UH" => PosGroup::Intj,
            "PART" | "POS" | "RP" | "TO" => PosGroup::Part,
            _ => PosGroup::Other,
        }
    }
}

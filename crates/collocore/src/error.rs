use std::io;

use thiserror::Error;

/// The five abstract error kinds of the collocation engine. Kept separate
/// from the [`Error`] enum itself (which carries the human-readable chain)
/// so callers can match on `error.kind()` the way a CLI maps a kind to one
/// of the documented exit codes (2 invalid args, 3 precondition, 4 I/O,
/// 5 corrupt).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    Precondition,
    Corrupt,
    Resource,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),
    #[error("precondition failed: {0}")]
    Precondition(#[from] PreconditionError),
    #[error("corrupt data: {0}")]
    Corrupt(#[from] CorruptError),
    #[error("resource error: {0}")]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Precondition(_) => ErrorKind::Precondition,
            Error::Corrupt(_) => ErrorKind::Corrupt,
            Error::Resource(_) => ErrorKind::Resource,
            Error::Io(_) => ErrorKind::Resource,
        }
    }

    /// The process exit code a CLI surface should use for this error. The
    /// engine itself never calls `process::exit`; this is exposed so a
    /// thin CLI can map `kind()` without duplicating the table.
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::InvalidInput => 2,
            ErrorKind::Precondition => 3,
            ErrorKind::Resource => 4,
            ErrorKind::Corrupt => 5,
        }
    }
}

#[derive(Error, Debug)]
pub enum InvalidInputError {
    #[error("invalid constraint pattern: {0}")]
    Pattern(#[from] colloc_pattern::Error),
    #[error("unknown relation id: {0}")]
    UnknownRelation(String),
    #[error("lemma `{lemma}` ({len} bytes) exceeds the {limit}-byte format limit")]
    LemmaTooLong { lemma: String, len: usize, limit: usize },
    #[error("pos tag `{pos}` ({len} bytes) exceeds the {limit}-byte format limit")]
    PosTooLong { pos: String, len: usize, limit: usize },
    #[error("pattern `{0}` is a multi-token sequence; only a single bracket filters the precomputed collocate list")]
    SequencePattern(String),
    #[error("invalid regex in constraint pattern: {0}")]
    InvalidRegex(String),
}

#[derive(Error, Debug)]
pub enum PreconditionError {
    #[error(
        "store fingerprint {store} does not match lexicon fingerprint {lexicon}"
    )]
    FingerprintMismatch { store: String, lexicon: String },
    #[error("grammar configuration missing or unreadable: {0}")]
    MissingConfig(String),
    #[error("grammar configuration invalid: {0}")]
    InvalidConfig(String),
    #[error("witness backend required for relation `{0}` but none was provided")]
    MissingWitnessBackend(String),
}

#[derive(Error, Debug)]
pub enum CorruptError {
    #[error("bad magic: expected `{expected}`, found `{found}`")]
    BadMagic { expected: String, found: String },
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),
    #[error("truncated record in {context}: needed {needed} bytes, had {had}")]
    TruncatedRecord { context: &'static str, needed: usize, had: usize },
    #[error("key index is not strictly sorted at position {0}")]
    KeyIndexNotSorted(usize),
    #[error("entry offset {offset} out of bounds (file is {len} bytes)")]
    OffsetOutOfBounds { offset: u64, len: u64 },
}

#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("failed to memory-map store file: {0}")]
    Mmap(String),
    #[error("disk spill failed: {0}")]
    Spill(String),
}

pub type Result<T> = std::result::Result<T, Error>;

use std::fmt;

use nom::error::{ErrorKind as NomErrorKind, ParseError};

use crate::Span;

/// What went wrong while parsing a constraint-language expression.
///
/// Mirrors the shape of `filter_parser::ErrorKind`: a small closed set of
/// reasons a human can act on, kept separate from the raw `nom` error kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    ExpectedField,
    UnknownField(String),
    ExpectedOperator,
    ExpectedValue,
    UnclosedQuote,
    UnclosedBracket,
    ExpectedBracket,
    MissingDistanceBound,
    InvalidDistanceBound,
    Nom(NomErrorKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub context: String,
    pub kind: ErrorKind,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::ExpectedField => write!(f, "expected a field name at `{}`", self.context),
            ErrorKind::UnknownField(field) => {
                write!(f, "unknown field `{field}` at `{}`", self.context)
            }
            ErrorKind::ExpectedOperator => {
                write!(f, "expected `=` or `!=` at `{}`", self.context)
            }
            ErrorKind::ExpectedValue => write!(f, "expected a value at `{}`", self.context),
            ErrorKind::UnclosedQuote => write!(f, "unclosed quote at `{}`", self.context),
            ErrorKind::UnclosedBracket => write!(f, "unclosed `[` at `{}`", self.context),
            ErrorKind::ExpectedBracket => write!(f, "expected `[` at `{}`", self.context),
            ErrorKind::MissingDistanceBound => {
                write!(f, "expected `~{{min,max}}` at `{}`", self.context)
            }
            ErrorKind::InvalidDistanceBound => {
                write!(f, "invalid distance bound at `{}`", self.context)
            }
            ErrorKind::Nom(kind) => write!(f, "{kind:?} at `{}`", self.context),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    pub(crate) fn new(span: Span, kind: ErrorKind) -> Self {
        Error { context: span.fragment().to_string(), kind }
    }
}

impl<'a> ParseError<Span<'a>> for Error {
    fn from_error_kind(input: Span<'a>, kind: NomErrorKind) -> Self {
        Error::new(input, ErrorKind::Nom(kind))
    }

    fn append(_input: Span<'a>, _kind: NomErrorKind, other: Self) -> Self {
        other
    }
}

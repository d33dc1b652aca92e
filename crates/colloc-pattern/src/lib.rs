//! Parser for the small corpus-query-language constraint expressions used to
//! filter a collocate list (see the collocation engine's query executor).
//!
//! BNF:
//! ```text
//! pattern     = element (WS+ element)*
//! element     = "!"? "[" WS* or_expr WS* "]" distance?
//! or_expr     = and_expr (WS* "|" WS* and_expr)*
//! and_expr    = atom (WS* "&" WS* atom)*
//! atom        = field WS* op WS* value
//! field       = "lemma" | "pos" | "word" | "tag"
//! op          = "=" | "!="
//! value       = doubleQuoted | word
//! doubleQuoted = '"' (any char but '"')* '"'
//! word        = (alphanumeric | "_" | "-" | ".")+
//! distance    = "~{" uint "," uint "}"
//! ```
//!
//! A `|` inside a double-quoted value is part of the regex source (see
//! [`Value::Regex`]) and is never treated as the logical-OR separator; only a
//! `|` appearing between atoms, outside any quotation, separates
//! disjuncts. All atoms in one `pattern` apply to a single collocate token —
//! a multi-element sequence is meaningful only when the pattern is later
//! executed against a companion inverted index for witness/concordance
//! purposes, never against the precomputed collocate list.

mod error;
mod value;

use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{char, digit1, multispace0, multispace1};
use nom::combinator::{cut, map, map_res, opt};
use nom::multi::separated_list1;
use nom::sequence::{delimited, preceded, separated_pair, tuple};
use nom::Finish;
use nom_locate::LocatedSpan;

pub use error::{Error, ErrorKind};
pub use value::Value;

pub type Span<'a> = LocatedSpan<&'a str, &'a str>;
type IResult<'a, O> = nom::IResult<Span<'a>, O, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Lemma,
    Pos,
    Word,
    Tag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    pub field: Field,
    pub op: Op,
    pub value: Value,
}

/// Atoms joined by `&`; all must hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndExpr(pub Vec<Atom>);

/// `AndExpr`s joined by `|`; at least one must hold. `&` binds tighter than
/// `|`, so `a&b|c&d` is `(a&b)|(c&d)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrExpr(pub Vec<AndExpr>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Distance {
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bracket {
    pub negated: bool,
    pub expr: OrExpr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternElement {
    pub bracket: Bracket,
    pub distance: Option<Distance>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub sequence: Vec<PatternElement>,
}

impl Pattern {
    /// Parses a full constraint expression. An empty (all-whitespace) input
    /// is rejected: callers that want "no constraint" should not call
    /// `Pattern::parse` at all, mirroring how the executor treats an absent
    /// `pattern` field.
    pub fn parse(input: &str) -> Result<Pattern, Error> {
        let span = Span::new_extra(input, input);
        parse_pattern(span).finish().map(|(_rest, pattern)| pattern)
    }

    /// The single bracket to evaluate against one collocate token, when this
    /// pattern has no sequence/distance structure (the common case for
    /// filtering the precomputed collocate list). Returns `None` for
    /// multi-element sequences, which only make sense against a companion
    /// index.
    pub fn as_single_bracket(&self) -> Option<&Bracket> {
        match self.sequence.as_slice() {
            [one] if one.distance.is_none() => Some(&one.bracket),
            _ => None,
        }
    }
}

fn ws<'a, O>(inner: impl FnMut(Span<'a>) -> IResult<'a, O>) -> impl FnMut(Span<'a>) -> IResult<'a, O> {
    delimited(multispace0, inner, multispace0)
}

fn parse_field(input: Span) -> IResult<Field> {
    alt((
        map(tag("lemma"), |_| Field::Lemma),
        map(tag("pos"), |_| Field::Pos),
        map(tag("word"), |_| Field::Word),
        map(tag("tag"), |_| Field::Tag),
    ))(input)
    .map_err(|_| nom::Err::Error(Error::new(input, ErrorKind::ExpectedField)))
}

fn parse_op(input: Span) -> IResult<Op> {
    alt((map(tag("!="), |_| Op::Ne), map(tag("="), |_| Op::Eq)))(input)
        .map_err(|_| nom::Err::Error(Error::new(input, ErrorKind::ExpectedOperator)))
}

fn parse_atom(input: Span) -> IResult<Atom> {
    let (input, field) = parse_field(input)?;
    let (input, _) = multispace0(input)?;
    let (input, op) = parse_op(input)?;
    let (input, _) = multispace0(input)?;
    let (input, value) = cut(value::parse_value)(input)
        .map_err(|_| nom::Err::Failure(Error::new(input, ErrorKind::ExpectedValue)))?;
    Ok((input, Atom { field, op, value }))
}

fn parse_and_expr(input: Span) -> IResult<AndExpr> {
    map(separated_list1(ws(char('&')), parse_atom), AndExpr)(input)
}

fn parse_or_expr(input: Span) -> IResult<OrExpr> {
    map(separated_list1(ws(char('|')), parse_and_expr), OrExpr)(input)
}

fn parse_bracket(input: Span) -> IResult<Bracket> {
    let (input, negated) = map(opt(char('!')), |n| n.is_some())(input)?;
    let (input, _) = char('[')(input)
        .map_err(|_: nom::Err<Error>| nom::Err::Error(Error::new(input, ErrorKind::ExpectedBracket)))?;
    let (input, _) = multispace0(input)?;
    let (input, expr) = cut(parse_or_expr)(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = cut(|i| {
        char::<_, Error>(']')(i).map_err(|_| nom::Err::Failure(Error::new(i, ErrorKind::UnclosedBracket)))
    })(input)?;
    Ok((input, Bracket { negated, expr }))
}

fn parse_uint(input: Span) -> IResult<u32> {
    map_res(digit1, |s: Span| s.fragment().parse::<u32>())(input)
        .map_err(|_: nom::Err<Error>| nom::Err::Failure(Error::new(input, ErrorKind::InvalidDistanceBound)))
}

fn parse_distance(input: Span) -> IResult<Distance> {
    let (input, _) = tag("~{")(input)?;
    let (input, (min, max)) = cut(separated_pair(parse_uint, char(','), parse_uint))(input)?;
    let (input, _) = cut(|i| {
        char::<_, Error>('}')(i).map_err(|_| nom::Err::Failure(Error::new(i, ErrorKind::MissingDistanceBound)))
    })(input)?;
    Ok((input, Distance { min, max }))
}

fn parse_element(input: Span) -> IResult<PatternElement> {
    map(tuple((parse_bracket, opt(parse_distance))), |(bracket, distance)| PatternElement {
        bracket,
        distance,
    })(input)
}

fn parse_pattern(input: Span) -> IResult<Pattern> {
    let (input, _) = multispace0(input)?;
    let (input, sequence) = separated_list1(multispace1, parse_element)(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = nom::combinator::eof(input)?;
    Ok((input, Pattern { sequence }))
}

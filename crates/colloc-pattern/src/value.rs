use nom::branch::alt;
use nom::bytes::complete::{is_not, tag, take_while1};
use nom::character::complete::char;
use nom::combinator::{cut, map};
use nom::sequence::delimited;

use crate::error::{Error, ErrorKind};
use crate::{IResult, Span};

/// A value is either a double-quoted regex (may contain an unescaped `|`,
/// which stays part of the regex source and is never treated as logical OR)
/// or an unquoted bareword restricted to `[A-Za-z0-9_.-]+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Word(String),
    Regex(String),
}

pub fn parse_value(input: Span) -> IResult<Value> {
    alt((parse_quoted_regex, parse_word))(input)
}

fn parse_quoted_regex(input: Span) -> IResult<Value> {
    let (input, _) = char('"')(input)?;
    let (input, body) = cut(|i| match is_not::<_, _, Error>("\"")(i) {
        Ok(ok) => Ok(ok),
        // an empty quoted value `""` is valid: zero characters between the quotes
        Err(_) => Ok((i, Span::new_extra("", ""))),
    })(input)?;
    let (input, _) = cut(|i| {
        tag::<_, _, Error>("\"")(i).map_err(|_| {
            nom::Err::Failure(Error::new(i, ErrorKind::UnclosedQuote))
        })
    })(input)?;
    Ok((input, Value::Regex(body.fragment().to_string())))
}

fn parse_word(input: Span) -> IResult<Value> {
    map(
        take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-' || c == '.'),
        |span: Span| Value::Word(span.fragment().to_string()),
    )(input)
}

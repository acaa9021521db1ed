//! Parser for user-supplied list filters.
//!
//! Accepts equality terms joined by `&&`, optionally parenthesised:
//!
//! ```text
//! (relay='r1')
//! relay = "r1" && user = 'u2'
//! ```
//!
//! Anything richer is rejected; this is not a rule language.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::{all_consuming, map},
    multi::separated_list1,
    sequence::{delimited, separated_pair},
    IResult,
};

use crate::error::{DomainError, DomainResult};
use crate::model::{filterable_fields, Collection};

use super::predicate::Predicate;

/// Parses a filter for `collection`. Blank input yields `None`.
pub fn parse_filter(collection: Collection, input: &str) -> DomainResult<Option<Predicate>> {
    if input.trim().is_empty() {
        return Ok(None);
    }

    let (_, predicate) = all_consuming(conjunction)(input).map_err(|e| {
        let position = match &e {
            nom::Err::Error(inner) | nom::Err::Failure(inner) => input.len() - inner.input.len(),
            nom::Err::Incomplete(_) => input.len(),
        };
        DomainError::FilterParseError {
            message: format!("unexpected input at position {position}"),
        }
    })?;

    let known = filterable_fields(collection);
    if let Some(field) = predicate.fields().into_iter().find(|f| !known.contains(f)) {
        return Err(DomainError::UnknownFilterField {
            collection,
            field: field.to_string(),
        });
    }

    Ok(Some(predicate))
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)
}

fn quoted(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('\''), take_while(|c: char| c != '\''), char('\'')),
        delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
    ))(input)
}

fn comparison(input: &str) -> IResult<&str, Predicate> {
    map(
        separated_pair(ws(identifier), char('='), ws(quoted)),
        |(field, value)| Predicate::field_eq(field, value),
    )(input)
}

fn term(input: &str) -> IResult<&str, Predicate> {
    alt((
        delimited(ws(char('(')), conjunction, ws(char(')'))),
        comparison,
    ))(input)
}

fn conjunction(input: &str) -> IResult<&str, Predicate> {
    map(separated_list1(tag("&&"), term), |mut terms| {
        if terms.len() == 1 {
            terms.remove(0)
        } else {
            Predicate::And(terms)
        }
    })(input)
}

//! Gantt statements.

use winnow::combinator::{alt, cut_err, opt, preceded, separated, terminated};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::stream::Location;
use winnow::token::take_while;

use crate::cst::{Record, Token};
use crate::grammar::{accessibility, span_from, title};
use crate::lex::{
    Input, PResult, eol, expected, hspace0, hspace1, identifier, keyword, label_until, punct,
    quoted, spanned, strip_terminator, text_to_eol,
};

/// Settings that take the rest of the line as their value.
const VALUED: &[&str] = &[
    "dateFormat",
    "axisFormat",
    "tickInterval",
    "excludes",
    "includes",
    "todayMarker",
    "weekday",
];

/// Settings that are switched on by their keyword alone.
const FLAGS: &[&str] = &["inclusiveEndDates", "topAxis"];

pub(super) fn statement<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    alt((accessibility, title, setting, section, click, task)).parse_next(input)
}

fn setting<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    for key in VALUED {
        if let Some(found) = opt(spanned(keyword(*key))).parse_next(input)? {
            cut_err(hspace1).parse_next(input)?;
            let value = spanned(text_to_eol.map(strip_terminator)).parse_next(input)?;
            eol.parse_next(input)?;
            return Ok(Record::new("setting", span_from(input, start))
                .with("key", found)
                .with("value", value));
        }
    }
    for key in FLAGS {
        if let Some(found) = opt(spanned(keyword(*key))).parse_next(input)? {
            cut_err(eol).parse_next(input)?;
            return Ok(Record::new("setting", span_from(input, start)).with("key", found));
        }
    }
    Err(ErrMode::Backtrack(ContextError::new()))
}

/// `section Name`
fn section<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("section").parse_next(input)?;
    hspace1.parse_next(input)?;
    let name = spanned(text_to_eol.map(strip_terminator)).parse_next(input)?;
    eol.parse_next(input)?;
    Ok(Record::new("section", span_from(input, start)).with("name", name))
}

fn task_id<'a>(input: &mut Input<'a>) -> PResult<Token<'a>> {
    spanned(take_while(1.., |c: char| c.is_alphanumeric() || matches!(c, '_' | '-')))
        .context(expected("task id"))
        .parse_next(input)
}

/// `click a,b call fn(args) href "url"`; either action may be left out.
fn click<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("click").parse_next(input)?;
    hspace1.parse_next(input)?;
    let ids: Vec<Token<'a>> =
        cut_err(separated(1.., task_id, (hspace0, punct(','), hspace0))).parse_next(input)?;
    let call = opt(preceded(
        (hspace1, keyword("call"), hspace1),
        cut_err((
            spanned(identifier),
            opt(preceded(
                punct('('),
                cut_err(terminated(spanned(label_until(")")), punct(')'))),
            )),
        )),
    ))
    .parse_next(input)?;
    let href = opt(preceded(
        (hspace1, keyword("href"), hspace1),
        cut_err(spanned(quoted)),
    ))
    .parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    let (callback, args) = match call {
        Some((callback, args)) => (Some(callback), args),
        None => (None, None),
    };
    Ok(Record::new("click", span_from(input, start))
        .with("ids", ids)
        .with_opt("callback", callback)
        .with_opt("args", args)
        .with_opt("href", href))
}

/// `Task name : [tags,] [id,] [start,] end`
fn task<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let name = spanned(label_until(":").map(str::trim))
        .verify(|t: &Token<'a>| !t.text.is_empty())
        .parse_next(input)?;
    punct(':').parse_next(input)?;
    hspace0.parse_next(input)?;
    let data = cut_err(
        spanned(text_to_eol.map(strip_terminator))
            .verify(|t: &Token<'a>| !t.text.is_empty())
            .context(expected("task data")),
    )
    .parse_next(input)?;
    eol.parse_next(input)?;
    Ok(Record::new("task", span_from(input, start))
        .with("name", name)
        .with("data", data))
}

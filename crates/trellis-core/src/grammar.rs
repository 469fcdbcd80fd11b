//! Scaffolding shared by the notation grammars: document framing, statement lists bounded by
//! closing keywords, accessibility statements, and conversion of winnow failures into
//! [`GrammarError`].

use winnow::combinator::{alt, cut_err, opt, peek, preceded};
use winnow::error::{AddContext, ContextError, ErrMode, ParseError, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::stream::{Location, Stream};
use winnow::token::{literal, take_until};

use crate::cst::{Cst, Document, Record, Span, Token};
use crate::error::{GrammarError, Position};
use crate::lex::{
    Input, PResult, blank_lines, eol, expected, hspace0, hspace1, keyword, punct, spanned,
    text_to_eol,
};

/// Span from `start` to the current position.
pub fn span_from(input: &Input<'_>, start: usize) -> Span {
    Span::new(start, input.current_token_start())
}

/// Parses a whole document: leading blank/comment lines, the header record, then statements
/// until the end of input.
pub fn parse_document<'a, H, S>(
    notation: &'static str,
    text: &'a str,
    header: H,
    statement: S,
    expected_statements: &'static [&'static str],
) -> Result<Document<'a>, GrammarError>
where
    H: Parser<Input<'a>, Record<'a>, ErrMode<ContextError>>,
    S: Parser<Input<'a>, Record<'a>, ErrMode<ContextError>>,
{
    parse_framed(notation, text, header, statements(statement, &[], expected_statements))
}

/// Like [`parse_document`] for notations whose statements carry their own indentation.
pub fn parse_indented_document<'a, H, S>(
    notation: &'static str,
    text: &'a str,
    header: H,
    statement: S,
    expected_statements: &'static [&'static str],
) -> Result<Document<'a>, GrammarError>
where
    H: Parser<Input<'a>, Record<'a>, ErrMode<ContextError>>,
    S: Parser<Input<'a>, Record<'a>, ErrMode<ContextError>>,
{
    parse_framed(notation, text, header, indented_statements(statement, expected_statements))
}

fn parse_framed<'a, H, B>(
    notation: &'static str,
    text: &'a str,
    header: H,
    body: B,
) -> Result<Document<'a>, GrammarError>
where
    H: Parser<Input<'a>, Record<'a>, ErrMode<ContextError>>,
    B: Parser<Input<'a>, Vec<Cst<'a>>, ErrMode<ContextError>>,
{
    let mut document = (blank_lines, preceded(hspace0, header), body)
        .map(|((), header, statements)| {
            Record::new("document", Span::new(0, text.len()))
                .with("header", header)
                .with("statements", statements)
        });

    match document.parse(Input::new(text)) {
        Ok(root) => {
            tracing::trace!(notation, statements = root.list("statements").len(), "parsed document");
            Ok(Document::new(notation, text, root))
        }
        Err(err) => Err(grammar_error(notation, text, &err)),
    }
}

/// Statement list bounded by `closers` (empty for the top level).
///
/// Stops before a closing keyword without consuming it. Reaching the end of input while a closer
/// is pending is a committed failure expecting the closer. A statement position where no
/// alternative matches is a committed failure listing `expected_statements`.
pub fn statements<'a, S>(
    statement: S,
    closers: &'static [&'static str],
    expected_statements: &'static [&'static str],
) -> impl Parser<Input<'a>, Vec<Cst<'a>>, ErrMode<ContextError>>
where
    S: Parser<Input<'a>, Record<'a>, ErrMode<ContextError>>,
{
    statement_list(statement, closers, expected_statements, true)
}

/// Like [`statements`] but leaves leading indentation for the statement rule to capture.
pub fn indented_statements<'a, S>(
    statement: S,
    expected_statements: &'static [&'static str],
) -> impl Parser<Input<'a>, Vec<Cst<'a>>, ErrMode<ContextError>>
where
    S: Parser<Input<'a>, Record<'a>, ErrMode<ContextError>>,
{
    statement_list(statement, &[], expected_statements, false)
}

fn statement_list<'a, S>(
    mut statement: S,
    closers: &'static [&'static str],
    expected_statements: &'static [&'static str],
    skip_indent: bool,
) -> impl Parser<Input<'a>, Vec<Cst<'a>>, ErrMode<ContextError>>
where
    S: Parser<Input<'a>, Record<'a>, ErrMode<ContextError>>,
{
    move |input: &mut Input<'a>| {
        let mut out = Vec::new();
        loop {
            blank_lines.parse_next(input)?;
            let line_start = input.checkpoint();
            hspace0.parse_next(input)?;
            if input.eof_offset() == 0 {
                if closers.is_empty() {
                    return Ok(out);
                }
                return Err(ErrMode::Cut(expected_here(input, closers)));
            }
            if at_closer(input, closers) {
                input.reset(&line_start);
                return Ok(out);
            }
            if !skip_indent {
                input.reset(&line_start);
            }

            let before = input.checkpoint();
            match statement.parse_next(input) {
                Ok(record) => out.push(Cst::Record(record)),
                Err(ErrMode::Backtrack(_)) => {
                    input.reset(&before);
                    let mut names = expected_statements.to_vec();
                    names.extend_from_slice(closers);
                    return Err(ErrMode::Cut(expected_here(input, &names)));
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn at_closer(input: &mut Input<'_>, closers: &'static [&'static str]) -> bool {
    closers.iter().any(|closer| {
        let checkpoint = input.checkpoint();
        let found = peek(keyword(*closer)).parse_next(input).is_ok();
        input.reset(&checkpoint);
        found
    })
}

/// A backtrack error at the current position listing `names` as the expected tokens.
pub fn expected_here(input: &Input<'_>, names: &[&'static str]) -> ContextError {
    let start = input.checkpoint();
    names.iter().fold(ContextError::new(), |err, name| {
        err.add_context(
            input,
            &start,
            StrContext::Expected(StrContextValue::StringLiteral(name)),
        )
    })
}

/// Consumes a closing keyword and the rest of its line, failing hard if it is absent.
pub fn close_block<'a>(closer: &'static str) -> impl Parser<Input<'a>, (), ErrMode<ContextError>> {
    move |input: &mut Input<'a>| {
        hspace0.parse_next(input)?;
        cut_err((keyword(closer), eol)).void().parse_next(input)
    }
}

/// `accTitle: …`, `accDescr: …` or `accDescr { … }`.
pub fn accessibility<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let (kind, text) = alt((
        (
            keyword("accTitle"),
            hspace0,
            punct(':'),
            hspace0,
            spanned(text_to_eol),
            eol,
        )
            .map(|(_, _, _, _, text, ())| ("accTitle", text)),
        (
            keyword("accDescr"),
            hspace0,
            punct('{'),
            spanned(take_until(0.., "}").map(multiline_description)),
            cut_err(punct('}')),
            eol,
        )
            .map(|(_, _, _, text, _, ())| ("accDescr", text)),
        (
            keyword("accDescr"),
            hspace0,
            punct(':'),
            hspace0,
            spanned(text_to_eol),
            eol,
        )
            .map(|(_, _, _, _, text, ())| ("accDescr", text)),
    ))
    .parse_next(input)?;
    Ok(Record::new(kind, span_from(input, start)).with("text", text))
}

fn multiline_description(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// `title …` with either a space or a colon before the text.
pub fn title<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("title").parse_next(input)?;
    alt((hspace1.void(), (hspace0, punct(':')).void())).parse_next(input)?;
    hspace0.parse_next(input)?;
    let text = spanned(text_to_eol).parse_next(input)?;
    eol.parse_next(input)?;
    Ok(Record::new("title", span_from(input, start)).with("text", text))
}

/// `direction TB|TD|BT|LR|RL`
pub fn direction_statement<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("direction").parse_next(input)?;
    hspace1.parse_next(input)?;
    let dir = cut_err(spanned(direction)).parse_next(input)?;
    eol.parse_next(input)?;
    Ok(Record::new("direction", span_from(input, start)).with("value", dir))
}

pub fn direction<'a>(input: &mut Input<'a>) -> PResult<&'a str> {
    alt((
        keyword("TB"),
        keyword("TD"),
        keyword("BT"),
        keyword("LR"),
        keyword("RL"),
    ))
    .context(expected("direction"))
    .parse_next(input)
}

/// Header line: `keyword [extra]` followed by end of line.
///
/// `keywords` are tried in order, so longer spellings sharing a prefix must come first.
pub fn header<'a>(
    keywords: &'static [&'static str],
) -> impl Parser<Input<'a>, Record<'a>, ErrMode<ContextError>> {
    move |input: &mut Input<'a>| {
        let start = input.current_token_start();
        let kw = spanned(header_keyword(keywords)).parse_next(input)?;
        hspace0.parse_next(input)?;
        let rest = opt(spanned(text_to_eol).verify(|t: &Token<'a>| !t.text.is_empty())).parse_next(input)?;
        cut_err(eol).parse_next(input)?;
        Ok(Record::new("header", span_from(input, start))
            .with("keyword", kw)
            .with_opt("rest", rest))
    }
}

fn header_keyword<'a>(
    keywords: &'static [&'static str],
) -> impl Parser<Input<'a>, &'a str, ErrMode<ContextError>> {
    move |input: &mut Input<'a>| {
        for kw in keywords {
            let checkpoint = input.checkpoint();
            match (literal(*kw), peek(header_boundary)).take().parse_next(input) {
                Ok(found) => return Ok(found),
                Err(ErrMode::Backtrack(_)) => input.reset(&checkpoint),
                Err(err) => return Err(err),
            }
        }
        Err(ErrMode::Cut(expected_here(input, keywords)))
    }
}

fn header_boundary(input: &mut Input<'_>) -> PResult<()> {
    alt((
        hspace1.void(),
        ':'.void(),
        ';'.void(),
        "%%".void(),
        "\r\n".void(),
        '\n'.void(),
        winnow::combinator::eof.void(),
    ))
    .parse_next(input)
}

/// Converts a failed top-level parse into the public error shape.
pub fn grammar_error(
    notation: &'static str,
    text: &str,
    err: &ParseError<Input<'_>, ContextError>,
) -> GrammarError {
    let offset = err.offset();
    let mut expected = Vec::new();
    for ctx in err.inner().context() {
        let StrContext::Expected(value) = ctx else {
            continue;
        };
        let rendered = match value {
            StrContextValue::StringLiteral(s) => format!("`{s}`"),
            StrContextValue::CharLiteral(c) => format!("`{c}`"),
            StrContextValue::Description(d) => (*d).to_string(),
            _ => value.to_string(),
        };
        if !expected.contains(&rendered) {
            expected.push(rendered);
        }
    }
    if expected.is_empty() && offset >= text.len() {
        expected.push("end of input".to_string());
    }
    GrammarError {
        notation,
        offset,
        position: Position::of_offset(text, offset),
        expected,
    }
}

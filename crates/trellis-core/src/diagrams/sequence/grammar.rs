//! Sequence diagram statements.

use winnow::ascii::digit1;
use winnow::combinator::{alt, cut_err, not, opt, peek, preceded, repeat};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::stream::Location;
use winnow::token::{one_of, take_while};

use super::STATEMENTS;
use crate::cst::{Record, Token};
use crate::grammar::{accessibility, close_block, span_from, statements, title};
use crate::lex::{
    Input, PResult, eol, expected, hspace0, hspace1, keyword, keyword_ci, punct, spanned,
    strip_terminator, symbol, text_to_eol,
};

/// Message arrows, longest first so `-->>` is never read as `-->` followed by `>`.
pub(crate) const ARROWS: &[&str] = &[
    "<<-->>", "<<->>", "-->>", "->>", "-->", "->", "--x", "-x", "--)", "-)",
];

/// Keywords that end or divide a fragment body.
const CLOSERS: &[&str] = &["end", "else", "and", "option"];

pub(super) fn statement<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    alt((
        accessibility,
        title,
        participant,
        destroy,
        participant_box,
        activation,
        note,
        autonumber,
        fragment,
        message,
    ))
    .parse_next(input)
}

fn is_actor_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '$' | '#')
}

/// Participant ids. A `-` joins word characters unless it starts `-x`.
pub(crate) fn actor<'a>(input: &mut Input<'a>) -> PResult<Token<'a>> {
    spanned(
        (
            take_while(1.., is_actor_char),
            repeat(
                0..,
                alt((
                    take_while(1.., is_actor_char).void(),
                    ('-', not('x'), peek(one_of(is_actor_char))).void(),
                )),
            )
            .map(|()| ()),
        )
            .take(),
    )
    .context(expected("participant id"))
    .parse_next(input)
}

/// `[create] participant|actor ID [as alias]`
fn participant<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let created = opt((keyword("create"), hspace1)).parse_next(input)?;
    let kind = spanned(alt((keyword("participant"), keyword("actor")))).parse_next(input)?;
    hspace1.parse_next(input)?;
    let id = cut_err(actor).parse_next(input)?;
    let alias = opt(preceded(
        (hspace1, keyword("as"), hspace1),
        spanned(text_to_eol.map(strip_terminator)),
    ))
    .parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("participant", span_from(input, start))
        .with("kind", kind)
        .with("id", id)
        .with_opt("alias", alias)
        .with_flag("create", created.is_some()))
}

/// `destroy ID`
fn destroy<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("destroy").parse_next(input)?;
    hspace1.parse_next(input)?;
    let id = cut_err(actor).parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("destroy", span_from(input, start)).with("id", id))
}

/// `box [color] [title]` … `end`
fn participant_box<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("box").parse_next(input)?;
    hspace0.parse_next(input)?;
    let heading = spanned(text_to_eol).parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    let body = statements(statement, &["end"], STATEMENTS).parse_next(input)?;
    close_block("end").parse_next(input)?;
    Ok(Record::new("box", span_from(input, start))
        .with("heading", heading)
        .with("body", body))
}

/// `activate ID` / `deactivate ID`
fn activation<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let kind = alt((
        keyword("activate").map(|_| "activate"),
        keyword("deactivate").map(|_| "deactivate"),
    ))
    .parse_next(input)?;
    hspace1.parse_next(input)?;
    let id = cut_err(actor).parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new(kind, span_from(input, start)).with("id", id))
}

/// `Note left of A: text`, `note over A,B: text`
fn note<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword_ci("note").parse_next(input)?;
    hspace1.parse_next(input)?;
    let placement = cut_err(spanned(alt((
        (keyword_ci("left"), hspace1, keyword_ci("of")).take(),
        (keyword_ci("right"), hspace1, keyword_ci("of")).take(),
        keyword_ci("over"),
    ))))
    .context(expected("`left of`, `right of` or `over`"))
    .parse_next(input)?;
    hspace1.parse_next(input)?;
    let first = cut_err(actor).parse_next(input)?;
    let second = opt(preceded((hspace0, punct(','), hspace0), cut_err(actor))).parse_next(input)?;
    hspace0.parse_next(input)?;
    cut_err(punct(':')).parse_next(input)?;
    hspace0.parse_next(input)?;
    let text = spanned(text_to_eol.map(strip_terminator)).parse_next(input)?;
    eol.parse_next(input)?;
    let actors: Vec<Token<'a>> = std::iter::once(first).chain(second).collect();
    Ok(Record::new("note", span_from(input, start))
        .with("placement", placement)
        .with("actors", actors)
        .with("text", text))
}

/// `autonumber`, `autonumber 10`, `autonumber 10 5`, `autonumber off`
fn autonumber<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("autonumber").parse_next(input)?;
    let off = opt(preceded(hspace1, keyword("off"))).parse_next(input)?;
    let (mut first, mut step) = (None, None);
    if off.is_none() {
        first = opt(preceded(hspace1, spanned(digit1))).parse_next(input)?;
        if first.is_some() {
            step = opt(preceded(hspace1, spanned(digit1))).parse_next(input)?;
        }
    }
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("autonumber", span_from(input, start))
        .with_flag("off", off.is_some())
        .with_opt("start", first)
        .with_opt("step", step))
}

/// The keyword that opens another section of `kind`, if it has any.
pub(crate) fn divider(kind: &str) -> Option<&'static str> {
    match kind {
        "alt" => Some("else"),
        "par" => Some("and"),
        "critical" => Some("option"),
        _ => None,
    }
}

/// `loop|alt|opt|par|critical|break|rect [label]` … sections … `end`
fn fragment<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let kind = spanned(alt((
        keyword("loop"),
        keyword("alt"),
        keyword("opt"),
        keyword("par"),
        keyword("critical"),
        keyword("break"),
        keyword("rect"),
    )))
    .parse_next(input)?;
    let mut label = preceded(hspace0, spanned(text_to_eol)).parse_next(input)?;
    cut_err(eol).parse_next(input)?;

    let mut sections = Vec::new();
    loop {
        let section_start = input.current_token_start();
        let body = statements(statement, CLOSERS, STATEMENTS).parse_next(input)?;
        sections.push(
            Record::new("section", span_from(input, section_start))
                .with("label", label)
                .with("body", body),
        );
        let Some(next) = divider(&kind.text) else {
            break;
        };
        match opt(section_label(next)).parse_next(input)? {
            Some(next_label) => label = next_label,
            None => break,
        }
    }
    close_block("end").parse_next(input)?;
    Ok(Record::new("fragment", span_from(input, start))
        .with("kind", kind)
        .with("sections", sections))
}

fn section_label<'a>(
    divider: &'static str,
) -> impl Parser<Input<'a>, Token<'a>, ErrMode<ContextError>> {
    move |input: &mut Input<'a>| {
        hspace0.parse_next(input)?;
        keyword(divider).parse_next(input)?;
        let label = preceded(hspace0, spanned(text_to_eol)).parse_next(input)?;
        cut_err(eol).parse_next(input)?;
        Ok(label)
    }
}

fn arrow<'a>(input: &mut Input<'a>) -> PResult<Token<'a>> {
    let start = input.current_token_start();
    for op in ARROWS {
        if let Some(found) = opt(symbol(*op)).parse_next(input)? {
            return Ok(Token::new(found, span_from(input, start)));
        }
    }
    Err(ErrMode::Backtrack(ContextError::new()))
}

/// `A->>+B: text`; the `+`/`-` suffix belongs to the arrow, never to the receiver id.
fn message<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let from = actor.parse_next(input)?;
    hspace0.parse_next(input)?;
    let op = arrow.parse_next(input)?;
    let suffix = opt(spanned(one_of(['+', '-']).take())).parse_next(input)?;
    hspace0.parse_next(input)?;
    let to = cut_err(actor).parse_next(input)?;
    hspace0.parse_next(input)?;
    cut_err(punct(':')).parse_next(input)?;
    hspace0.parse_next(input)?;
    let text = spanned(text_to_eol.map(strip_terminator)).parse_next(input)?;
    eol.parse_next(input)?;
    Ok(Record::new("message", span_from(input, start))
        .with("from", from)
        .with("op", op)
        .with_opt("suffix", suffix)
        .with("to", to)
        .with("text", text))
}

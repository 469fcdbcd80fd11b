//! State diagram statements.

use winnow::combinator::{alt, cut_err, delimited, not, opt, preceded, terminated};
use winnow::prelude::*;
use winnow::stream::Location;
use winnow::token::take_until;

use super::STATEMENTS;
use crate::cst::{Record, Token};
use crate::diagrams::flowchart::grammar::{class_assign, class_def, class_name, style, vertex_id};
use crate::grammar::{accessibility, close_block, direction_statement, span_from, statements};
use crate::lex::{
    Input, PResult, eol, expected, hspace0, hspace1, keyword, punct, quoted, spanned,
    strip_terminator, symbol, text_to_eol,
};

/// The marker for the start or end pseudo-state of the enclosing scope.
pub(crate) const PSEUDO: &str = "[*]";

pub(super) fn statement<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    alt((
        accessibility,
        direction_statement,
        class_def,
        class_assign,
        style,
        state,
        note,
        divider,
        transition,
        description,
        bare_state,
    ))
    .parse_next(input)
}

fn state_ref<'a>(input: &mut Input<'a>) -> PResult<Token<'a>> {
    alt((spanned(symbol(PSEUDO)), vertex_id))
        .context(expected("state id"))
        .parse_next(input)
}

fn css_suffix<'a>(input: &mut Input<'a>) -> PResult<Option<Token<'a>>> {
    opt(preceded(symbol(":::"), cut_err(class_name))).parse_next(input)
}

fn colon_text<'a>(input: &mut Input<'a>) -> PResult<Token<'a>> {
    preceded(
        (terminated(punct(':'), not(':')), hspace0),
        spanned(text_to_eol.map(strip_terminator)),
    )
    .parse_next(input)
}

/// `state ["desc" as] ID [<<fork|join|choice>>] [:::cls] [: desc] [{ … }]`
fn state<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("state").parse_next(input)?;
    hspace1.parse_next(input)?;
    let label = opt(terminated(
        spanned(quoted),
        cut_err((hspace1, keyword("as"), hspace1)),
    ))
    .parse_next(input)?;
    let id = cut_err(vertex_id).parse_next(input)?;
    hspace0.parse_next(input)?;
    let pseudo = opt(delimited(
        symbol("<<"),
        cut_err(spanned(alt((keyword("fork"), keyword("join"), keyword("choice")))))
            .context(expected("fork, join or choice")),
        cut_err(symbol(">>")),
    ))
    .parse_next(input)?;
    let css = css_suffix.parse_next(input)?;
    hspace0.parse_next(input)?;
    let text = opt(colon_text).parse_next(input)?;
    hspace0.parse_next(input)?;
    let body = match opt(punct('{')).parse_next(input)? {
        Some(_) => {
            cut_err(eol).parse_next(input)?;
            let body = statements(statement, &["}"], STATEMENTS).parse_next(input)?;
            close_block("}").parse_next(input)?;
            Some(body)
        }
        None => {
            cut_err(eol).parse_next(input)?;
            None
        }
    };
    Ok(Record::new("state", span_from(input, start))
        .with("id", id)
        .with_opt("label", label)
        .with_opt("pseudo", pseudo)
        .with_opt("css", css)
        .with_opt("description", text)
        .with_opt("body", body))
}

/// `note left of X : text` or a multi-line note closed by `end note`.
fn note<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("note").parse_next(input)?;
    hspace1.parse_next(input)?;
    let placement = cut_err(spanned(alt((
        (keyword("left"), hspace1, keyword("of")).take(),
        (keyword("right"), hspace1, keyword("of")).take(),
    ))))
    .context(expected("`left of` or `right of`"))
    .parse_next(input)?;
    hspace1.parse_next(input)?;
    let target = cut_err(vertex_id).parse_next(input)?;
    hspace0.parse_next(input)?;
    let text = match opt(colon_text).parse_next(input)? {
        Some(text) => {
            eol.parse_next(input)?;
            text
        }
        None => {
            cut_err(eol).parse_next(input)?;
            let text = spanned(take_until(0.., "end note").map(str::trim)).parse_next(input)?;
            cut_err((symbol("end note"), eol)).parse_next(input)?;
            text
        }
    };
    Ok(Record::new("note", span_from(input, start))
        .with("placement", placement)
        .with("target", target)
        .with("text", text))
}

/// `--` between concurrent regions of a composite state.
fn divider<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    (symbol("--"), not('-'), not('>'), eol).parse_next(input)?;
    Ok(Record::new("divider", span_from(input, start)))
}

/// `A --> B : label`, with `[*]` on either side.
fn transition<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let from = state_ref.parse_next(input)?;
    let from_css = css_suffix.parse_next(input)?;
    hspace0.parse_next(input)?;
    symbol("-->").parse_next(input)?;
    hspace0.parse_next(input)?;
    let to = cut_err(state_ref).parse_next(input)?;
    let to_css = css_suffix.parse_next(input)?;
    hspace0.parse_next(input)?;
    let label = opt(colon_text).parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("transition", span_from(input, start))
        .with("from", from)
        .with_opt("fromCss", from_css)
        .with("to", to)
        .with_opt("toCss", to_css)
        .with_opt("label", label))
}

/// `X : description`
fn description<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let id = vertex_id.parse_next(input)?;
    hspace0.parse_next(input)?;
    let text = colon_text.parse_next(input)?;
    eol.parse_next(input)?;
    Ok(Record::new("description", span_from(input, start))
        .with("id", id)
        .with("text", text))
}

/// `X` or `X:::cls` alone on a line.
fn bare_state<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let id = vertex_id.parse_next(input)?;
    let css = css_suffix.parse_next(input)?;
    eol.parse_next(input)?;
    Ok(Record::new("state", span_from(input, start))
        .with("id", id)
        .with_opt("css", css))
}

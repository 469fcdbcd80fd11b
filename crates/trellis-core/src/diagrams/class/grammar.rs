//! Class diagram statements.

use winnow::combinator::{alt, cut_err, delimited, not, opt, preceded, terminated};
use winnow::prelude::*;
use winnow::stream::Location;
use winnow::token::{one_of, take_until, take_while};

use super::STATEMENTS;
use crate::cst::{Record, Token};
use crate::diagrams::flowchart::grammar::{class_def, class_name, style, vertex_id};
use crate::grammar::{accessibility, close_block, direction_statement, span_from, statements};
use crate::lex::{
    Input, PResult, eol, expected, hspace0, hspace1, is_ident_char, keyword, label_until, punct,
    quoted, spanned, strip_terminator, symbol, text_to_eol,
};

pub(super) fn statement<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    alt((
        accessibility,
        direction_statement,
        namespace,
        class_statement,
        annotation,
        note,
        class_def,
        css_class,
        style,
        relation,
        member,
    ))
    .parse_next(input)
}

fn is_generic_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '~' | ',' | '.')
}

/// `Name` or `Name~T~`
fn class_ref<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let id = vertex_id.parse_next(input)?;
    let generic = opt(delimited(
        punct('~'),
        spanned(take_while(1.., is_generic_char)
            .verify(|g: &str| g.ends_with('~'))
            .map(|g: &'a str| &g[..g.len() - 1])),
        hspace0,
    ))
    .parse_next(input)?;
    Ok(Record::new("classRef", span_from(input, start))
        .with("id", id)
        .with_opt("generic", generic))
}

/// `class Name~T~["label"]:::css { members }`
fn class_statement<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("class").parse_next(input)?;
    hspace1.parse_next(input)?;
    let class = cut_err(class_ref).parse_next(input)?;
    let label = opt(delimited(
        (punct('['), hspace0),
        cut_err(spanned(quoted)),
        cut_err((hspace0, punct(']'))),
    ))
    .parse_next(input)?;
    let css = opt(preceded(symbol(":::"), cut_err(class_name))).parse_next(input)?;
    hspace0.parse_next(input)?;
    let body = opt(preceded(
        punct('{'),
        cut_err(terminated(spanned(take_until(0.., "}")), punct('}'))),
    ))
    .parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("class", span_from(input, start))
        .with("class", class)
        .with_opt("label", label)
        .with_opt("css", css)
        .with_opt("body", body))
}

/// `<<interface>> Name`
fn annotation<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    symbol("<<").parse_next(input)?;
    let name = cut_err(spanned(label_until(">>").map(str::trim))).parse_next(input)?;
    cut_err(symbol(">>")).parse_next(input)?;
    hspace0.parse_next(input)?;
    let class = cut_err(class_ref).parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("annotation", span_from(input, start))
        .with("name", name)
        .with("class", class))
}

/// `note for Name "text"` or `note "text"`
fn note<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("note").parse_next(input)?;
    hspace1.parse_next(input)?;
    let target = opt(delimited(
        (keyword("for"), hspace1),
        cut_err(vertex_id),
        hspace1,
    ))
    .parse_next(input)?;
    let text = cut_err(spanned(quoted)).parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("note", span_from(input, start))
        .with_opt("target", target)
        .with("text", text))
}

/// `cssClass "A,B" highlighted`
fn css_class<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("cssClass").parse_next(input)?;
    hspace1.parse_next(input)?;
    let ids = cut_err(spanned(quoted)).parse_next(input)?;
    hspace1.parse_next(input)?;
    let class = cut_err(class_name).parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("cssClass", span_from(input, start))
        .with("ids", ids)
        .with("class", class))
}

/// `namespace Name {` … `}`
fn namespace<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("namespace").parse_next(input)?;
    hspace1.parse_next(input)?;
    let id = cut_err(spanned(take_while(1.., |c: char| is_ident_char(c) || c == '.')))
        .context(expected("namespace name"))
        .parse_next(input)?;
    hspace0.parse_next(input)?;
    cut_err(punct('{')).parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    let body = statements(statement, &["}"], STATEMENTS).parse_next(input)?;
    close_block("}").parse_next(input)?;
    Ok(Record::new("namespace", span_from(input, start))
        .with("id", id)
        .with("body", body))
}

fn left_end<'a>(input: &mut Input<'a>) -> PResult<&'a str> {
    alt((symbol("<|"), symbol("()"), symbol("*"), symbol("o"), symbol("<"))).parse_next(input)
}

fn right_end<'a>(input: &mut Input<'a>) -> PResult<&'a str> {
    alt((
        symbol("|>"),
        symbol("()"),
        symbol("*"),
        terminated(symbol("o"), not(one_of(is_ident_char))),
        symbol(">"),
    ))
    .parse_next(input)
}

/// `<|--`, `*--`, `o..`, `-->`, `..|>`, `()--`, `--`, `..`
fn relation_op<'a>(input: &mut Input<'a>) -> PResult<Token<'a>> {
    spanned(
        (
            opt(left_end),
            alt((symbol("--"), symbol(".."))),
            opt(right_end),
        )
            .take(),
    )
    .parse_next(input)
}

/// `A "1" <|-- "many" B : label`
fn relation<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let from = class_ref.parse_next(input)?;
    hspace0.parse_next(input)?;
    let from_card = opt(terminated(spanned(quoted), hspace0)).parse_next(input)?;
    let op = relation_op.parse_next(input)?;
    hspace0.parse_next(input)?;
    let to_card = opt(terminated(spanned(quoted), hspace0)).parse_next(input)?;
    let to = cut_err(class_ref).parse_next(input)?;
    hspace0.parse_next(input)?;
    let label = opt(preceded(
        punct(':'),
        spanned(text_to_eol.map(strip_terminator)),
    ))
    .parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("relation", span_from(input, start))
        .with("from", from)
        .with_opt("fromCardinality", from_card)
        .with("op", op)
        .with_opt("toCardinality", to_card)
        .with("to", to)
        .with_opt("label", label))
}

/// `Name : +attribute` or `Name : method()`
fn member<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let class = class_ref.parse_next(input)?;
    hspace0.parse_next(input)?;
    punct(':').parse_next(input)?;
    hspace0.parse_next(input)?;
    let text = cut_err(
        spanned(text_to_eol.map(strip_terminator))
            .verify(|t: &Token<'a>| !t.text.is_empty())
            .context(expected("class member")),
    )
    .parse_next(input)?;
    eol.parse_next(input)?;
    Ok(Record::new("member", span_from(input, start))
        .with("class", class)
        .with("text", text))
}

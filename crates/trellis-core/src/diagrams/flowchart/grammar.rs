//! Flowchart statements. Vertex shapes and link operators are shared with block diagrams.

use winnow::ascii::digit1;
use winnow::combinator::{alt, cut_err, not, opt, peek, preceded, repeat, separated, terminated};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::stream::Location;
use winnow::token::{one_of, take_while};

use super::{LinkOp, STATEMENTS};
use crate::cst::{Cst, Record, Token};
use crate::grammar::{
    accessibility, close_block, direction_statement, expected_here, span_from, statements,
};
use crate::lex::{
    Input, PResult, eol, expected, hspace0, hspace1, identifier, is_ident_char, keyword,
    label_until, label_until_any, punct, quoted, spanned, strip_terminator, symbol, text_to_eol,
};

/// Vertex delimiters: opener and the closers it accepts, longest opener first.
pub(crate) const SHAPES: &[(&str, &[&str])] = &[
    ("(((", &[")))"]),
    ("((", &["))"]),
    ("([", &["])"]),
    ("[[", &["]]"]),
    ("[(", &[")]"]),
    ("[/", &["/]", "\\]"]),
    ("[\\", &["\\]", "/]"]),
    ("{{", &["}}"]),
    ("{", &["}"]),
    ("(", &[")"]),
    (">", &["]"]),
    ("[", &["]"]),
];

pub(super) fn statement<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    alt((
        accessibility,
        direction_statement,
        subgraph,
        class_def,
        class_assign,
        style,
        link_style,
        click,
        chain,
    ))
    .parse_next(input)
}

fn is_vertex_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Vertex ids: word characters, with `-` allowed between them but never starting a link.
pub(crate) fn vertex_id<'a>(input: &mut Input<'a>) -> PResult<Token<'a>> {
    spanned(
        (
            take_while(1.., is_vertex_char),
            repeat(
                0..,
                alt((
                    take_while(1.., is_vertex_char).void(),
                    ('-', peek(one_of(is_vertex_char))).void(),
                )),
            )
            .map(|()| ()),
        )
            .take(),
    )
    .context(expected("node id"))
    .parse_next(input)
}

pub(crate) fn class_name<'a>(input: &mut Input<'a>) -> PResult<Token<'a>> {
    spanned(take_while(1.., |c: char| c.is_alphanumeric() || matches!(c, '_' | '-')))
        .context(expected("class name"))
        .parse_next(input)
}

/// A delimited vertex label. Once an opener matches, its closer is mandatory.
pub(crate) fn shaped_label<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    for &(open, closers) in SHAPES {
        if opt(symbol(open)).parse_next(input)?.is_none() {
            continue;
        }
        let opener = Token::new(open, span_from(input, start));
        let label = alt((
            terminated(spanned(quoted), peek((hspace0, closing(closers)))),
            spanned(label_until_any(closers)),
        ))
        .parse_next(input)?;
        hspace0.parse_next(input)?;
        let close_start = input.current_token_start();
        let closer = cut_err(closing(closers)).parse_next(input)?;
        return Ok(Record::new("shape", span_from(input, start))
            .with("opener", opener)
            .with("closer", Token::new(closer, span_from(input, close_start)))
            .with("label", label));
    }
    Err(ErrMode::Backtrack(ContextError::new()))
}

fn closing<'a>(
    closers: &'static [&'static str],
) -> impl Parser<Input<'a>, &'a str, ErrMode<ContextError>> {
    move |input: &mut Input<'a>| {
        for close in closers {
            if let Some(found) = opt(symbol(*close)).parse_next(input)? {
                return Ok(found);
            }
        }
        Err(ErrMode::Backtrack(expected_here(input, closers)))
    }
}

/// `id`, `id<shape>` and an optional `:::class` suffix.
pub(crate) fn vertex<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let id = vertex_id.parse_next(input)?;
    let shape = opt(shaped_label).parse_next(input)?;
    let class = opt(preceded(symbol(":::"), cut_err(class_name))).parse_next(input)?;
    Ok(Record::new("vertex", span_from(input, start))
        .with("id", id)
        .with_opt("shape", shape)
        .with_opt("class", class))
}

/// `A & B`
fn group<'a>(input: &mut Input<'a>) -> PResult<Vec<Cst<'a>>> {
    separated(1.., vertex, (hspace0, punct('&'), hspace0))
        .map(|nodes: Vec<Record<'a>>| nodes.into_iter().map(Cst::Record).collect())
        .parse_next(input)
}

/// `A --> B -- text --> C & D`
fn chain<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let mut groups = vec![Cst::from(group.parse_next(input)?)];
    let mut links = Vec::new();
    loop {
        hspace0.parse_next(input)?;
        let Some(found) = opt(link).parse_next(input)? else {
            break;
        };
        hspace0.parse_next(input)?;
        let next = cut_err(group).parse_next(input)?;
        links.push(Cst::Record(found));
        groups.push(Cst::from(next));
    }
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("chain", span_from(input, start))
        .with("groups", groups)
        .with("links", links))
}

fn start_head(input: &mut Input<'_>) -> PResult<char> {
    terminated(one_of(['<', 'x', 'o']), peek(one_of(['-', '=', '.']))).parse_next(input)
}

fn end_head(input: &mut Input<'_>) -> PResult<char> {
    alt((
        '>',
        terminated(one_of(['x', 'o']), not(one_of(is_ident_char))),
    ))
    .parse_next(input)
}

fn link_line<'a>(input: &mut Input<'a>) -> PResult<&'a str> {
    alt((
        ('-', take_while(1.., '.'), '-').take(),
        take_while(2.., '='),
        take_while(2.., '-'),
        take_while(3.., '~'),
        terminated("-", peek('>')),
    ))
    .parse_next(input)
}

/// `-->`, `<==>`, `-.-x`, `~~~`, the short `->` and the longer spellings.
fn plain_link<'a>(input: &mut Input<'a>) -> PResult<Token<'a>> {
    spanned(
        (opt(start_head), link_line, opt(end_head))
            .take()
            .verify(|op: &str| LinkOp::decode(op).is_some()),
    )
    .parse_next(input)
}

/// `-- text -->`, `== text ==>`, `-. text .->`
fn labeled_link<'a>(input: &mut Input<'a>) -> PResult<(Token<'a>, Token<'a>)> {
    let start = input.current_token_start();
    let head = opt(start_head).parse_next(input)?;
    let open = alt((symbol("--"), symbol("=="), symbol("-."))).parse_next(input)?;
    let label_start: PResult<()> = not(one_of(['-', '=', '.', '>', '~', '|'])).parse_next(input);
    label_start?;
    let marker = match open {
        "--" => "--",
        "==" => "==",
        _ => ".-",
    };
    let label = spanned(label_until(marker).map(str::trim)).parse_next(input)?;
    let close = match open {
        "--" => (take_while(2.., '-'), opt(end_head)).take().parse_next(input)?,
        "==" => (take_while(2.., '='), opt(end_head)).take().parse_next(input)?,
        _ => (take_while(1.., '.'), '-', opt(end_head)).take().parse_next(input)?,
    };
    let mut op = head.map(String::from).unwrap_or_default();
    if open == "-." {
        op.push('-');
    }
    op.push_str(close);
    if LinkOp::decode(&op).is_none() {
        return Err(ErrMode::Backtrack(ContextError::new()));
    }
    Ok((Token::new(op, span_from(input, start)), label))
}

/// A link operator with its optional `|label|`.
pub(crate) fn link<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let (op, inline) = alt((
        plain_link.map(|op| (op, None)),
        labeled_link.map(|(op, label)| (op, Some(label))),
    ))
    .parse_next(input)?;
    let piped = opt(preceded(
        (hspace0, punct('|')),
        cut_err(terminated(spanned(label_until("|")), punct('|'))),
    ))
    .parse_next(input)?;
    Ok(Record::new("link", span_from(input, start))
        .with("op", op)
        .with_opt("label", piped.or(inline)))
}

/// `subgraph id`, `subgraph id [title]`, `subgraph "title"` or `subgraph free title` … `end`
fn subgraph<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("subgraph").parse_next(input)?;
    cut_err(hspace1).parse_next(input)?;
    let (mut id, mut title, mut text) = (None, None, None);
    if let Some(quoted_title) = opt(spanned(quoted)).parse_next(input)? {
        title = Some(quoted_title);
    } else if let Some((heading_id, heading_title)) = opt(bracketed_heading).parse_next(input)? {
        id = Some(heading_id);
        title = Some(heading_title);
    } else {
        text = Some(
            cut_err(
                spanned(text_to_eol.map(strip_terminator))
                    .verify(|t: &Token<'a>| !t.text.is_empty())
                    .context(expected("subgraph id or title")),
            )
            .parse_next(input)?,
        );
    }
    cut_err(eol).parse_next(input)?;
    let body = statements(statement, &["end"], STATEMENTS).parse_next(input)?;
    close_block("end").parse_next(input)?;
    Ok(Record::new("subgraph", span_from(input, start))
        .with_opt("id", id)
        .with_opt("title", title)
        .with_opt("text", text)
        .with("body", body))
}

fn bracketed_heading<'a>(input: &mut Input<'a>) -> PResult<(Token<'a>, Token<'a>)> {
    let id = vertex_id.parse_next(input)?;
    hspace0.parse_next(input)?;
    punct('[').parse_next(input)?;
    let title = cut_err(alt((
        terminated(spanned(quoted), peek((hspace0, punct(']')))),
        spanned(label_until("]")),
    )))
    .parse_next(input)?;
    hspace0.parse_next(input)?;
    cut_err(punct(']')).parse_next(input)?;
    Ok((id, title))
}

pub(crate) fn class_names<'a>(input: &mut Input<'a>) -> PResult<Vec<Cst<'a>>> {
    separated(1.., class_name, (hspace0, punct(','), hspace0))
        .map(|names: Vec<Token<'a>>| names.into_iter().map(Cst::Token).collect())
        .parse_next(input)
}

pub(crate) fn vertex_list<'a>(input: &mut Input<'a>) -> PResult<Vec<Cst<'a>>> {
    separated(1.., vertex_id, (hspace0, punct(','), hspace0))
        .map(|ids: Vec<Token<'a>>| ids.into_iter().map(Cst::Token).collect())
        .parse_next(input)
}

/// `classDef a,b fill:#f9f,stroke:#333`
pub(crate) fn class_def<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("classDef").parse_next(input)?;
    hspace1.parse_next(input)?;
    let names = cut_err(class_names).parse_next(input)?;
    hspace0.parse_next(input)?;
    let styles = spanned(text_to_eol).parse_next(input)?;
    eol.parse_next(input)?;
    Ok(Record::new("classDef", span_from(input, start))
        .with("names", names)
        .with("styles", styles))
}

/// `class a,b cls`
pub(crate) fn class_assign<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("class").parse_next(input)?;
    hspace1.parse_next(input)?;
    let ids = vertex_list.parse_next(input)?;
    hspace1.parse_next(input)?;
    let classes = cut_err(class_names).parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("class", span_from(input, start))
        .with("ids", ids)
        .with("classes", classes))
}

/// `style id fill:#f9f,stroke:#333`
pub(crate) fn style<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("style").parse_next(input)?;
    hspace1.parse_next(input)?;
    let id = vertex_id.parse_next(input)?;
    hspace1.parse_next(input)?;
    let styles = cut_err(spanned(text_to_eol)).parse_next(input)?;
    eol.parse_next(input)?;
    Ok(Record::new("style", span_from(input, start))
        .with("id", id)
        .with("styles", styles))
}

/// `linkStyle default|0,1 [interpolate basis] stroke:#f00`
fn link_style<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("linkStyle").parse_next(input)?;
    hspace1.parse_next(input)?;
    let positions = cut_err(spanned(alt((
        keyword("default"),
        separated(1.., digit1, (hspace0, punct(','), hspace0))
            .map(|()| ())
            .take(),
    ))))
    .context(expected("link index or `default`"))
    .parse_next(input)?;
    hspace0.parse_next(input)?;
    let interpolate = opt(preceded(
        (keyword("interpolate"), hspace1),
        cut_err(spanned(identifier)),
    ))
    .parse_next(input)?;
    hspace0.parse_next(input)?;
    let styles = spanned(text_to_eol).parse_next(input)?;
    eol.parse_next(input)?;
    Ok(Record::new("linkStyle", span_from(input, start))
        .with("positions", positions)
        .with_opt("interpolate", interpolate)
        .with("styles", styles))
}

/// `click id callback`, `click id call fn(args)`, `click id [href] "url" ["tooltip"] [target]`
fn click<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("click").parse_next(input)?;
    hspace1.parse_next(input)?;
    let id = cut_err(vertex_id).parse_next(input)?;
    cut_err(hspace1).parse_next(input)?;
    let (action, value) = cut_err(alt((
        preceded((keyword("href"), hspace1), spanned(quoted)).map(|url| ("href", url)),
        spanned(quoted).map(|url| ("href", url)),
        preceded((keyword("call"), hspace1), spanned(identifier)).map(|cb| ("callback", cb)),
        spanned(identifier).map(|cb| ("callback", cb)),
    )))
    .parse_next(input)?;
    let args = if action == "callback" {
        opt(preceded(
            punct('('),
            cut_err(terminated(spanned(label_until(")")), punct(')'))),
        ))
        .parse_next(input)?
    } else {
        None
    };
    let tooltip = opt(preceded(hspace1, spanned(quoted))).parse_next(input)?;
    let link_target = opt(preceded(
        hspace1,
        spanned(alt((
            keyword("_blank"),
            keyword("_self"),
            keyword("_parent"),
            keyword("_top"),
        ))),
    ))
    .parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("click", span_from(input, start))
        .with("id", id)
        .with(action, value)
        .with_opt("args", args)
        .with_opt("tooltip", tooltip)
        .with_opt("target", link_target))
}

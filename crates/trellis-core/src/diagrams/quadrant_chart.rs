use std::borrow::Cow;

use indexmap::IndexMap;
use serde::Serialize;
use winnow::combinator::{alt, cut_err, opt, preceded};
use winnow::prelude::*;
use winnow::stream::Location;
use winnow::token::take_while;

use crate::canon::{apply_accessibility, merge_opt};
use crate::config::Config;
use crate::cst::{Document, Record, Token};
use crate::error::{CanonResult, GrammarError, Result};
use crate::grammar::{self, accessibility, header, span_from, title};
use crate::lex::{
    Input, PResult, decimal, eol, hspace0, hspace1, identifier, keyword, label_until, punct,
    quoted, spanned, text_to_eol,
};
use crate::model::{Accessibility, Model};

pub const NOTATION: &str = "quadrantChart";
pub const HEADERS: &[&str] = &["quadrantChart"];
const STATEMENTS: &[&str] = &[
    "title",
    "x-axis",
    "y-axis",
    "quadrant-1",
    "quadrant-2",
    "quadrant-3",
    "quadrant-4",
    "classDef",
    "point",
    "accTitle",
    "accDescr",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuadrantModel {
    pub title: Option<String>,
    pub x_axis: Axis,
    pub y_axis: Axis,
    pub quadrants: Quadrants,
    pub points: Vec<QuadrantPoint>,
    pub class_defs: IndexMap<String, Vec<String>>,
    pub acc: Accessibility,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Axis {
    pub low: Option<String>,
    pub high: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quadrants {
    pub q1: Option<String>,
    pub q2: Option<String>,
    pub q3: Option<String>,
    pub q4: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuadrantPoint {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub class_name: Option<String>,
    pub styles: Vec<String>,
}

impl QuadrantModel {
    pub fn point(&self, name: &str) -> Option<&QuadrantPoint> {
        self.points.iter().find(|p| p.name == name)
    }

    /// Quadrant number (1 = top right, counter-clockwise) a point falls into.
    pub fn quadrant_of(point: &QuadrantPoint) -> u8 {
        match (point.x >= 0.5, point.y >= 0.5) {
            (true, true) => 1,
            (false, true) => 2,
            (false, false) => 3,
            (true, false) => 4,
        }
    }
}

impl Model for QuadrantModel {
    fn entity_ids(&self) -> Vec<&str> {
        self.points.iter().map(|p| p.name.as_str()).collect()
    }

    fn relation_endpoints(&self) -> Vec<(&str, &str)> {
        Vec::new()
    }

    fn group_refs(&self) -> Vec<(&str, &str)> {
        self.points
            .iter()
            .filter_map(|p| Some((p.name.as_str(), p.class_name.as_deref()?)))
            .collect()
    }

    fn group_ids(&self) -> Vec<&str> {
        self.class_defs.keys().map(String::as_str).collect()
    }
}

pub fn parse(text: &str, config: &Config) -> Result<QuadrantModel> {
    let doc = parse_document(text)?;
    super::canonicalized(NOTATION, transform(&doc, config))
}

pub fn parse_document(text: &str) -> std::result::Result<Document<'_>, GrammarError> {
    grammar::parse_document(NOTATION, text, header(HEADERS), statement, STATEMENTS)
}

fn statement<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    alt((
        accessibility,
        title,
        axis,
        quadrant,
        class_def,
        point,
    ))
    .parse_next(input)
}

/// `x-axis low [--> high]`
fn axis<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let which = spanned(alt((keyword("x-axis"), keyword("y-axis")))).parse_next(input)?;
    hspace1.parse_next(input)?;
    let low = spanned(label_until("-->").map(str::trim)).parse_next(input)?;
    let high = opt(preceded("-->", spanned(text_to_eol))).parse_next(input)?;
    eol.parse_next(input)?;
    Ok(Record::new("axis", span_from(input, start))
        .with("axis", which)
        .with("low", low)
        .with_opt("high", high))
}

fn quadrant<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let which = spanned(alt((
        keyword("quadrant-1"),
        keyword("quadrant-2"),
        keyword("quadrant-3"),
        keyword("quadrant-4"),
    )))
    .parse_next(input)?;
    hspace1.parse_next(input)?;
    let text = spanned(text_to_eol).parse_next(input)?;
    eol.parse_next(input)?;
    Ok(Record::new("quadrant", span_from(input, start))
        .with("quadrant", which)
        .with("text", text))
}

fn class_def<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("classDef").parse_next(input)?;
    hspace1.parse_next(input)?;
    let name = cut_err(spanned(identifier)).parse_next(input)?;
    hspace0.parse_next(input)?;
    let styles = spanned(text_to_eol).parse_next(input)?;
    eol.parse_next(input)?;
    Ok(Record::new("classDef", span_from(input, start))
        .with("name", name)
        .with("styles", styles))
}

/// `Name[:::class]: [x, y] [style: value, …]`
fn point<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let name = spanned(alt((
        quoted,
        take_while(1.., |c: char| !matches!(c, ':' | '\n' | '\r'))
            .map(str::trim)
            .map(Cow::Borrowed),
    )))
    .verify(|t: &Token<'a>| !t.text.is_empty())
    .parse_next(input)?;
    let class = opt(preceded(":::", spanned(identifier))).parse_next(input)?;
    hspace0.parse_next(input)?;
    punct(':').parse_next(input)?;
    hspace0.parse_next(input)?;
    cut_err(punct('[')).parse_next(input)?;
    hspace0.parse_next(input)?;
    let x = cut_err(spanned(decimal.take())).parse_next(input)?;
    hspace0.parse_next(input)?;
    cut_err(punct(',')).parse_next(input)?;
    hspace0.parse_next(input)?;
    let y = cut_err(spanned(decimal.take())).parse_next(input)?;
    hspace0.parse_next(input)?;
    cut_err(punct(']')).parse_next(input)?;
    hspace0.parse_next(input)?;
    let styles = opt(spanned(text_to_eol).verify(|t: &Token<'a>| !t.text.is_empty()))
        .parse_next(input)?;
    eol.parse_next(input)?;
    Ok(Record::new("point", span_from(input, start))
        .with("name", name)
        .with_opt("class", class)
        .with("x", x)
        .with("y", y)
        .with_opt("styles", styles))
}

fn split_styles(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn unquote(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let raw = raw
        .strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .unwrap_or(raw);
    Some(raw.to_string()).filter(|s| !s.is_empty())
}

pub fn transform(doc: &Document<'_>, _config: &Config) -> CanonResult<QuadrantModel> {
    let mut model = QuadrantModel::default();

    for stmt in doc.statements() {
        if apply_accessibility(&mut model.acc, stmt) {
            continue;
        }
        match stmt.kind {
            "title" => model.title = stmt.non_empty_text("text").map(str::to_string),
            "axis" => {
                let axis = if stmt.require_text("axis")? == "x-axis" {
                    &mut model.x_axis
                } else {
                    &mut model.y_axis
                };
                merge_opt(&mut axis.low, stmt.text("low").and_then(unquote));
                merge_opt(&mut axis.high, stmt.text("high").and_then(unquote));
            }
            "quadrant" => {
                let text = stmt.text("text").and_then(unquote);
                let slot = match stmt.require_text("quadrant")? {
                    "quadrant-1" => &mut model.quadrants.q1,
                    "quadrant-2" => &mut model.quadrants.q2,
                    "quadrant-3" => &mut model.quadrants.q3,
                    _ => &mut model.quadrants.q4,
                };
                *slot = text;
            }
            "classDef" => {
                let name = stmt.require_text("name")?.to_string();
                let styles = split_styles(stmt.text("styles").unwrap_or_default());
                model.class_defs.insert(name, styles);
            }
            "point" => {
                let name = stmt.require_text("name")?;
                let x = coordinate(doc, stmt, "x")?;
                let y = coordinate(doc, stmt, "y")?;
                model.points.push(QuadrantPoint {
                    name: name.to_string(),
                    x,
                    y,
                    class_name: stmt.text("class").map(str::to_string),
                    styles: split_styles(stmt.text("styles").unwrap_or_default()),
                });
            }
            _ => {}
        }
    }

    tracing::debug!(points = model.points.len(), "quadrant chart canonicalized");
    Ok(model)
}

fn coordinate(doc: &Document<'_>, stmt: &Record<'_>, field: &'static str) -> CanonResult<f64> {
    let raw = stmt.require_text(field)?;
    match raw.parse::<f64>() {
        Ok(v) if (0.0..=1.0).contains(&v) => Ok(v),
        _ => Err(doc.invalid(
            stmt,
            format!("point {field} coordinate {raw} is outside [0, 1]"),
        )),
    }
}

use serde::Serialize;
use winnow::combinator::{alt, cut_err};
use winnow::prelude::*;
use winnow::stream::Location;

use crate::canon::apply_accessibility;
use crate::config::Config;
use crate::cst::{Document, Record};
use crate::error::{CanonResult, GrammarError, Result};
use crate::grammar::{self, accessibility, header, span_from, title};
use crate::lex::{Input, PResult, decimal, eol, hspace0, punct, quoted, spanned};
use crate::model::{Accessibility, Model};

pub const NOTATION: &str = "pie";
pub const HEADERS: &[&str] = &["pie"];
const STATEMENTS: &[&str] = &["title", "accTitle", "accDescr", "quoted slice label"];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PieModel {
    pub show_data: bool,
    pub title: Option<String>,
    pub slices: Vec<PieSlice>,
    pub acc: Accessibility,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PieSlice {
    pub label: String,
    pub value: f64,
}

impl PieModel {
    pub fn slice(&self, label: &str) -> Option<&PieSlice> {
        self.slices.iter().find(|s| s.label == label)
    }

    pub fn total(&self) -> f64 {
        self.slices.iter().map(|s| s.value).sum()
    }
}

impl Model for PieModel {
    fn entity_ids(&self) -> Vec<&str> {
        self.slices.iter().map(|s| s.label.as_str()).collect()
    }

    fn relation_endpoints(&self) -> Vec<(&str, &str)> {
        Vec::new()
    }
}

pub fn parse(text: &str, config: &Config) -> Result<PieModel> {
    let doc = parse_document(text)?;
    super::canonicalized(NOTATION, transform(&doc, config))
}

pub fn parse_document(text: &str) -> std::result::Result<Document<'_>, GrammarError> {
    grammar::parse_document(NOTATION, text, header(HEADERS), statement, STATEMENTS)
}

fn statement<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    alt((accessibility, title, slice)).parse_next(input)
}

/// `"label" : value`
fn slice<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let label = spanned(quoted).parse_next(input)?;
    hspace0.parse_next(input)?;
    cut_err(punct(':')).parse_next(input)?;
    hspace0.parse_next(input)?;
    let value = cut_err(spanned(decimal.take())).parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("slice", span_from(input, start))
        .with("label", label)
        .with("value", value))
}

pub fn transform(doc: &Document<'_>, _config: &Config) -> CanonResult<PieModel> {
    let mut model = PieModel::default();

    // The header line may carry `showData` and/or an inline `title ...`.
    if let Some(rest) = doc.header()?.non_empty_text("rest") {
        let mut rest = rest;
        if let Some(after) = rest.strip_prefix("showData") {
            model.show_data = true;
            rest = after.trim_start();
        }
        if let Some(t) = rest.strip_prefix("title") {
            model.title = Some(t.trim().to_string()).filter(|t| !t.is_empty());
        }
    }

    for stmt in doc.statements() {
        if apply_accessibility(&mut model.acc, stmt) {
            continue;
        }
        match stmt.kind {
            "title" => model.title = stmt.non_empty_text("text").map(str::to_string),
            "slice" => {
                let label = stmt.require_text("label")?;
                let raw = stmt.require_text("value")?;
                let value: f64 = raw
                    .parse()
                    .map_err(|_| doc.invalid(stmt, format!("invalid slice value `{raw}`")))?;
                if value < 0.0 {
                    return Err(doc.invalid(
                        stmt,
                        format!("slice \"{label}\" has negative value {value}"),
                    ));
                }
                if model.slice(label).is_some() {
                    tracing::trace!(label, "duplicate slice label keeps first value");
                    continue;
                }
                model.slices.push(PieSlice {
                    label: label.to_string(),
                    value,
                });
            }
            _ => {}
        }
    }

    tracing::debug!(slices = model.slices.len(), "pie canonicalized");
    Ok(model)
}

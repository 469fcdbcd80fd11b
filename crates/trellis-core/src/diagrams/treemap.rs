use indexmap::IndexMap;
use serde::Serialize;
use winnow::combinator::{alt, cut_err, not, opt, preceded};
use winnow::prelude::*;
use winnow::stream::Location;

use crate::canon::{apply_accessibility, rebuild_hierarchy};
use crate::config::Config;
use crate::cst::{Document, Record};
use crate::error::{CanonResult, GrammarError, Result};
use crate::grammar::{self, accessibility, header, span_from, title};
use crate::lex::{
    Input, PResult, decimal, eol, hspace0, hspace1, identifier, keyword, punct, quoted, spanned,
    symbol, text_to_eol,
};
use crate::model::{Accessibility, Model};

pub const NOTATION: &str = "treemap";
pub const HEADERS: &[&str] = &["treemap-beta", "treemap"];
const STATEMENTS: &[&str] = &["quoted item", "classDef", "title", "accTitle", "accDescr"];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreemapModel {
    pub title: Option<String>,
    /// Arena in document order.
    pub nodes: Vec<TreemapNode>,
    pub class_defs: IndexMap<String, Vec<String>>,
    pub acc: Accessibility,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreemapNode {
    pub name: String,
    /// Leaf value as written, or the sum of the descendants' values for sections.
    pub value: f64,
    pub is_leaf: bool,
    pub level: usize,
    pub parent: Option<usize>,
    pub class_name: Option<String>,
}

impl TreemapModel {
    pub fn node(&self, name: &str) -> Option<&TreemapNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn roots(&self) -> impl Iterator<Item = &TreemapNode> + '_ {
        self.nodes.iter().filter(|n| n.parent.is_none())
    }

    pub fn children(&self, index: usize) -> impl Iterator<Item = &TreemapNode> + '_ {
        self.nodes
            .iter()
            .filter(move |n| n.parent == Some(index))
    }

    pub fn total(&self) -> f64 {
        self.roots().map(|n| n.value).sum()
    }
}

impl Model for TreemapModel {
    fn entity_ids(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.name.as_str()).collect()
    }

    fn relation_endpoints(&self) -> Vec<(&str, &str)> {
        self.nodes
            .iter()
            .filter_map(|n| {
                let parent = self.nodes.get(n.parent?)?;
                Some((parent.name.as_str(), n.name.as_str()))
            })
            .collect()
    }

    fn group_refs(&self) -> Vec<(&str, &str)> {
        self.nodes
            .iter()
            .filter_map(|n| Some((n.name.as_str(), n.class_name.as_deref()?)))
            .collect()
    }

    fn group_ids(&self) -> Vec<&str> {
        self.class_defs.keys().map(String::as_str).collect()
    }
}

pub fn parse(text: &str, config: &Config) -> Result<TreemapModel> {
    let doc = parse_document(text)?;
    super::canonicalized(NOTATION, transform(&doc, config))
}

pub fn parse_document(text: &str) -> std::result::Result<Document<'_>, GrammarError> {
    grammar::parse_indented_document(NOTATION, text, header(HEADERS), line, STATEMENTS)
}

fn line<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let indent = spanned(hspace0).parse_next(input)?;
    let record = alt((accessibility, title, class_def, item)).parse_next(input)?;
    Ok(record.with("indent", indent))
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

/// `"Section"` or `"Leaf": value`, either optionally followed by `:::class`.
fn item<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let name = spanned(quoted).parse_next(input)?;
    hspace0.parse_next(input)?;
    let value = opt(preceded(
        (not(symbol(":::")), punct(':'), hspace0),
        cut_err(spanned(decimal.take())),
    ))
    .parse_next(input)?;
    hspace0.parse_next(input)?;
    let class = opt(preceded(symbol(":::"), cut_err(spanned(identifier)))).parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("item", span_from(input, start))
        .with("name", name)
        .with_opt("value", value)
        .with_opt("class", class))
}

fn split_styles(raw: &str) -> Vec<String> {
    raw.trim_end_matches(';')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn transform(doc: &Document<'_>, _config: &Config) -> CanonResult<TreemapModel> {
    let mut model = TreemapModel::default();
    let mut indents = Vec::new();

    for stmt in doc.statements() {
        if apply_accessibility(&mut model.acc, stmt) {
            continue;
        }
        match stmt.kind {
            "title" => model.title = stmt.non_empty_text("text").map(str::to_string),
            "classDef" => {
                let name = stmt.require_text("name")?.to_string();
                let styles = split_styles(stmt.text("styles").unwrap_or_default());
                model.class_defs.insert(name, styles);
            }
            "item" => {
                let value = match stmt.text("value") {
                    Some(raw) => {
                        let value: f64 = raw
                            .parse()
                            .map_err(|_| doc.invalid(stmt, format!("invalid value `{raw}`")))?;
                        if value < 0.0 {
                            return Err(doc.invalid(
                                stmt,
                                format!("treemap value must not be negative, got {raw}"),
                            ));
                        }
                        Some(value)
                    }
                    None => None,
                };
                indents.push(stmt.text("indent").map_or(0, |s| s.chars().count()));
                model.nodes.push(TreemapNode {
                    name: stmt.require_text("name")?.to_string(),
                    value: value.unwrap_or(0.0),
                    is_leaf: value.is_some(),
                    level: 0,
                    parent: None,
                    class_name: stmt.text("class").map(str::to_string),
                });
            }
            _ => {}
        }
    }

    for (node, place) in model.nodes.iter_mut().zip(rebuild_hierarchy(&indents)) {
        node.level = place.depth;
        node.parent = place.parent;
    }

    // Parents always precede their children, so a reverse sweep sums bottom-up.
    for idx in (0..model.nodes.len()).rev() {
        let (value, parent) = (model.nodes[idx].value, model.nodes[idx].parent);
        if let Some(parent) = parent {
            if !model.nodes[parent].is_leaf {
                model.nodes[parent].value += value;
            }
        }
    }

    tracing::debug!(nodes = model.nodes.len(), "treemap canonicalized");
    Ok(model)
}

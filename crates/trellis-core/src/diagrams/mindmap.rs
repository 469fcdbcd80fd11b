use serde::Serialize;
use winnow::combinator::{alt, cut_err, opt, preceded};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::stream::Location;

use crate::canon::{apply_accessibility, rebuild_hierarchy};
use crate::config::Config;
use crate::cst::{Document, Record, Token};
use crate::error::{CanonResult, GrammarError, Result};
use crate::grammar::{self, accessibility, header, span_from};
use crate::lex::{
    Input, PResult, eol, hspace0, label_until, label_until_any, punct, spanned, symbol,
    text_to_eol,
};
use crate::model::{Accessibility, Model};

pub const NOTATION: &str = "mindmap";
pub const HEADERS: &[&str] = &["mindmap"];
const STATEMENTS: &[&str] = &["node", "`::icon(`", "`:::`", "accTitle", "accDescr"];

/// Opening and closing delimiters, longest opener first.
const SHAPES: &[(&str, &str, MindmapShape)] = &[
    ("((", "))", MindmapShape::Circle),
    ("))", "((", MindmapShape::Bang),
    ("{{", "}}", MindmapShape::Hexagon),
    ("(-", "-)", MindmapShape::Cloud),
    ("[", "]", MindmapShape::Rect),
    (")", "(", MindmapShape::Cloud),
    ("(", ")", MindmapShape::RoundedRect),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MindmapShape {
    #[default]
    Default,
    RoundedRect,
    Rect,
    Circle,
    Cloud,
    Bang,
    Hexagon,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MindmapModel {
    /// Arena in document order; the root is always at index 0.
    pub nodes: Vec<MindmapNode>,
    pub acc: Accessibility,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MindmapNode {
    pub id: String,
    pub label: String,
    pub shape: MindmapShape,
    /// Depth below the root, which is 0.
    pub level: usize,
    pub parent: Option<usize>,
    /// Index of the root child this node descends from.
    pub section: Option<usize>,
    pub icon: Option<String>,
    pub classes: Vec<String>,
}

impl MindmapModel {
    pub fn root(&self) -> Option<&MindmapNode> {
        self.nodes.first()
    }

    pub fn node(&self, id: &str) -> Option<&MindmapNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn children(&self, index: usize) -> impl Iterator<Item = &MindmapNode> + '_ {
        self.nodes
            .iter()
            .filter(move |n| n.parent == Some(index))
    }

    pub fn parent_of(&self, node: &MindmapNode) -> Option<&MindmapNode> {
        node.parent.and_then(|idx| self.nodes.get(idx))
    }
}

impl Model for MindmapModel {
    fn entity_ids(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    fn relation_endpoints(&self) -> Vec<(&str, &str)> {
        self.nodes
            .iter()
            .filter_map(|n| {
                let parent = self.nodes.get(n.parent?)?;
                Some((parent.id.as_str(), n.id.as_str()))
            })
            .collect()
    }
}

pub fn parse(text: &str, config: &Config) -> Result<MindmapModel> {
    let doc = parse_document(text)?;
    super::canonicalized(NOTATION, transform(&doc, config))
}

pub fn parse_document(text: &str) -> std::result::Result<Document<'_>, GrammarError> {
    grammar::parse_indented_document(NOTATION, text, header(HEADERS), line, STATEMENTS)
}

/// One line with its raw indentation captured as `indent`.
fn line<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let indent = spanned(hspace0).parse_next(input)?;
    let record = alt((accessibility, icon, classes, node)).parse_next(input)?;
    Ok(record.with("indent", indent))
}

/// `::icon(name)`
fn icon<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    symbol("::icon(").parse_next(input)?;
    let name = cut_err(spanned(label_until(")").map(str::trim))).parse_next(input)?;
    cut_err(punct(')')).parse_next(input)?;
    eol.parse_next(input)?;
    Ok(Record::new("icon", span_from(input, start)).with("name", name))
}

/// `:::class another`
fn classes<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    symbol(":::").parse_next(input)?;
    let names = spanned(text_to_eol).parse_next(input)?;
    eol.parse_next(input)?;
    Ok(Record::new("classes", span_from(input, start)).with("names", names))
}

/// `id`, `text`, or `[id]` followed by a delimited label.
fn node<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let id = opt(spanned(
        label_until_any(&["(", ")", "[", "{{", "%%"])
            .map(str::trim_end)
            .verify(|s: &str| !s.is_empty()),
    ))
    .parse_next(input)?;
    let shape = opt(shaped_label).parse_next(input)?;
    if id.is_none() && shape.is_none() {
        return Err(ErrMode::Backtrack(ContextError::new()));
    }
    cut_err(eol).parse_next(input)?;
    let (opener, label) = match shape {
        Some((opener, label)) => (Some(opener), Some(label)),
        None => (None, None),
    };
    Ok(Record::new("node", span_from(input, start))
        .with_opt("id", id)
        .with_opt("opener", opener)
        .with_opt("label", label))
}

fn shaped_label<'a>(input: &mut Input<'a>) -> PResult<(Token<'a>, Token<'a>)> {
    for (open, close, _) in SHAPES {
        let start = input.current_token_start();
        if opt(symbol(*open)).parse_next(input)?.is_none() {
            continue;
        }
        let opener = Token::new(*open, span_from(input, start));
        let label = spanned(label_until(*close)).parse_next(input)?;
        cut_err(preceded(hspace0, symbol(*close))).parse_next(input)?;
        return Ok((opener, label));
    }
    Err(ErrMode::Backtrack(ContextError::new()))
}

fn shape_for(opener: &str) -> MindmapShape {
    SHAPES
        .iter()
        .find(|(open, _, _)| *open == opener)
        .map_or(MindmapShape::Default, |(_, _, shape)| *shape)
}

fn unquote(raw: &str) -> &str {
    let raw = raw.trim();
    raw.strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .unwrap_or(raw)
}

fn indent_width(stmt: &Record<'_>) -> usize {
    stmt.text("indent").map_or(0, |s| s.chars().count())
}

pub fn transform(doc: &Document<'_>, _config: &Config) -> CanonResult<MindmapModel> {
    let mut model = MindmapModel::default();
    let mut node_records: Vec<&Record<'_>> = Vec::new();

    for stmt in doc.statements() {
        if apply_accessibility(&mut model.acc, stmt) {
            continue;
        }
        match stmt.kind {
            "node" => {
                let label = stmt.text("label").map(unquote);
                let id = stmt
                    .text("id")
                    .map(str::trim)
                    .or(label)
                    .unwrap_or_default();
                model.nodes.push(MindmapNode {
                    id: id.to_string(),
                    label: label.unwrap_or(id).to_string(),
                    shape: stmt.text("opener").map_or(MindmapShape::Default, shape_for),
                    level: 0,
                    parent: None,
                    section: None,
                    icon: None,
                    classes: Vec::new(),
                });
                node_records.push(stmt);
            }
            "icon" => {
                let last = model.nodes.last_mut().ok_or_else(|| {
                    doc.invalid(stmt, "icon decoration before any mindmap node")
                })?;
                last.icon = stmt.non_empty_text("name").map(str::to_string);
            }
            "classes" => {
                let last = model.nodes.last_mut().ok_or_else(|| {
                    doc.invalid(stmt, "class decoration before any mindmap node")
                })?;
                last.classes.extend(
                    stmt.text("names")
                        .unwrap_or_default()
                        .split_whitespace()
                        .map(str::to_string),
                );
            }
            _ => {}
        }
    }

    let indents: Vec<usize> = node_records.iter().map(|r| indent_width(r)).collect();
    let hierarchy = rebuild_hierarchy(&indents);
    for (idx, place) in hierarchy.iter().enumerate() {
        if idx > 0 && place.parent.is_none() {
            return Err(doc.invalid(
                node_records[idx],
                format!(
                    "mindmap can only have one root, `{}` has no parent",
                    model.nodes[idx].id
                ),
            ));
        }
        let section = match place.parent {
            None => None,
            Some(0) => Some(model.children(0).count()),
            Some(parent) => model.nodes[parent].section,
        };
        let node = &mut model.nodes[idx];
        node.level = place.depth;
        node.parent = place.parent;
        node.section = section;
    }

    tracing::debug!(nodes = model.nodes.len(), "mindmap canonicalized");
    Ok(model)
}

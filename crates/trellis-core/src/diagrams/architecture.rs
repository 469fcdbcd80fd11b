//! Architecture diagrams: services, junctions and nested groups joined by port-to-port edges.

use rustc_hash::FxHashMap;
use serde::Serialize;
use winnow::combinator::{alt, cut_err, delimited, opt, preceded, terminated};
use winnow::prelude::*;
use winnow::stream::Location;
use winnow::token::one_of;

use super::flowchart::grammar::vertex_id;
use crate::canon::apply_accessibility;
use crate::config::Config;
use crate::cst::{Document, Record, Token};
use crate::error::{CanonResult, GrammarError, Result};
use crate::grammar::{self, accessibility, header, span_from, title};
use crate::lex::{
    Input, PResult, eol, expected, hspace0, hspace1, keyword, label_until, punct, quoted, spanned,
    symbol,
};
use crate::model::{Accessibility, Model};

pub const NOTATION: &str = "architecture";
pub const HEADERS: &[&str] = &["architecture-beta", "architecture"];
const STATEMENTS: &[&str] = &["group", "service", "junction", "edge", "title", "accTitle", "accDescr"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Port {
    #[serde(rename = "L")]
    Left,
    #[serde(rename = "R")]
    Right,
    #[serde(rename = "T")]
    Top,
    #[serde(rename = "B")]
    Bottom,
}

impl Port {
    fn from_letter(letter: &str) -> Option<Self> {
        Some(match letter {
            "L" => Self::Left,
            "R" => Self::Right,
            "T" => Self::Top,
            "B" => Self::Bottom,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Service,
    Junction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchitectureModel {
    pub title: Option<String>,
    pub groups: Vec<ArchitectureGroup>,
    pub nodes: Vec<ArchitectureNode>,
    pub edges: Vec<ArchitectureEdge>,
    pub acc: Accessibility,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchitectureGroup {
    pub id: String,
    pub icon: Option<String>,
    pub title: Option<String>,
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchitectureNode {
    pub id: String,
    pub kind: NodeKind,
    pub icon: Option<String>,
    pub icon_text: Option<String>,
    pub title: Option<String>,
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchitectureEdge {
    pub from: String,
    pub from_port: Port,
    /// Arrowhead pointing into `from`.
    pub from_arrow: bool,
    /// The edge leaves the group around `from` rather than the node itself.
    pub from_group: bool,
    pub to: String,
    pub to_port: Port,
    pub to_arrow: bool,
    pub to_group: bool,
    pub title: Option<String>,
}

impl ArchitectureModel {
    pub fn group(&self, id: &str) -> Option<&ArchitectureGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn node(&self, id: &str) -> Option<&ArchitectureNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn services(&self) -> impl Iterator<Item = &ArchitectureNode> {
        self.nodes.iter().filter(|n| n.kind == NodeKind::Service)
    }

    pub fn junctions(&self) -> impl Iterator<Item = &ArchitectureNode> {
        self.nodes.iter().filter(|n| n.kind == NodeKind::Junction)
    }

    fn parent_of(&self, id: &str) -> Option<&str> {
        self.node(id)
            .and_then(|n| n.parent.as_deref())
            .or_else(|| self.group(id).and_then(|g| g.parent.as_deref()))
    }
}

impl Model for ArchitectureModel {
    fn entity_ids(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .map(|n| n.id.as_str())
            .chain(self.groups.iter().map(|g| g.id.as_str()))
            .collect()
    }

    fn relation_endpoints(&self) -> Vec<(&str, &str)> {
        self.edges
            .iter()
            .map(|e| (e.from.as_str(), e.to.as_str()))
            .collect()
    }

    fn group_refs(&self) -> Vec<(&str, &str)> {
        let nodes = self
            .nodes
            .iter()
            .filter_map(|n| n.parent.as_deref().map(|p| (n.id.as_str(), p)));
        let groups = self
            .groups
            .iter()
            .filter_map(|g| g.parent.as_deref().map(|p| (g.id.as_str(), p)));
        nodes.chain(groups).collect()
    }

    fn group_ids(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.id.as_str()).collect()
    }
}

pub fn parse(text: &str, config: &Config) -> Result<ArchitectureModel> {
    let doc = parse_document(text)?;
    super::canonicalized(NOTATION, transform(&doc, config))
}

pub fn parse_document(text: &str) -> std::result::Result<Document<'_>, GrammarError> {
    grammar::parse_document(NOTATION, text, header(HEADERS), statement, STATEMENTS)
}

fn statement<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    alt((accessibility, title, declaration, edge)).parse_next(input)
}

/// `group id(icon)[title] in parent`, `service id(icon)[title]`, `service id "text"[title]`,
/// `junction id in parent`
fn declaration<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let kind = spanned(alt((keyword("group"), keyword("service"), keyword("junction"))))
        .parse_next(input)?;
    hspace1.parse_next(input)?;
    let id = cut_err(vertex_id).parse_next(input)?;
    let (mut icon, mut icon_text, mut label) = (None, None, None);
    if kind.text != "junction" {
        icon = opt(delimited(
            punct('('),
            spanned(label_until(")")),
            cut_err(punct(')')),
        ))
        .parse_next(input)?;
        if kind.text == "service" && icon.is_none() {
            icon_text = opt(preceded(hspace0, spanned(quoted))).parse_next(input)?;
        }
        label = opt(delimited(
            punct('['),
            spanned(label_until("]")),
            cut_err(punct(']')),
        ))
        .parse_next(input)?;
    }
    let parent = opt(preceded(
        (hspace1, keyword("in"), hspace1),
        cut_err(vertex_id),
    ))
    .parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("declaration", span_from(input, start))
        .with("kind", kind)
        .with("id", id)
        .with_opt("icon", icon)
        .with_opt("iconText", icon_text)
        .with_opt("title", label)
        .with_opt("parent", parent))
}

/// `id` or `id{group}`
fn endpoint<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let id = vertex_id.parse_next(input)?;
    let group = opt(symbol("{group}")).parse_next(input)?;
    Ok(Record::new("endpoint", span_from(input, start))
        .with("id", id)
        .with_flag("group", group.is_some()))
}

fn port<'a>(input: &mut Input<'a>) -> PResult<Token<'a>> {
    spanned(one_of(['L', 'R', 'T', 'B']).take())
        .context(expected("port `L`, `R`, `T` or `B`"))
        .parse_next(input)
}

/// `R --> L`, `B <-- T`, `L -[title]- R`
fn connector<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let from_port = port.parse_next(input)?;
    hspace0.parse_next(input)?;
    let from_arrow = opt(alt((punct('<'), punct('>')))).parse_next(input)?;
    hspace0.parse_next(input)?;
    let label = alt((
        symbol("--").map(|_| None),
        preceded(
            (punct('-'), hspace0, punct('[')),
            cut_err(terminated(
                spanned(label_until("]")),
                (punct(']'), hspace0, punct('-')),
            )),
        )
        .map(Some),
    ))
    .parse_next(input)?;
    hspace0.parse_next(input)?;
    let to_arrow = opt(alt((punct('<'), punct('>')))).parse_next(input)?;
    hspace0.parse_next(input)?;
    let to_port = cut_err(port).parse_next(input)?;
    Ok(Record::new("connector", span_from(input, start))
        .with("fromPort", from_port)
        .with_flag("fromArrow", from_arrow.is_some())
        .with_opt("title", label)
        .with_flag("toArrow", to_arrow.is_some())
        .with("toPort", to_port))
}

/// `a:R -- L:b`, plus the `a L--R b` and `a (L--R) b` shorthands.
fn edge<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let from = endpoint.parse_next(input)?;
    let connector = alt((
        delimited(
            (hspace0, punct(':'), hspace0),
            connector,
            (hspace0, cut_err(punct(':')), hspace0),
        ),
        delimited(
            (hspace1, punct('('), hspace0),
            connector,
            (hspace0, cut_err(punct(')')), hspace1),
        ),
        delimited(hspace1, connector, hspace1),
    ))
    .parse_next(input)?;
    let to = cut_err(endpoint).parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("edge", span_from(input, start))
        .with("from", from)
        .with("connector", connector)
        .with("to", to))
}

fn port_of(doc: &Document<'_>, connector: &Record<'_>, field: &'static str) -> CanonResult<Port> {
    let letter = connector.require_text(field)?;
    Port::from_letter(letter)
        .ok_or_else(|| doc.invalid(connector, format!("invalid port `{letter}`")))
}

pub fn transform(doc: &Document<'_>, _config: &Config) -> CanonResult<ArchitectureModel> {
    let mut model = ArchitectureModel::default();
    // id -> declaring keyword
    let mut declared: FxHashMap<String, &'static str> = FxHashMap::default();

    for stmt in doc.statements() {
        if apply_accessibility(&mut model.acc, stmt) {
            continue;
        }
        match stmt.kind {
            "title" => model.title = stmt.non_empty_text("text").map(str::to_string),
            "declaration" => {
                let kind = match stmt.require_text("kind")? {
                    "group" => "group",
                    "service" => "service",
                    _ => "junction",
                };
                let id = stmt.require_text("id")?;
                if let Some(existing) = declared.get(id) {
                    return Err(doc.invalid(
                        stmt,
                        format!("`{id}` is already declared as a {existing}"),
                    ));
                }
                let parent = stmt.text("parent").map(str::to_string);
                if let Some(parent) = parent.as_deref() {
                    if parent == id {
                        return Err(doc.invalid(stmt, format!("{kind} `{id}` cannot contain itself")));
                    }
                    if let Some(other) = declared.get(parent).filter(|&&k| k != "group") {
                        return Err(doc.invalid(
                            stmt,
                            format!("parent `{parent}` of `{id}` is a {other}, not a group"),
                        ));
                    }
                }
                declared.insert(id.to_string(), kind);

                let icon = stmt.non_empty_text("icon").map(|s| s.trim().to_string());
                let label = stmt.non_empty_text("title").map(|s| s.trim().to_string());
                if kind == "group" {
                    model.groups.push(ArchitectureGroup {
                        id: id.to_string(),
                        icon,
                        title: label,
                        parent,
                    });
                } else {
                    model.nodes.push(ArchitectureNode {
                        id: id.to_string(),
                        kind: if kind == "service" {
                            NodeKind::Service
                        } else {
                            NodeKind::Junction
                        },
                        icon,
                        icon_text: stmt.text("iconText").map(str::to_string),
                        title: label,
                        parent,
                    });
                }
            }
            "edge" => {
                let from = stmt.require_record("from")?;
                let to = stmt.require_record("to")?;
                let connector = stmt.require_record("connector")?;
                let edge = ArchitectureEdge {
                    from: from.require_text("id")?.to_string(),
                    from_port: port_of(doc, connector, "fromPort")?,
                    from_arrow: connector.has("fromArrow"),
                    from_group: from.has("group"),
                    to: to.require_text("id")?.to_string(),
                    to_port: port_of(doc, connector, "toPort")?,
                    to_arrow: connector.has("toArrow"),
                    to_group: to.has("group"),
                    title: connector
                        .non_empty_text("title")
                        .map(|s| s.trim().to_string()),
                };
                if edge.from_group || edge.to_group {
                    let shared = model
                        .parent_of(&edge.from)
                        .zip(model.parent_of(&edge.to))
                        .filter(|(a, b)| a == b);
                    if let Some((group, _)) = shared {
                        return Err(doc.invalid(
                            stmt,
                            format!(
                                "edge {} -- {} crosses a group boundary but both ends sit in `{group}`",
                                edge.from, edge.to
                            ),
                        ));
                    }
                }
                model.edges.push(edge);
            }
            _ => {}
        }
    }

    tracing::debug!(
        groups = model.groups.len(),
        nodes = model.nodes.len(),
        edges = model.edges.len(),
        "architecture canonicalized"
    );
    Ok(model)
}

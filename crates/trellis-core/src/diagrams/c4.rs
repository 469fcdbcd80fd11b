use indexmap::IndexMap;
use serde::Serialize;
use winnow::combinator::{alt, cut_err, opt, separated};
use winnow::prelude::*;
use winnow::stream::Location;
use winnow::token::take_while;

use crate::canon::{ContextStack, apply_accessibility};
use crate::config::Config;
use crate::cst::{Cst, Document, Record};
use crate::error::{CanonResult, GrammarError, Result};
use crate::grammar::{
    self, accessibility, close_block, direction_statement, header, span_from, statements, title,
};
use crate::lex::{
    Input, PResult, blank_lines, eol, hspace0, identifier, punct, quoted, spanned,
};
use crate::model::{Accessibility, Model};

pub const NOTATION: &str = "c4";
pub const HEADERS: &[&str] = &[
    "C4Context",
    "C4Container",
    "C4Component",
    "C4Dynamic",
    "C4Deployment",
];
const STATEMENTS: &[&str] = &["element macro", "boundary", "Rel", "title", "accTitle", "accDescr"];
const BOUNDARY_MACROS: &[&str] = &[
    "Boundary",
    "Enterprise_Boundary",
    "System_Boundary",
    "Container_Boundary",
    "Deployment_Node",
    "Node",
    "Node_L",
    "Node_R",
];
/// Alias of the implicit outermost boundary.
pub const GLOBAL_BOUNDARY: &str = "global";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct C4Model {
    /// Header keyword, e.g. `C4Context`.
    pub c4_type: String,
    pub title: Option<String>,
    pub direction: Option<String>,
    pub elements: Vec<C4Element>,
    pub boundaries: Vec<C4Boundary>,
    pub relations: Vec<C4Relation>,
    pub layout: C4Layout,
    pub wrap: bool,
    pub acc: Accessibility,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct C4Layout {
    pub shape_in_row: i64,
    pub boundary_in_row: i64,
}

impl Default for C4Layout {
    fn default() -> Self {
        Self {
            shape_in_row: 4,
            boundary_in_row: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct C4Element {
    pub alias: String,
    pub label: String,
    /// Shape tag such as `person`, `external_system_db` or `component_queue`.
    pub shape: String,
    pub technology: Option<String>,
    pub description: Option<String>,
    pub sprite: Option<String>,
    pub tags: Option<String>,
    pub link: Option<String>,
    pub parent_boundary: String,
    pub styles: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct C4Boundary {
    pub alias: String,
    pub label: String,
    pub boundary_type: String,
    /// `node`, `nodeL` or `nodeR` for deployment nodes.
    pub node_type: Option<String>,
    pub description: Option<String>,
    pub tags: Option<String>,
    pub link: Option<String>,
    pub parent_boundary: String,
    pub styles: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct C4Relation {
    /// `rel`, `birel`, `rel_u`, `rel_d`, `rel_l`, `rel_r` or `rel_b`.
    pub kind: String,
    pub from: String,
    pub to: String,
    pub label: String,
    pub technology: Option<String>,
    pub description: Option<String>,
    pub sprite: Option<String>,
    pub tags: Option<String>,
    pub link: Option<String>,
    pub styles: IndexMap<String, String>,
}

impl C4Model {
    pub fn element(&self, alias: &str) -> Option<&C4Element> {
        self.elements.iter().find(|e| e.alias == alias)
    }

    pub fn boundary(&self, alias: &str) -> Option<&C4Boundary> {
        self.boundaries.iter().find(|b| b.alias == alias)
    }

    pub fn elements_in<'a>(&'a self, boundary: &'a str) -> impl Iterator<Item = &'a C4Element> + 'a {
        self.elements
            .iter()
            .filter(move |e| e.parent_boundary == boundary)
    }

    pub fn relations_from<'a>(&'a self, alias: &'a str) -> impl Iterator<Item = &'a C4Relation> + 'a {
        self.relations.iter().filter(move |r| r.from == alias)
    }

    pub fn relations_to<'a>(&'a self, alias: &'a str) -> impl Iterator<Item = &'a C4Relation> + 'a {
        self.relations.iter().filter(move |r| r.to == alias)
    }
}

impl Model for C4Model {
    fn entity_ids(&self) -> Vec<&str> {
        self.elements
            .iter()
            .map(|e| e.alias.as_str())
            .chain(self.boundaries.iter().map(|b| b.alias.as_str()))
            .collect()
    }

    fn relation_endpoints(&self) -> Vec<(&str, &str)> {
        self.relations
            .iter()
            .map(|r| (r.from.as_str(), r.to.as_str()))
            .collect()
    }

    fn group_refs(&self) -> Vec<(&str, &str)> {
        self.elements
            .iter()
            .map(|e| (e.alias.as_str(), e.parent_boundary.as_str()))
            .chain(
                self.boundaries
                    .iter()
                    .map(|b| (b.alias.as_str(), b.parent_boundary.as_str())),
            )
            .collect()
    }

    fn group_ids(&self) -> Vec<&str> {
        std::iter::once(GLOBAL_BOUNDARY)
            .chain(self.boundaries.iter().map(|b| b.alias.as_str()))
            .collect()
    }
}

pub fn parse(text: &str, config: &Config) -> Result<C4Model> {
    let doc = parse_document(text)?;
    super::canonicalized(NOTATION, transform(&doc, config))
}

pub fn parse_document(text: &str) -> std::result::Result<Document<'_>, GrammarError> {
    grammar::parse_document(NOTATION, text, header(HEADERS), statement, STATEMENTS)
}

fn statement<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    alt((accessibility, title, direction_statement, macro_call)).parse_next(input)
}

/// `Name(arg, …)`, followed by a `{ … }` body for boundary macros.
fn macro_call<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let name = spanned(identifier).parse_next(input)?;
    hspace0.parse_next(input)?;
    punct('(').parse_next(input)?;
    hspace0.parse_next(input)?;
    let args: Vec<Cst<'a>> =
        cut_err(separated(0.., argument, (hspace0, punct(','), hspace0))).parse_next(input)?;
    hspace0.parse_next(input)?;
    cut_err(punct(')')).parse_next(input)?;
    hspace0.parse_next(input)?;

    if !BOUNDARY_MACROS.iter().any(|m| *m == name.text) {
        cut_err(eol).parse_next(input)?;
        return Ok(Record::new("macro", span_from(input, start))
            .with("name", name)
            .with("args", args));
    }

    // The opening brace may sit on the following line.
    if opt(punct('{')).parse_next(input)?.is_none() {
        cut_err((eol, blank_lines, hspace0, punct('{'))).parse_next(input)?;
    }
    cut_err(eol).parse_next(input)?;
    let body = statements(statement, &["}"], STATEMENTS).parse_next(input)?;
    close_block("}").parse_next(input)?;
    Ok(Record::new("boundary", span_from(input, start))
        .with("name", name)
        .with("args", args)
        .with("body", body))
}

/// `"text"`, `$key="value"` or a bare value.
fn argument<'a>(input: &mut Input<'a>) -> PResult<Cst<'a>> {
    alt((
        keyed_argument.map(Cst::Record),
        spanned(quoted).map(Cst::Token),
        spanned(take_while(0.., |c: char| !matches!(c, ',' | ')' | '\n' | '\r')).map(str::trim))
            .map(Cst::Token),
    ))
    .parse_next(input)
}

fn keyed_argument<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    punct('$').parse_next(input)?;
    let key = spanned(identifier).parse_next(input)?;
    hspace0.parse_next(input)?;
    punct('=').parse_next(input)?;
    hspace0.parse_next(input)?;
    let value = cut_err(spanned(quoted)).parse_next(input)?;
    Ok(Record::new("kv", span_from(input, start))
        .with("key", key)
        .with("value", value))
}

/// Macro arguments split into positional slots and `$key=` overrides.
struct Args<'r> {
    positional: Vec<Option<&'r str>>,
    named: IndexMap<&'r str, &'r str>,
}

impl<'r> Args<'r> {
    fn of(stmt: &'r Record<'_>, skip: usize) -> Self {
        let mut args = Args {
            positional: Vec::new(),
            named: IndexMap::new(),
        };
        for arg in stmt.list("args").iter().skip(skip) {
            match arg {
                Cst::Record(kv) => {
                    if let (Some(key), Some(value)) = (kv.text("key"), kv.text("value")) {
                        args.named.insert(key, value);
                    }
                    args.positional.push(None);
                }
                other => args.positional.push(other.as_text()),
            }
        }
        args
    }

    /// Positional slot `idx`, overridden by `$key=` when present.
    fn get(&self, idx: usize, key: &str) -> Option<String> {
        self.named
            .get(key)
            .copied()
            .or_else(|| self.positional.get(idx).copied().flatten())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn require(
        &self,
        doc: &Document<'_>,
        stmt: &Record<'_>,
        idx: usize,
        key: &str,
    ) -> CanonResult<String> {
        self.get(idx, key)
            .ok_or_else(|| doc.invalid(stmt, format!("missing `{key}` argument")))
    }
}

fn element_shape(name: &str) -> Option<(&'static str, bool)> {
    // (shape, has technology slot)
    Some(match name {
        "Person" => ("person", false),
        "Person_Ext" => ("external_person", false),
        "System" => ("system", false),
        "SystemDb" => ("system_db", false),
        "SystemQueue" => ("system_queue", false),
        "System_Ext" => ("external_system", false),
        "SystemDb_Ext" => ("external_system_db", false),
        "SystemQueue_Ext" => ("external_system_queue", false),
        "Container" => ("container", true),
        "ContainerDb" => ("container_db", true),
        "ContainerQueue" => ("container_queue", true),
        "Container_Ext" => ("external_container", true),
        "ContainerDb_Ext" => ("external_container_db", true),
        "ContainerQueue_Ext" => ("external_container_queue", true),
        "Component" => ("component", true),
        "ComponentDb" => ("component_db", true),
        "ComponentQueue" => ("component_queue", true),
        "Component_Ext" => ("external_component", true),
        "ComponentDb_Ext" => ("external_component_db", true),
        "ComponentQueue_Ext" => ("external_component_queue", true),
        _ => return None,
    })
}

fn relation_kind(name: &str) -> Option<&'static str> {
    Some(match name {
        "Rel" | "RelIndex" => "rel",
        "BiRel" => "birel",
        "Rel_U" | "Rel_Up" => "rel_u",
        "Rel_D" | "Rel_Down" => "rel_d",
        "Rel_L" | "Rel_Left" => "rel_l",
        "Rel_R" | "Rel_Right" => "rel_r",
        "Rel_Back" => "rel_b",
        _ => return None,
    })
}

struct C4Builder {
    model: C4Model,
    boundaries: ContextStack<String>,
}

impl C4Builder {
    fn parent(&self) -> String {
        self.boundaries
            .current()
            .cloned()
            .unwrap_or_else(|| GLOBAL_BOUNDARY.to_string())
    }

    fn walk<'r, 'a: 'r>(
        &mut self,
        doc: &Document<'_>,
        stmts: impl Iterator<Item = &'r Record<'a>>,
    ) -> CanonResult<()> {
        for stmt in stmts {
            if apply_accessibility(&mut self.model.acc, stmt) {
                continue;
            }
            match stmt.kind {
                "title" => self.model.title = stmt.non_empty_text("text").map(str::to_string),
                "direction" => self.model.direction = stmt.text("value").map(str::to_string),
                "boundary" => {
                    let alias = self.add_boundary(doc, stmt)?;
                    self.boundaries.push(alias);
                    self.walk(doc, stmt.records("body"))?;
                    self.boundaries.pop();
                }
                "macro" => self.apply_macro(doc, stmt)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn add_boundary(&mut self, doc: &Document<'_>, stmt: &Record<'_>) -> CanonResult<String> {
        let name = stmt.require_text("name")?;
        let args = Args::of(stmt, 0);
        let alias = args.require(doc, stmt, 0, "alias")?;
        let (default_type, node_type) = match name {
            "Enterprise_Boundary" => ("ENTERPRISE", None),
            "System_Boundary" => ("SYSTEM", None),
            "Container_Boundary" => ("CONTAINER", None),
            "Deployment_Node" | "Node" => ("node", Some("node")),
            "Node_L" => ("node", Some("nodeL")),
            "Node_R" => ("node", Some("nodeR")),
            _ => ("system", None),
        };
        // Typed boundary macros have no type slot, so tags and link shift left.
        let typed = matches!(name, "Boundary") || node_type.is_some();
        let boundary_type = if typed {
            args.get(2, "type").unwrap_or_else(|| default_type.to_string())
        } else {
            default_type.to_string()
        };
        let (description, tags, link) = match (node_type.is_some(), typed) {
            (true, _) => (args.get(3, "descr"), args.get(5, "tags"), args.get(6, "link")),
            (false, true) => (None, args.get(3, "tags"), args.get(4, "link")),
            (false, false) => (None, args.get(2, "tags"), args.get(3, "link")),
        };

        let boundary = C4Boundary {
            label: args.get(1, "label").unwrap_or_default(),
            boundary_type,
            node_type: node_type.map(str::to_string),
            description,
            tags,
            link,
            parent_boundary: self.parent(),
            styles: IndexMap::new(),
            alias: alias.clone(),
        };
        match self.model.boundaries.iter_mut().find(|b| b.alias == alias) {
            Some(existing) => *existing = boundary,
            None => self.model.boundaries.push(boundary),
        }
        tracing::trace!(alias = %alias, "c4 boundary");
        Ok(alias)
    }

    fn apply_macro(&mut self, doc: &Document<'_>, stmt: &Record<'_>) -> CanonResult<()> {
        let name = stmt.require_text("name")?;
        if let Some((shape, technical)) = element_shape(name) {
            let args = Args::of(stmt, 0);
            let alias = args.require(doc, stmt, 0, "alias")?;
            let (technology, description, rest) = if technical {
                (args.get(2, "techn"), args.get(3, "descr"), 4)
            } else {
                (None, args.get(2, "descr"), 3)
            };
            let element = C4Element {
                alias: alias.clone(),
                label: args.get(1, "label").unwrap_or_default(),
                shape: shape.to_string(),
                technology,
                description,
                sprite: args.get(rest, "sprite"),
                tags: args.get(rest + 1, "tags"),
                link: args.get(rest + 2, "link"),
                parent_boundary: self.parent(),
                styles: IndexMap::new(),
            };
            match self.model.elements.iter_mut().find(|e| e.alias == alias) {
                Some(existing) => *existing = element,
                None => self.model.elements.push(element),
            }
            return Ok(());
        }

        if let Some(kind) = relation_kind(name) {
            let args = Args::of(stmt, usize::from(name == "RelIndex"));
            let from = args.require(doc, stmt, 0, "from")?;
            let to = args.require(doc, stmt, 1, "to")?;
            let relation = C4Relation {
                kind: kind.to_string(),
                label: args.get(2, "label").unwrap_or_default(),
                technology: args.get(3, "techn"),
                description: args.get(4, "descr"),
                sprite: args.get(5, "sprite"),
                tags: args.get(6, "tags"),
                link: args.get(7, "link"),
                styles: IndexMap::new(),
                from,
                to,
            };
            let existing = self
                .model
                .relations
                .iter_mut()
                .find(|r| r.from == relation.from && r.to == relation.to);
            match existing {
                Some(existing) => *existing = relation,
                None => self.model.relations.push(relation),
            }
            return Ok(());
        }

        match name {
            "UpdateElementStyle" => {
                let args = Args::of(stmt, 0);
                let target = args.require(doc, stmt, 0, "elementName")?;
                let styles = collect_styles(
                    &args,
                    1,
                    &[
                        "bgColor",
                        "fontColor",
                        "borderColor",
                        "shadowing",
                        "shape",
                        "sprite",
                        "techn",
                        "legendText",
                        "legendSprite",
                    ],
                );
                if let Some(element) = self.model.elements.iter_mut().find(|e| e.alias == target) {
                    element.styles.extend(styles);
                } else if let Some(boundary) =
                    self.model.boundaries.iter_mut().find(|b| b.alias == target)
                {
                    boundary.styles.extend(styles);
                } else {
                    return Err(doc.invalid(stmt, format!("unknown element `{target}`")));
                }
            }
            "UpdateRelStyle" => {
                let args = Args::of(stmt, 0);
                let from = args.require(doc, stmt, 0, "from")?;
                let to = args.require(doc, stmt, 1, "to")?;
                let styles =
                    collect_styles(&args, 2, &["textColor", "lineColor", "offsetX", "offsetY"]);
                let Some(rel) = self
                    .model
                    .relations
                    .iter_mut()
                    .find(|r| r.from == from && r.to == to)
                else {
                    return Err(doc.invalid(stmt, format!("unknown relation {from} -> {to}")));
                };
                rel.styles.extend(styles);
            }
            "UpdateLayoutConfig" => {
                let args = Args::of(stmt, 0);
                let layout = &mut self.model.layout;
                if let Some(v) = args.get(0, "c4ShapeInRow").and_then(|v| v.parse().ok()) {
                    if v >= 1 {
                        layout.shape_in_row = v;
                    }
                }
                if let Some(v) = args.get(1, "c4BoundaryInRow").and_then(|v| v.parse().ok()) {
                    if v >= 1 {
                        layout.boundary_in_row = v;
                    }
                }
            }
            other => return Err(doc.invalid(stmt, format!("unsupported C4 macro `{other}`"))),
        }
        Ok(())
    }
}

/// Style slots starting at positional `first`, each overridable by `$key=`.
fn collect_styles(args: &Args<'_>, first: usize, keys: &[&str]) -> IndexMap<String, String> {
    keys.iter()
        .enumerate()
        .filter_map(|(i, key)| Some((key.to_string(), args.get(first + i, key)?)))
        .collect()
}

pub fn transform(doc: &Document<'_>, config: &Config) -> CanonResult<C4Model> {
    let header = doc.header()?;
    let mut layout = C4Layout::default();
    if let Some(v) = config.get_i64("c4.c4ShapeInRow").filter(|v| *v >= 1) {
        layout.shape_in_row = v;
    }
    if let Some(v) = config.get_i64("c4.c4BoundaryInRow").filter(|v| *v >= 1) {
        layout.boundary_in_row = v;
    }
    let mut builder = C4Builder {
        model: C4Model {
            c4_type: header.require_text("keyword")?.to_string(),
            layout,
            wrap: config.get_bool("wrap").unwrap_or(false),
            ..Default::default()
        },
        boundaries: ContextStack::new(),
    };

    builder.walk(doc, doc.statements())?;

    let model = builder.model;
    tracing::debug!(
        c4_type = %model.c4_type,
        elements = model.elements.len(),
        boundaries = model.boundaries.len(),
        relations = model.relations.len(),
        "c4 canonicalized"
    );
    Ok(model)
}

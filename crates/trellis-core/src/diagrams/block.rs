//! Block diagrams (`block-beta`): grid-placed blocks, nested composites and edges between them.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::Serialize;
use winnow::ascii::digit1;
use winnow::combinator::{alt, cut_err, opt, preceded, separated};
use winnow::prelude::*;
use winnow::stream::Location;

use super::flowchart::grammar::{class_assign, class_def, link, shaped_label, style, vertex_id};
use super::flowchart::{LinkOp, NodeShape, label_text, split_styles};
use crate::canon::{ContextStack, Entity, EntityRegistry, apply_accessibility, merge_text, merge_unique};
use crate::config::Config;
use crate::cst::{Document, Record, Token};
use crate::error::{CanonResult, GrammarError, Result};
use crate::grammar::{self, accessibility, close_block, header, span_from, statements};
use crate::lex::{
    Input, PResult, eol, expected, hspace0, hspace1, keyword, label_until, punct, quoted, spanned,
    symbol, word,
};
use crate::model::{Accessibility, Model};

pub const NOTATION: &str = "block";
pub const HEADERS: &[&str] = &["block-beta", "block"];
const STATEMENTS: &[&str] = &[
    "block id",
    "space",
    "columns",
    "block … end",
    "classDef",
    "class",
    "style",
    "accTitle",
    "accDescr",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockKind {
    #[default]
    Node,
    Composite,
    Space,
    Arrow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockModel {
    /// Root grid width; `None` lays every child out in a single row.
    pub columns: Option<u32>,
    /// Every block in first-seen order, composites included.
    pub blocks: Vec<Block>,
    pub edges: Vec<BlockEdge>,
    pub class_defs: IndexMap<String, Vec<String>>,
    pub warnings: Vec<String>,
    pub acc: Accessibility,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: String,
    pub label: String,
    pub kind: BlockKind,
    pub shape: NodeShape,
    /// Pointing directions of a block arrow.
    pub directions: Vec<String>,
    /// Grid cells spanned horizontally.
    pub width: u32,
    /// Grid width of a composite; `None` is `auto`.
    pub columns: Option<u32>,
    pub parent: Option<String>,
    pub children: Vec<String>,
    pub classes: Vec<String>,
    pub styles: Vec<String>,
}

impl Entity for Block {
    fn implicit(id: &str) -> Self {
        Self {
            id: id.to_string(),
            label: id.to_string(),
            kind: BlockKind::Node,
            shape: NodeShape::Square,
            directions: Vec::new(),
            width: 1,
            columns: None,
            parent: None,
            children: Vec::new(),
            classes: Vec::new(),
            styles: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockEdge {
    pub id: String,
    pub from: String,
    pub to: String,
    pub label: Option<String>,
    pub op: String,
}

impl BlockModel {
    pub fn block(&self, id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    /// Blocks placed directly in the root grid.
    pub fn roots(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(|b| b.parent.is_none())
    }
}

impl Model for BlockModel {
    fn entity_ids(&self) -> Vec<&str> {
        self.blocks.iter().map(|b| b.id.as_str()).collect()
    }

    fn relation_endpoints(&self) -> Vec<(&str, &str)> {
        self.edges
            .iter()
            .map(|e| (e.from.as_str(), e.to.as_str()))
            .collect()
    }

    fn group_refs(&self) -> Vec<(&str, &str)> {
        self.blocks
            .iter()
            .filter_map(|b| b.parent.as_deref().map(|p| (b.id.as_str(), p)))
            .collect()
    }

    fn group_ids(&self) -> Vec<&str> {
        self.blocks
            .iter()
            .filter(|b| b.kind == BlockKind::Composite)
            .map(|b| b.id.as_str())
            .collect()
    }
}

pub fn parse(text: &str, config: &Config) -> Result<BlockModel> {
    let doc = parse_document(text)?;
    super::canonicalized(NOTATION, transform(&doc, config))
}

pub fn parse_document(text: &str) -> std::result::Result<Document<'_>, GrammarError> {
    grammar::parse_document(NOTATION, text, header(HEADERS), statement, STATEMENTS)
}

fn statement<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    alt((
        accessibility,
        columns,
        class_def,
        class_assign,
        style,
        composite,
        items,
    ))
    .parse_next(input)
}

/// `columns 3` or `columns auto`
fn columns<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("columns").parse_next(input)?;
    hspace1.parse_next(input)?;
    let value = cut_err(spanned(alt((keyword("auto"), digit1))))
        .context(expected("column count or `auto`"))
        .parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("columns", span_from(input, start)).with("value", value))
}

/// `block` or `block:id[:width]` with an optional label, then a body closed by `end`.
fn composite<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("block").parse_next(input)?;
    let head = opt(preceded(punct(':'), cut_err(node))).parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    let body = statements(statement, &["end"], STATEMENTS).parse_next(input)?;
    close_block("end").parse_next(input)?;
    Ok(Record::new("composite", span_from(input, start))
        .with_opt("head", head)
        .with("body", body))
}

/// One line of blocks separated by whitespace; each may start a chain of edges.
fn items<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let items: Vec<Record<'a>> = separated(1.., alt((space, chain)), hspace1).parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("items", span_from(input, start)).with("items", items))
}

/// `space` or `space:3`
fn space<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("space").parse_next(input)?;
    let width = opt(preceded(punct(':'), cut_err(spanned(digit1)))).parse_next(input)?;
    Ok(Record::new("space", span_from(input, start)).with_opt("width", width))
}

/// `a`, `a --> b`, `a -- "label" --> b --> c`
fn chain<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let mut nodes = vec![node.parse_next(input)?];
    let mut links = Vec::new();
    while let Some((_, found, _)) = opt((hspace0, link, hspace0)).parse_next(input)? {
        links.push(found);
        nodes.push(cut_err(node).parse_next(input)?);
    }
    Ok(Record::new("chain", span_from(input, start))
        .with("nodes", nodes)
        .with("links", links))
}

/// `id`, `id["label"]`, `id(("label"))`, `id<["label"]>(right, down)` and a `:width` suffix.
fn node<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let id = vertex_id.parse_next(input)?;
    let arrow = opt(block_arrow).parse_next(input)?;
    let shape = match arrow {
        Some(_) => None,
        None => opt(shaped_label).parse_next(input)?,
    };
    let width = opt(preceded(punct(':'), cut_err(spanned(digit1))))
        .context(expected("block width"))
        .parse_next(input)?;
    Ok(Record::new("node", span_from(input, start))
        .with("id", id)
        .with_opt("arrow", arrow)
        .with_opt("shape", shape)
        .with_opt("width", width))
}

fn block_arrow<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    symbol("<[").parse_next(input)?;
    let label = cut_err(alt((spanned(quoted), spanned(label_until("]>"))))).parse_next(input)?;
    cut_err((symbol("]>"), punct('('), hspace0)).parse_next(input)?;
    let directions: Vec<Token<'a>> =
        cut_err(separated(1.., spanned(word), (hspace0, punct(','), hspace0)))
            .context(expected("arrow direction"))
            .parse_next(input)?;
    cut_err((hspace0, punct(')'))).parse_next(input)?;
    Ok(Record::new("arrow", span_from(input, start))
        .with("label", label)
        .with("directions", directions))
}

const DIRECTIONS: &[&str] = &["right", "left", "up", "down", "x", "y"];

struct BlockBuilder {
    model: BlockModel,
    blocks: EntityRegistry<Block>,
    /// Ids of the composites enclosing the current statement.
    scopes: ContextStack<String>,
    anonymous: usize,
    spaces: usize,
    edge_counts: FxHashMap<String, usize>,
}

impl BlockBuilder {
    /// Finds or creates `id`, placing a new block in the innermost composite.
    fn place(&mut self, id: &str) -> &mut Block {
        if !self.blocks.contains(id) {
            let parent = self.scopes.current().cloned();
            if let Some(owner) = parent.as_deref().and_then(|p| self.blocks.get_mut(p)) {
                owner.children.push(id.to_string());
            }
            self.blocks.find_or_create(id).parent = parent;
        }
        self.blocks.find_or_create(id)
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
                "columns" => {
                    let value = stmt.require_text("value")?;
                    let columns = match value {
                        "auto" => None,
                        n => Some(n.parse().map_err(|_| {
                            doc.invalid(stmt, format!("column count `{n}` is out of range"))
                        })?),
                    };
                    match self.scopes.current().cloned() {
                        Some(id) => self.place(&id).columns = columns,
                        None => self.model.columns = columns,
                    }
                }
                "composite" => self.apply_composite(doc, stmt)?,
                "items" => {
                    for item in stmt.records("items") {
                        match item.kind {
                            "space" => self.apply_space(doc, item)?,
                            _ => self.apply_chain(doc, item)?,
                        }
                    }
                }
                "classDef" => {
                    let styles = split_styles(stmt.text("styles").unwrap_or_default());
                    for name in stmt.texts("names") {
                        self.model.class_defs.insert(name.to_string(), styles.clone());
                    }
                }
                "class" => {
                    for id in stmt.texts("ids") {
                        merge_unique(&mut self.place(id).classes, stmt.texts("classes"));
                    }
                }
                "style" => {
                    let id = stmt.require_text("id")?;
                    let styles = split_styles(stmt.text("styles").unwrap_or_default());
                    self.place(id).styles.extend(styles);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn apply_composite(&mut self, doc: &Document<'_>, stmt: &Record<'_>) -> CanonResult<()> {
        let id = match stmt.record("head") {
            Some(head) => self.apply_node(doc, head)?,
            None => {
                self.anonymous += 1;
                let id = format!("block{}", self.anonymous);
                self.place(&id).label = String::new();
                id
            }
        };
        let block = self.place(&id);
        if block.kind == BlockKind::Node && block.label == block.id {
            block.label = String::new();
        }
        block.kind = BlockKind::Composite;

        self.scopes.push(id);
        self.walk(doc, stmt.records("body"))?;
        self.scopes.pop();
        Ok(())
    }

    /// A space expands into one blank cell per column it spans.
    fn apply_space(&mut self, doc: &Document<'_>, item: &Record<'_>) -> CanonResult<()> {
        let width = match item.text("width") {
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| doc.invalid(item, format!("space width `{raw}` is out of range")))?,
            None => 1,
        };
        self.spaces += 1;
        let base = format!("space{}", self.spaces);
        for j in 0..width {
            let block = self.place(&format!("{base}-{j}"));
            block.kind = BlockKind::Space;
            block.label = String::new();
        }
        Ok(())
    }

    fn apply_node(&mut self, doc: &Document<'_>, node: &Record<'_>) -> CanonResult<String> {
        let id = node.require_text("id")?.to_string();
        let width = match node.text("width") {
            Some(raw) => Some(raw.parse::<u32>().map_err(|_| {
                doc.invalid(node, format!("block width `{raw}` is out of range"))
            })?),
            None => None,
        };
        let block = self.place(&id);
        if let Some(width) = width {
            block.width = width;
        }
        if let Some(shape) = node.record("shape") {
            let open = shape.require_text("opener")?;
            let close = shape.require_text("closer")?;
            block.shape = NodeShape::from_delimiters(open, close).ok_or_else(|| {
                doc.invalid(node, format!("`{open}` cannot be closed by `{close}`"))
            })?;
            merge_text(&mut block.label, shape.text("label").map(label_text));
        }
        if let Some(arrow) = node.record("arrow") {
            let directions: Vec<String> = arrow.texts("directions").map(str::to_string).collect();
            if let Some(bad) = directions.iter().find(|d| !DIRECTIONS.contains(&d.as_str())) {
                return Err(doc.invalid(arrow, format!("invalid arrow direction `{bad}`")));
            }
            block.kind = BlockKind::Arrow;
            block.directions = directions;
            merge_text(&mut block.label, arrow.text("label").map(label_text));
        }
        Ok(id)
    }

    fn apply_chain(&mut self, doc: &Document<'_>, item: &Record<'_>) -> CanonResult<()> {
        let mut ids = Vec::new();
        for node in item.records("nodes") {
            ids.push(self.apply_node(doc, node)?);
        }
        for (idx, found) in item.records("links").enumerate() {
            let op = found.require_text("op")?;
            if LinkOp::decode(op).is_none() {
                return Err(doc.invalid(found, format!("unknown link operator `{op}`")));
            }
            let (from, to) = (&ids[idx], &ids[idx + 1]);
            let count = self.edge_counts.entry(format!("{from}-{to}")).or_default();
            *count += 1;
            self.model.edges.push(BlockEdge {
                id: format!("{count}-{from}-{to}"),
                from: from.clone(),
                to: to.clone(),
                label: found
                    .text("label")
                    .map(label_text)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string),
                op: op.to_string(),
            });
        }
        Ok(())
    }

    fn finish(mut self) -> BlockModel {
        let blocks = self.blocks.into_vec();
        for block in &blocks {
            let columns = match &block.parent {
                Some(parent) => blocks.iter().find(|b| &b.id == parent).and_then(|b| b.columns),
                None => self.model.columns,
            };
            if let Some(columns) = columns.filter(|&c| block.width > c) {
                tracing::warn!(id = %block.id, width = block.width, columns, "block wider than its grid");
                self.model.warnings.push(format!(
                    "block `{}` spans {} columns but its grid has {columns}",
                    block.id, block.width
                ));
            }
        }
        self.model.blocks = blocks;
        self.model
    }
}

pub fn transform(doc: &Document<'_>, _config: &Config) -> CanonResult<BlockModel> {
    let mut builder = BlockBuilder {
        model: BlockModel {
            columns: None,
            blocks: Vec::new(),
            edges: Vec::new(),
            class_defs: IndexMap::new(),
            warnings: Vec::new(),
            acc: Accessibility::default(),
        },
        blocks: EntityRegistry::new(),
        scopes: ContextStack::new(),
        anonymous: 0,
        spaces: 0,
        edge_counts: FxHashMap::default(),
    };
    builder.walk(doc, doc.statements())?;
    let model = builder.finish();

    tracing::debug!(
        blocks = model.blocks.len(),
        edges = model.edges.len(),
        "block canonicalized"
    );
    Ok(model)
}

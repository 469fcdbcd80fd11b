//! Flowchart (`flowchart` / `graph`) model and canonicalizer.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::canon::{
    ContextStack, Entity, EntityRegistry, apply_accessibility, merge_opt, merge_text, merge_unique,
};
use crate::config::Config;
use crate::cst::{Document, Record};
use crate::error::{CanonResult, GrammarError, Result};
use crate::grammar::header;
use crate::model::{Accessibility, Model};

pub(crate) mod grammar;

pub const NOTATION: &str = "flowchart";
pub const HEADERS: &[&str] = &["flowchart-elk", "flowchart", "graph"];
const STATEMENTS: &[&str] = &[
    "node",
    "link",
    "subgraph",
    "classDef",
    "class",
    "style",
    "linkStyle",
    "click",
    "direction",
    "accTitle",
    "accDescr",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeShape {
    #[default]
    Square,
    Round,
    Stadium,
    Subroutine,
    Cylinder,
    Circle,
    DoubleCircle,
    Odd,
    Diamond,
    Hexagon,
    LeanRight,
    LeanLeft,
    Trapezoid,
    InvTrapezoid,
}

impl NodeShape {
    pub fn from_delimiters(open: &str, close: &str) -> Option<Self> {
        Some(match (open, close) {
            ("(((", ")))") => Self::DoubleCircle,
            ("((", "))") => Self::Circle,
            ("([", "])") => Self::Stadium,
            ("[[", "]]") => Self::Subroutine,
            ("[(", ")]") => Self::Cylinder,
            ("[/", "/]") => Self::LeanRight,
            ("[\\", "\\]") => Self::LeanLeft,
            ("[/", "\\]") => Self::Trapezoid,
            ("[\\", "/]") => Self::InvTrapezoid,
            ("{{", "}}") => Self::Hexagon,
            ("{", "}") => Self::Diamond,
            ("(", ")") => Self::Round,
            (">", "]") => Self::Odd,
            ("[", "]") => Self::Square,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Arrowhead {
    #[default]
    None,
    Point,
    Cross,
    Circle,
}

impl Arrowhead {
    fn from_char(c: char) -> Option<Self> {
        Some(match c {
            '<' | '>' => Self::Point,
            'x' => Self::Cross,
            'o' => Self::Circle,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Stroke {
    #[default]
    Normal,
    Thick,
    Dotted,
    Invisible,
}

/// A decoded link operator such as `<-.->` or `====>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkOp {
    pub start: Arrowhead,
    pub end: Arrowhead,
    pub stroke: Stroke,
    /// Rank span requested by extra line characters; `-->` and `---` are 1.
    pub length: usize,
}

impl LinkOp {
    /// Returns `None` for spellings that are not a complete operator (`--`, `<--`, `=`).
    pub fn decode(op: &str) -> Option<Self> {
        let mut rest = op;
        let mut start = Arrowhead::None;
        if let Some(first) = rest.chars().next() {
            if let Some(head) = Arrowhead::from_char(first).filter(|_| first != '>') {
                start = head;
                rest = &rest[first.len_utf8()..];
            }
        }
        let mut end = Arrowhead::None;
        if let Some(last) = rest.chars().last() {
            if let Some(head) = Arrowhead::from_char(last).filter(|_| last != '<') {
                end = head;
                rest = &rest[..rest.len() - last.len_utf8()];
            }
        }
        if start != Arrowhead::None && end == Arrowhead::None {
            return None;
        }

        let count = rest.chars().count();
        let open = end == Arrowhead::None;
        let run = |c: char| rest.chars().all(|x| x == c);
        let (stroke, length) = if run('-') || run('=') {
            let stroke = if run('-') { Stroke::Normal } else { Stroke::Thick };
            let min = if open { 3 } else { 2 };
            let short_arrow = count == 1 && stroke == Stroke::Normal && op.ends_with('>');
            if count < min && !short_arrow {
                return None;
            }
            (stroke, (count + 1).saturating_sub(min).max(1))
        } else if run('~') {
            if count < 3 || !open {
                return None;
            }
            (Stroke::Invisible, count - 2)
        } else {
            let dots = rest.strip_prefix('-')?.strip_suffix('-')?;
            if dots.is_empty() || !dots.chars().all(|c| c == '.') {
                return None;
            }
            (Stroke::Dotted, dots.len())
        };
        Some(Self {
            start,
            end,
            stroke,
            length,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowchartModel {
    pub direction: String,
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
    /// In closing order, so nested subgraphs precede their parents.
    pub subgraphs: Vec<FlowSubgraph>,
    pub class_defs: IndexMap<String, Vec<String>>,
    pub default_link_style: Vec<String>,
    pub default_interpolate: Option<String>,
    pub acc: Accessibility,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowNode {
    pub id: String,
    pub label: String,
    pub shape: NodeShape,
    pub classes: Vec<String>,
    pub styles: Vec<String>,
    pub link: Option<String>,
    pub link_target: Option<String>,
    pub callback: Option<FlowCallback>,
    pub tooltip: Option<String>,
}

impl Entity for FlowNode {
    fn implicit(id: &str) -> Self {
        Self {
            id: id.to_string(),
            label: id.to_string(),
            shape: NodeShape::Square,
            classes: Vec::new(),
            styles: Vec::new(),
            link: None,
            link_target: None,
            callback: None,
            tooltip: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowCallback {
    pub function: String,
    pub args: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowEdge {
    pub id: String,
    pub from: String,
    pub to: String,
    pub label: Option<String>,
    pub start: Arrowhead,
    pub end: Arrowhead,
    pub stroke: Stroke,
    pub length: usize,
    pub styles: Vec<String>,
    pub interpolate: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSubgraph {
    pub id: String,
    pub title: String,
    pub direction: Option<String>,
    /// Direct members: vertex ids and nested subgraph ids.
    pub nodes: Vec<String>,
    pub parent: Option<String>,
    pub classes: Vec<String>,
    pub styles: Vec<String>,
}

impl FlowchartModel {
    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn subgraph(&self, id: &str) -> Option<&FlowSubgraph> {
        self.subgraphs.iter().find(|s| s.id == id)
    }

    pub fn edges_from<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a FlowEdge> + 'a {
        self.edges.iter().filter(move |e| e.from == id)
    }

    pub fn edges_to<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a FlowEdge> + 'a {
        self.edges.iter().filter(move |e| e.to == id)
    }

    /// The innermost subgraph listing `id` as a member.
    pub fn subgraph_of(&self, id: &str) -> Option<&FlowSubgraph> {
        self.subgraphs
            .iter()
            .find(|s| s.nodes.iter().any(|n| n == id))
    }
}

impl Model for FlowchartModel {
    fn entity_ids(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .map(|n| n.id.as_str())
            .chain(self.subgraphs.iter().map(|s| s.id.as_str()))
            .collect()
    }

    fn relation_endpoints(&self) -> Vec<(&str, &str)> {
        self.edges
            .iter()
            .map(|e| (e.from.as_str(), e.to.as_str()))
            .collect()
    }

    fn group_refs(&self) -> Vec<(&str, &str)> {
        self.subgraphs
            .iter()
            .flat_map(|s| s.nodes.iter().map(move |n| (n.as_str(), s.id.as_str())))
            .collect()
    }

    fn group_ids(&self) -> Vec<&str> {
        self.subgraphs.iter().map(|s| s.id.as_str()).collect()
    }
}

pub fn parse(text: &str, config: &Config) -> Result<FlowchartModel> {
    let doc = parse_document(text)?;
    super::canonicalized(NOTATION, transform(&doc, config))
}

pub fn parse_document(text: &str) -> std::result::Result<Document<'_>, GrammarError> {
    crate::grammar::parse_document(NOTATION, text, header(HEADERS), grammar::statement, STATEMENTS)
}

/// Maps `TD`, `>`, `v` and friends onto the four canonical directions.
pub fn normalize_direction(raw: &str) -> Option<&'static str> {
    Some(match raw.trim().trim_end_matches(';') {
        "TB" | "TD" | "v" => "TB",
        "BT" | "^" => "BT",
        "LR" | ">" => "LR",
        "RL" | "<" => "RL",
        _ => return None,
    })
}

/// Unquoted, trimmed label text.
pub(crate) fn label_text(raw: &str) -> &str {
    let raw = raw.trim();
    raw.strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .unwrap_or(raw)
}

pub(crate) fn split_styles(raw: &str) -> Vec<String> {
    raw.trim_end_matches(';')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Default)]
struct SubgraphFrame {
    members: Vec<String>,
    direction: Option<String>,
}

struct FlowBuilder {
    model: FlowchartModel,
    nodes: EntityRegistry<FlowNode>,
    pair_counts: FxHashMap<(String, String), usize>,
    scopes: ContextStack<SubgraphFrame>,
}

impl FlowBuilder {
    fn touch(&mut self, id: &str) {
        if let Some(frame) = self.scopes.current_mut() {
            merge_unique(&mut frame.members, [id]);
        }
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
                "direction" => {
                    let value = stmt.require_text("value")?;
                    let dir = normalize_direction(value)
                        .ok_or_else(|| doc.invalid(stmt, format!("unknown direction `{value}`")))?;
                    match self.scopes.current_mut() {
                        Some(frame) => frame.direction = Some(dir.to_string()),
                        None => self.model.direction = dir.to_string(),
                    }
                }
                "subgraph" => {
                    self.scopes.push(SubgraphFrame::default());
                    self.walk(doc, stmt.records("body"))?;
                    let frame = self.scopes.pop().unwrap_or_default();
                    let id = self.close_subgraph(stmt, frame);
                    self.touch(&id);
                }
                "chain" => self.apply_chain(doc, stmt)?,
                "classDef" => {
                    let styles = split_styles(stmt.text("styles").unwrap_or_default());
                    for name in stmt.texts("names") {
                        self.model.class_defs.insert(name.to_string(), styles.clone());
                    }
                }
                "class" => {
                    for id in stmt.texts("ids") {
                        match self.model.subgraphs.iter_mut().find(|s| s.id == id) {
                            Some(sub) => merge_unique(&mut sub.classes, stmt.texts("classes")),
                            None => merge_unique(
                                &mut self.nodes.find_or_create(id).classes,
                                stmt.texts("classes"),
                            ),
                        }
                    }
                }
                "style" => {
                    let id = stmt.require_text("id")?;
                    let styles = split_styles(stmt.text("styles").unwrap_or_default());
                    match self.model.subgraphs.iter_mut().find(|s| s.id == id) {
                        Some(sub) => sub.styles.extend(styles),
                        None => self.nodes.find_or_create(id).styles.extend(styles),
                    }
                }
                "linkStyle" => self.apply_link_style(doc, stmt)?,
                "click" => self.apply_click(stmt)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn apply_vertex(&mut self, doc: &Document<'_>, vertex: &Record<'_>) -> CanonResult<String> {
        let id = vertex.require_text("id")?;
        let node = self.nodes.find_or_create(id);
        if let Some(shape) = vertex.record("shape") {
            let open = shape.require_text("opener")?;
            let close = shape.require_text("closer")?;
            node.shape = NodeShape::from_delimiters(open, close).ok_or_else(|| {
                doc.invalid(vertex, format!("`{open}` cannot be closed by `{close}`"))
            })?;
            merge_text(&mut node.label, shape.text("label").map(label_text));
        }
        merge_unique(&mut node.classes, vertex.text("class"));
        let id = id.to_string();
        self.touch(&id);
        Ok(id)
    }

    fn apply_chain(&mut self, doc: &Document<'_>, stmt: &Record<'_>) -> CanonResult<()> {
        let mut groups = Vec::new();
        for group in stmt.list("groups") {
            let mut ids = Vec::new();
            for vertex in group.as_list().iter().filter_map(|v| v.as_record()) {
                ids.push(self.apply_vertex(doc, vertex)?);
            }
            groups.push(ids);
        }

        for (idx, link) in stmt.records("links").enumerate() {
            let raw = link.require_text("op")?;
            let op = LinkOp::decode(raw)
                .ok_or_else(|| doc.invalid(link, format!("unknown link operator `{raw}`")))?;
            let label = link
                .text("label")
                .map(label_text)
                .filter(|l| !l.is_empty())
                .map(str::to_string);
            for from in &groups[idx] {
                for to in &groups[idx + 1] {
                    self.push_edge(from, to, op, label.clone());
                }
            }
        }
        Ok(())
    }

    fn push_edge(&mut self, from: &str, to: &str, op: LinkOp, label: Option<String>) {
        let count = self
            .pair_counts
            .entry((from.to_string(), to.to_string()))
            .or_default();
        let id = format!("L_{from}_{to}_{count}");
        *count += 1;
        tracing::trace!(%id, "flowchart edge");
        self.model.edges.push(FlowEdge {
            id,
            from: from.to_string(),
            to: to.to_string(),
            label,
            start: op.start,
            end: op.end,
            stroke: op.stroke,
            length: op.length,
            styles: Vec::new(),
            interpolate: None,
        });
    }

    fn close_subgraph(&mut self, stmt: &Record<'_>, frame: SubgraphFrame) -> String {
        let auto_id = format!("subGraph{}", self.model.subgraphs.len());
        let (id, title) = match (stmt.text("id"), stmt.text("title"), stmt.text("text")) {
            (Some(id), title, _) => (id.to_string(), title.map_or(id, label_text).to_string()),
            (None, Some(title), _) => (auto_id, label_text(title).to_string()),
            (None, None, Some(text)) if text.contains(char::is_whitespace) => {
                (auto_id, text.to_string())
            }
            (None, None, text) => {
                let text = text.unwrap_or_default().to_string();
                (text.clone(), text)
            }
        };

        // A vertex already claimed by a nested subgraph stays there.
        let claimed = |member: &String, subgraphs: &[FlowSubgraph]| {
            subgraphs
                .iter()
                .any(|s| s.nodes.iter().any(|n| n == member))
        };
        let members: Vec<String> = frame
            .members
            .into_iter()
            .filter(|m| !claimed(m, self.model.subgraphs.as_slice()))
            .collect();
        for sub in self.model.subgraphs.iter_mut() {
            if members.contains(&sub.id) {
                sub.parent = Some(id.clone());
            }
        }
        self.model.subgraphs.push(FlowSubgraph {
            id: id.clone(),
            title,
            direction: frame.direction,
            nodes: members,
            parent: None,
            classes: Vec::new(),
            styles: Vec::new(),
        });
        id
    }

    fn apply_link_style(&mut self, doc: &Document<'_>, stmt: &Record<'_>) -> CanonResult<()> {
        let positions = stmt.require_text("positions")?;
        let styles = split_styles(stmt.text("styles").unwrap_or_default());
        let interpolate = stmt.text("interpolate").map(str::to_string);
        if positions == "default" {
            self.model.default_link_style = styles;
            merge_opt(&mut self.model.default_interpolate, interpolate);
            return Ok(());
        }
        for raw in positions.split(',').map(str::trim) {
            let idx: usize = raw
                .parse()
                .map_err(|_| doc.invalid(stmt, format!("invalid link index `{raw}`")))?;
            let count = self.model.edges.len();
            let edge = self.model.edges.get_mut(idx).ok_or_else(|| {
                doc.invalid(
                    stmt,
                    format!("linkStyle index {idx} is out of bounds, the diagram has {count} links"),
                )
            })?;
            edge.styles = styles.clone();
            merge_opt(&mut edge.interpolate, interpolate.clone());
        }
        Ok(())
    }

    fn apply_click(&mut self, stmt: &Record<'_>) -> CanonResult<()> {
        let id = stmt.require_text("id")?;
        let Some(node) = self.nodes.get_mut(id) else {
            tracing::warn!(id, "click on an undeclared node ignored");
            return Ok(());
        };
        if let Some(href) = stmt.text("href") {
            node.link = Some(href.to_string());
            merge_opt(&mut node.link_target, stmt.text("target").map(str::to_string));
        }
        if let Some(function) = stmt.text("callback") {
            node.callback = Some(FlowCallback {
                function: function.to_string(),
                args: stmt.non_empty_text("args").map(str::to_string),
            });
        }
        merge_opt(&mut node.tooltip, stmt.text("tooltip").map(str::to_string));
        Ok(())
    }

    fn finish(mut self) -> FlowchartModel {
        let subgraph_ids: Vec<String> = self.model.subgraphs.iter().map(|s| s.id.clone()).collect();
        // Links may target a subgraph by id; drop the bare vertices those references created.
        self.model.nodes = self
            .nodes
            .into_vec()
            .into_iter()
            .filter(|n| {
                !(subgraph_ids.contains(&n.id) && n.label == n.id && n.shape == NodeShape::Square)
            })
            .collect();
        self.model
    }
}

pub fn transform(doc: &Document<'_>, config: &Config) -> CanonResult<FlowchartModel> {
    let header = doc.header()?;
    let direction = match header.text("rest") {
        Some(raw) => normalize_direction(raw)
            .ok_or_else(|| doc.invalid(header, format!("unknown direction `{}`", raw.trim())))?,
        None => config
            .get_str("flowchart.defaultDirection")
            .and_then(normalize_direction)
            .unwrap_or("TB"),
    };

    let mut builder = FlowBuilder {
        model: FlowchartModel {
            direction: direction.to_string(),
            nodes: Vec::new(),
            edges: Vec::new(),
            subgraphs: Vec::new(),
            class_defs: IndexMap::new(),
            default_link_style: Vec::new(),
            default_interpolate: None,
            acc: Accessibility::default(),
        },
        nodes: EntityRegistry::new(),
        pair_counts: FxHashMap::default(),
        scopes: ContextStack::new(),
    };
    builder.walk(doc, doc.statements())?;
    let model = builder.finish();

    tracing::debug!(
        nodes = model.nodes.len(),
        edges = model.edges.len(),
        subgraphs = model.subgraphs.len(),
        "flowchart canonicalized"
    );
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_operators_decode_heads_stroke_and_length() {
        let op = LinkOp::decode("-->").unwrap();
        assert_eq!((op.start, op.end, op.stroke, op.length), (Arrowhead::None, Arrowhead::Point, Stroke::Normal, 1));
        let op = LinkOp::decode("<==>").unwrap();
        assert_eq!((op.start, op.end, op.stroke), (Arrowhead::Point, Arrowhead::Point, Stroke::Thick));
        let op = LinkOp::decode("-..->").unwrap();
        assert_eq!((op.stroke, op.length), (Stroke::Dotted, 2));
        let op = LinkOp::decode("x--x").unwrap();
        assert_eq!((op.start, op.end), (Arrowhead::Cross, Arrowhead::Cross));
        assert_eq!(LinkOp::decode("---").unwrap().end, Arrowhead::None);
        assert_eq!(LinkOp::decode("---->").unwrap().length, 3);
        assert_eq!(LinkOp::decode("~~~").unwrap().stroke, Stroke::Invisible);
        assert!(LinkOp::decode("--").is_none());
        assert!(LinkOp::decode("<---").is_none());
        assert!(LinkOp::decode("-=>").is_none());
        let op = LinkOp::decode("->").unwrap();
        assert_eq!((op.end, op.stroke, op.length), (Arrowhead::Point, Stroke::Normal, 1));
        assert_eq!(LinkOp::decode("<->").unwrap().start, Arrowhead::Point);
        assert!(LinkOp::decode("-x").is_none());
        assert!(LinkOp::decode("=>").is_none());
    }

    #[test]
    fn directions_normalize() {
        assert_eq!(normalize_direction("TD"), Some("TB"));
        assert_eq!(normalize_direction(" LR;"), Some("LR"));
        assert_eq!(normalize_direction("^"), Some("BT"));
        assert_eq!(normalize_direction("XY"), None);
    }
}

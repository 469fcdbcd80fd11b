//! Class diagrams: classes with members, relations, namespaces and notes.

use indexmap::IndexMap;
use serde::Serialize;

use crate::canon::{ContextStack, Entity, EntityRegistry, apply_accessibility, merge_unique};
use crate::config::Config;
use crate::cst::{Document, Record};
use crate::diagrams::flowchart::{normalize_direction, split_styles};
use crate::error::{CanonResult, GrammarError, Result};
use crate::grammar::header;
use crate::model::{Accessibility, Model};

pub(crate) mod grammar;

pub const NOTATION: &str = "class";
pub const HEADERS: &[&str] = &["classDiagram-v2", "classDiagram"];
const STATEMENTS: &[&str] = &[
    "class",
    "relation",
    "member",
    "<<annotation>>",
    "namespace",
    "note",
    "direction",
    "classDef",
    "cssClass",
    "style",
    "accTitle",
    "accDescr",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Visibility {
    Public,
    Private,
    Protected,
    Package,
}

impl Visibility {
    fn from_marker(c: char) -> Option<Self> {
        Some(match c {
            '+' => Self::Public,
            '-' => Self::Private,
            '#' => Self::Protected,
            '~' => Self::Package,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Classifier {
    /// `$`
    Static,
    /// `*`
    Abstract,
}

impl Classifier {
    fn from_marker(c: char) -> Option<Self> {
        match c {
            '$' => Some(Self::Static),
            '*' => Some(Self::Abstract),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationEnd {
    #[default]
    None,
    Aggregation,
    Extension,
    Composition,
    Dependency,
    Lollipop,
}

impl RelationEnd {
    fn from_marker(marker: &str) -> Option<Self> {
        Some(match marker {
            "" => Self::None,
            "o" => Self::Aggregation,
            "<|" | "|>" => Self::Extension,
            "*" => Self::Composition,
            "<" | ">" => Self::Dependency,
            "()" => Self::Lollipop,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LineKind {
    Solid,
    Dotted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassModel {
    pub direction: String,
    pub classes: Vec<ClassNode>,
    pub relations: Vec<ClassRelation>,
    pub notes: Vec<ClassNote>,
    pub namespaces: Vec<Namespace>,
    pub class_defs: IndexMap<String, Vec<String>>,
    pub acc: Accessibility,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassNode {
    pub id: String,
    /// Display label; generic parameters render as `<T>`.
    pub label: String,
    pub generic: Option<String>,
    pub annotations: Vec<String>,
    pub attributes: Vec<ClassMember>,
    pub methods: Vec<ClassMember>,
    pub css_classes: Vec<String>,
    pub styles: Vec<String>,
    pub namespace: Option<String>,
}

impl Entity for ClassNode {
    fn implicit(id: &str) -> Self {
        Self {
            id: id.to_string(),
            label: id.to_string(),
            generic: None,
            annotations: Vec::new(),
            attributes: Vec::new(),
            methods: Vec::new(),
            css_classes: Vec::new(),
            styles: Vec::new(),
            namespace: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassMember {
    pub text: String,
    pub visibility: Option<Visibility>,
    pub name: String,
    /// Present for methods only.
    pub parameters: Option<String>,
    pub return_type: Option<String>,
    pub classifier: Option<Classifier>,
}

impl ClassMember {
    pub fn is_method(&self) -> bool {
        self.parameters.is_some()
    }

    /// Parses a member line. Anything with a parenthesized argument list is a method.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let (visibility, rest) = match text.chars().next().and_then(Visibility::from_marker) {
            Some(v) => (Some(v), &text[1..]),
            None => (None, text),
        };
        let method = rest
            .find('(')
            .zip(rest.rfind(')'))
            .filter(|(open, close)| open < close);

        match method {
            Some((open, close)) => {
                let after = rest[close + 1..].trim();
                let mut classifier = after.chars().next().and_then(Classifier::from_marker);
                let mut return_type = if classifier.is_some() {
                    after[1..].trim()
                } else {
                    after
                };
                if classifier.is_none() {
                    if let Some(c) = return_type.chars().last().and_then(Classifier::from_marker) {
                        classifier = Some(c);
                        return_type = return_type[..return_type.len() - 1].trim();
                    }
                }
                let return_type = return_type.trim_start_matches(':').trim();
                Self {
                    text: text.to_string(),
                    visibility,
                    name: rest[..open].trim().to_string(),
                    parameters: Some(rest[open + 1..close].trim().to_string()),
                    return_type: (!return_type.is_empty()).then(|| render_generics(return_type)),
                    classifier,
                }
            }
            None => {
                let classifier = rest.chars().last().and_then(Classifier::from_marker);
                let name = match classifier {
                    Some(_) => &rest[..rest.len() - 1],
                    None => rest,
                };
                Self {
                    text: text.to_string(),
                    visibility,
                    name: render_generics(name.trim()),
                    parameters: None,
                    return_type: None,
                    classifier,
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRelation {
    pub from: String,
    pub to: String,
    pub from_end: RelationEnd,
    pub to_end: RelationEnd,
    pub line: LineKind,
    pub from_cardinality: Option<String>,
    pub to_cardinality: Option<String>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassNote {
    pub target: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Namespace {
    pub id: String,
    pub classes: Vec<String>,
    pub parent: Option<String>,
}

impl ClassModel {
    pub fn class(&self, id: &str) -> Option<&ClassNode> {
        self.classes.iter().find(|c| c.id == id)
    }
}

impl Model for ClassModel {
    fn entity_ids(&self) -> Vec<&str> {
        self.classes.iter().map(|c| c.id.as_str()).collect()
    }

    fn relation_endpoints(&self) -> Vec<(&str, &str)> {
        self.relations
            .iter()
            .map(|r| (r.from.as_str(), r.to.as_str()))
            .collect()
    }

    fn group_refs(&self) -> Vec<(&str, &str)> {
        self.classes
            .iter()
            .filter_map(|c| c.namespace.as_deref().map(|ns| (c.id.as_str(), ns)))
            .collect()
    }

    fn group_ids(&self) -> Vec<&str> {
        self.namespaces.iter().map(|n| n.id.as_str()).collect()
    }
}

pub fn parse(text: &str, config: &Config) -> Result<ClassModel> {
    let doc = parse_document(text)?;
    super::canonicalized(NOTATION, transform(&doc, config))
}

pub fn parse_document(text: &str) -> std::result::Result<Document<'_>, GrammarError> {
    crate::grammar::parse_document(NOTATION, text, header(HEADERS), grammar::statement, STATEMENTS)
}

/// Rewrites `~T~` generic markers as `<T>`, nesting as deep as the closing markers allow.
///
/// A leading `~` and a `~` followed by whitespace never open a parameter list.
pub fn render_generics(text: &str) -> String {
    if !text.contains('~') {
        return text.to_string();
    }
    let chars: Vec<char> = text.chars().collect();
    let mut remaining = chars.iter().filter(|&&c| c == '~').count();
    let mut depth = 0usize;
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        if c != '~' {
            out.push(c);
            continue;
        }
        remaining -= 1;
        let next = chars.get(i + 1).copied();
        let opens = i > 0
            && next.is_some_and(|n| n != '~' && !n.is_whitespace())
            && remaining > depth;
        if opens {
            depth += 1;
            out.push('<');
        } else if depth > 0 {
            depth -= 1;
            out.push('>');
        } else {
            out.push('~');
        }
    }
    out
}

struct ClassBuilder {
    model: ClassModel,
    classes: EntityRegistry<ClassNode>,
    namespaces: ContextStack<String>,
}

impl ClassBuilder {
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
                    self.model.direction = dir.to_string();
                }
                "namespace" => self.apply_namespace(doc, stmt)?,
                "class" => self.apply_class(stmt)?,
                "annotation" => {
                    let id = self.class_ref(stmt.require_record("class")?)?;
                    let name = stmt.require_text("name")?;
                    merge_unique(&mut self.classes.find_or_create(&id).annotations, [name]);
                }
                "member" => {
                    let id = self.class_ref(stmt.require_record("class")?)?;
                    let member = ClassMember::parse(stmt.require_text("text")?);
                    self.add_member(&id, member);
                }
                "note" => {
                    let target = stmt.text("target").map(str::to_string);
                    if let Some(id) = &target {
                        self.classes.find_or_create(id);
                    }
                    self.model.notes.push(ClassNote {
                        target,
                        text: stmt.text("text").unwrap_or_default().to_string(),
                    });
                }
                "classDef" => {
                    let styles = split_styles(stmt.text("styles").unwrap_or_default());
                    for name in stmt.texts("names") {
                        self.model.class_defs.insert(name.to_string(), styles.clone());
                    }
                }
                "cssClass" => {
                    let class = stmt.require_text("class")?;
                    for id in stmt.require_text("ids")?.split(',').map(str::trim) {
                        if !id.is_empty() {
                            merge_unique(&mut self.classes.find_or_create(id).css_classes, [class]);
                        }
                    }
                }
                "style" => {
                    let id = stmt.require_text("id")?;
                    let styles = split_styles(stmt.text("styles").unwrap_or_default());
                    self.classes.find_or_create(id).styles.extend(styles);
                }
                "relation" => self.apply_relation(doc, stmt)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Resolves a class reference, recording its generic parameter on first sight.
    fn class_ref(&mut self, reference: &Record<'_>) -> CanonResult<String> {
        let id = reference.require_text("id")?;
        let class = self.classes.find_or_create(id);
        let generic = reference.non_empty_text("generic");
        if let Some(generic) = generic.filter(|_| class.generic.is_none()) {
            class.generic = Some(generic.to_string());
            if class.label == class.id {
                class.label = render_generics(&format!("{id}~{generic}~"));
            }
        }
        Ok(id.to_string())
    }

    fn add_member(&mut self, id: &str, member: ClassMember) {
        let class = self.classes.find_or_create(id);
        if member.is_method() {
            class.methods.push(member);
        } else {
            class.attributes.push(member);
        }
    }

    fn apply_class(&mut self, stmt: &Record<'_>) -> CanonResult<()> {
        let id = self.class_ref(stmt.require_record("class")?)?;
        let namespace = self.namespaces.current().cloned();
        let class = self.classes.find_or_create(&id);
        if let Some(label) = stmt.non_empty_text("label") {
            class.label = label.to_string();
        }
        if let Some(css) = stmt.text("css") {
            merge_unique(&mut class.css_classes, [css]);
        }
        if let Some(ns) = namespace.filter(|_| class.namespace.is_none()) {
            class.namespace = Some(ns.clone());
            if let Some(entry) = self.model.namespaces.iter_mut().find(|n| n.id == ns) {
                entry.classes.push(id.clone());
            }
        }

        let body = stmt.text("body").unwrap_or_default();
        for line in body.lines().map(str::trim) {
            if line.is_empty() || line.starts_with("%%") {
                continue;
            }
            if let Some(name) = line.strip_prefix("<<").and_then(|l| l.strip_suffix(">>")) {
                merge_unique(
                    &mut self.classes.find_or_create(&id).annotations,
                    [name.trim()],
                );
                continue;
            }
            self.add_member(&id, ClassMember::parse(line));
        }
        Ok(())
    }

    fn apply_namespace(&mut self, doc: &Document<'_>, stmt: &Record<'_>) -> CanonResult<()> {
        let id = stmt.require_text("id")?;
        if !self.model.namespaces.iter().any(|n| n.id == id) {
            self.model.namespaces.push(Namespace {
                id: id.to_string(),
                classes: Vec::new(),
                parent: self.namespaces.current().cloned(),
            });
        }
        self.namespaces.push(id.to_string());
        let walked = self.walk(doc, stmt.records("body"));
        self.namespaces.pop();
        walked
    }

    fn apply_relation(&mut self, doc: &Document<'_>, stmt: &Record<'_>) -> CanonResult<()> {
        let from = self.class_ref(stmt.require_record("from")?)?;
        let to = self.class_ref(stmt.require_record("to")?)?;
        let op = stmt.require_text("op")?;
        let (line, at) = match op.find("--") {
            Some(at) => (LineKind::Solid, at),
            None => match op.find("..") {
                Some(at) => (LineKind::Dotted, at),
                None => return Err(doc.invalid(stmt, format!("unknown relation `{op}`"))),
            },
        };
        let end = |marker: &str| {
            RelationEnd::from_marker(marker)
                .ok_or_else(|| doc.invalid(stmt, format!("unknown relation end `{marker}`")))
        };
        let relation = ClassRelation {
            from_end: end(&op[..at])?,
            to_end: end(&op[at + 2..])?,
            from,
            to,
            line,
            from_cardinality: stmt.text("fromCardinality").map(str::to_string),
            to_cardinality: stmt.text("toCardinality").map(str::to_string),
            label: stmt.non_empty_text("label").map(str::to_string),
        };
        self.model.relations.push(relation);
        Ok(())
    }
}

pub fn transform(doc: &Document<'_>, _config: &Config) -> CanonResult<ClassModel> {
    let mut builder = ClassBuilder {
        model: ClassModel {
            direction: "TB".to_string(),
            classes: Vec::new(),
            relations: Vec::new(),
            notes: Vec::new(),
            namespaces: Vec::new(),
            class_defs: IndexMap::new(),
            acc: Accessibility::default(),
        },
        classes: EntityRegistry::new(),
        namespaces: ContextStack::new(),
    };
    builder.walk(doc, doc.statements())?;
    let mut model = builder.model;
    model.classes = builder.classes.into_vec();

    tracing::debug!(
        classes = model.classes.len(),
        relations = model.relations.len(),
        namespaces = model.namespaces.len(),
        "class canonicalized"
    );
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generics_render_as_angle_brackets() {
        let cases = [
            ("test~T~", "test<T>"),
            ("test~Array~Array~string~~~", "test<Array<Array<string>>>"),
            ("Map~K,V~", "Map<K,V>"),
            ("~test~T~", "~test<T>"),
            ("~test", "~test"),
            ("plain", "plain"),
        ];
        for (input, expected) in cases {
            assert_eq!(render_generics(input), expected, "{input}");
        }
    }

    #[test]
    fn attributes_carry_visibility_and_classifier() {
        let attr = ClassMember::parse("-List~int~ ids$");
        assert!(!attr.is_method());
        assert_eq!(attr.visibility, Some(Visibility::Private));
        assert_eq!(attr.classifier, Some(Classifier::Static));
        assert_eq!(attr.name, "List<int> ids");

        let plain = ClassMember::parse("String name");
        assert_eq!(plain.visibility, None);
        assert_eq!(plain.classifier, None);
        assert_eq!(plain.name, "String name");
    }

    #[test]
    fn methods_split_parameters_and_return_type() {
        let m = ClassMember::parse("+getItems(int limit) List~Item~");
        assert!(m.is_method());
        assert_eq!(m.visibility, Some(Visibility::Public));
        assert_eq!(m.name, "getItems");
        assert_eq!(m.parameters.as_deref(), Some("int limit"));
        assert_eq!(m.return_type.as_deref(), Some("List<Item>"));

        let abstract_method = ClassMember::parse("#draw()*");
        assert_eq!(abstract_method.classifier, Some(Classifier::Abstract));
        assert_eq!(abstract_method.return_type, None);

        let trailing = ClassMember::parse("count() : i32$");
        assert_eq!(trailing.classifier, Some(Classifier::Static));
        assert_eq!(trailing.return_type.as_deref(), Some("i32"));
    }

    #[test]
    fn relation_ends_decode() {
        assert_eq!(RelationEnd::from_marker("<|"), Some(RelationEnd::Extension));
        assert_eq!(RelationEnd::from_marker("()"), Some(RelationEnd::Lollipop));
        assert_eq!(RelationEnd::from_marker(""), Some(RelationEnd::None));
        assert_eq!(RelationEnd::from_marker("<>"), None);
    }
}

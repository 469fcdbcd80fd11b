use indexmap::IndexMap;
use serde::Serialize;
use winnow::combinator::{alt, cut_err, opt, preceded, separated};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::stream::Location;

use crate::canon::{apply_accessibility, merge_text, merge_unique};
use crate::config::Config;
use crate::cst::{Cst, Document, Record, Token};
use crate::error::{CanonResult, GrammarError, Result};
use crate::grammar::{
    self, accessibility, close_block, direction_statement, header, span_from, statements,
};
use crate::lex::{
    Input, PResult, eol, expected, hspace0, hspace1, identifier, keyword, keyword_ci, name,
    punct, quoted, spanned, strip_terminator, symbol, text_to_eol,
};
use crate::model::{Accessibility, Model};

pub const NOTATION: &str = "requirement";
pub const HEADERS: &[&str] = &["requirementDiagram"];
const STATEMENTS: &[&str] = &[
    "requirement",
    "functionalRequirement",
    "interfaceRequirement",
    "performanceRequirement",
    "physicalRequirement",
    "designConstraint",
    "element",
    "relationship",
    "classDef",
    "class",
    "style",
    "direction",
    "accTitle",
    "accDescr",
];
const REQUIREMENT_FIELDS: &[&str] = &["id", "text", "risk", "verifymethod"];
const ELEMENT_FIELDS: &[&str] = &["type", "docref"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RequirementKind {
    Requirement,
    FunctionalRequirement,
    InterfaceRequirement,
    PerformanceRequirement,
    PhysicalRequirement,
    DesignConstraint,
}

impl RequirementKind {
    fn from_keyword(kw: &str) -> Option<Self> {
        Some(match kw.to_ascii_lowercase().as_str() {
            "requirement" => Self::Requirement,
            "functionalrequirement" => Self::FunctionalRequirement,
            "interfacerequirement" => Self::InterfaceRequirement,
            "performancerequirement" => Self::PerformanceRequirement,
            "physicalrequirement" => Self::PhysicalRequirement,
            "designconstraint" => Self::DesignConstraint,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Risk {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum VerifyMethod {
    Analysis,
    Inspection,
    Test,
    Demonstration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationshipType {
    Contains,
    Copies,
    Derives,
    Satisfies,
    Verifies,
    Refines,
    Traces,
}

impl RelationshipType {
    fn parse(raw: &str) -> Option<Self> {
        Some(match raw.to_ascii_lowercase().as_str() {
            "contains" => Self::Contains,
            "copies" => Self::Copies,
            "derives" => Self::Derives,
            "satisfies" => Self::Satisfies,
            "verifies" => Self::Verifies,
            "refines" => Self::Refines,
            "traces" => Self::Traces,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementModel {
    pub direction: Option<String>,
    pub requirements: Vec<Requirement>,
    pub elements: Vec<Element>,
    pub relationships: Vec<Relationship>,
    pub class_defs: IndexMap<String, Vec<String>>,
    pub acc: Accessibility,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    pub name: String,
    pub kind: RequirementKind,
    pub requirement_id: String,
    pub text: String,
    pub risk: Option<Risk>,
    pub verify_method: Option<VerifyMethod>,
    pub classes: Vec<String>,
    pub styles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub name: String,
    pub element_type: String,
    pub doc_ref: String,
    pub classes: Vec<String>,
    pub styles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub kind: RelationshipType,
    pub src: String,
    pub dst: String,
}

impl RequirementModel {
    pub fn requirement(&self, name: &str) -> Option<&Requirement> {
        self.requirements.iter().find(|r| r.name == name)
    }

    pub fn element(&self, name: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.name == name)
    }

    pub fn relationships_from<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Relationship> + 'a {
        self.relationships.iter().filter(move |r| r.src == name)
    }

    pub fn relationships_to<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Relationship> + 'a {
        self.relationships.iter().filter(move |r| r.dst == name)
    }
}

impl Model for RequirementModel {
    fn entity_ids(&self) -> Vec<&str> {
        self.requirements
            .iter()
            .map(|r| r.name.as_str())
            .chain(self.elements.iter().map(|e| e.name.as_str()))
            .collect()
    }

    fn relation_endpoints(&self) -> Vec<(&str, &str)> {
        self.relationships
            .iter()
            .map(|r| (r.src.as_str(), r.dst.as_str()))
            .collect()
    }
}

pub fn parse(text: &str, config: &Config) -> Result<RequirementModel> {
    let doc = parse_document(text)?;
    super::canonicalized(NOTATION, transform(&doc, config))
}

pub fn parse_document(text: &str) -> std::result::Result<Document<'_>, GrammarError> {
    grammar::parse_document(NOTATION, text, header(HEADERS), statement, STATEMENTS)
}

fn statement<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    alt((
        accessibility,
        direction_statement,
        class_def,
        class_assign,
        style,
        requirement,
        element,
        relationship,
    ))
    .parse_next(input)
}

fn node_name<'a>(input: &mut Input<'a>) -> PResult<Token<'a>> {
    alt((spanned(quoted), spanned(name)))
        .context(expected("requirement or element name"))
        .parse_next(input)
}

fn requirement_keyword<'a>(input: &mut Input<'a>) -> PResult<&'a str> {
    alt((
        keyword_ci("functionalRequirement"),
        keyword_ci("interfaceRequirement"),
        keyword_ci("performanceRequirement"),
        keyword_ci("physicalRequirement"),
        keyword_ci("designConstraint"),
        keyword_ci("requirement"),
    ))
    .parse_next(input)
}

/// `requirement name[:::cls] { id: 1; text: …; risk: …; verifymethod: … }`
fn requirement<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let kind = spanned(requirement_keyword).parse_next(input)?;
    hspace1.parse_next(input)?;
    let (name, classes, fields) = cut_err(definition_body(REQUIREMENT_FIELDS)).parse_next(input)?;
    Ok(Record::new("requirement", span_from(input, start))
        .with("kind", kind)
        .with("name", name)
        .with("classes", classes)
        .with("fields", fields))
}

/// `element name[:::cls] { type: …; docref: … }`
fn element<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword_ci("element").parse_next(input)?;
    hspace1.parse_next(input)?;
    let (name, classes, fields) = cut_err(definition_body(ELEMENT_FIELDS)).parse_next(input)?;
    Ok(Record::new("element", span_from(input, start))
        .with("name", name)
        .with("classes", classes)
        .with("fields", fields))
}

type Definition<'a> = (Token<'a>, Vec<Cst<'a>>, Vec<Cst<'a>>);

fn definition_body<'a>(
    fields: &'static [&'static str],
) -> impl Parser<Input<'a>, Definition<'a>, ErrMode<ContextError>> {
    move |input: &mut Input<'a>| {
        let name = node_name.parse_next(input)?;
        let classes = opt(preceded(symbol(":::"), class_names))
            .map(Option::unwrap_or_default)
            .parse_next(input)?;
        hspace0.parse_next(input)?;
        punct('{').parse_next(input)?;
        eol.parse_next(input)?;
        let body = statements(field, &["}"], fields).parse_next(input)?;
        close_block("}").parse_next(input)?;
        Ok((name, classes, body))
    }
}

/// `key: value` inside a definition body.
fn field<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let key = spanned(identifier).parse_next(input)?;
    hspace0.parse_next(input)?;
    punct(':').parse_next(input)?;
    hspace0.parse_next(input)?;
    let value = cut_err(alt((
        spanned(quoted),
        spanned(text_to_eol.map(strip_terminator)),
    )))
    .parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("field", span_from(input, start))
        .with("key", key)
        .with("value", value))
}

/// `a - satisfies -> b` or `b <- satisfies - a`
fn relationship<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let left = node_name.parse_next(input)?;
    hspace1.parse_next(input)?;
    let (reverse, kind) = alt((
        (symbol("<-"), hspace0, spanned(identifier), hspace0, punct('-'))
            .map(|(_, _, kind, _, _)| (true, kind)),
        (punct('-'), hspace0, spanned(identifier), hspace0, symbol("->"))
            .map(|(_, _, kind, _, _)| (false, kind)),
    ))
    .parse_next(input)?;
    hspace0.parse_next(input)?;
    let right = cut_err(node_name).parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    let (src, dst) = if reverse { (right, left) } else { (left, right) };
    Ok(Record::new("relationship", span_from(input, start))
        .with("kind", kind)
        .with("src", src)
        .with("dst", dst))
}

fn class_names<'a>(input: &mut Input<'a>) -> PResult<Vec<Cst<'a>>> {
    separated(1.., spanned(identifier), (hspace0, punct(','), hspace0))
        .map(|names: Vec<Token<'a>>| names.into_iter().map(Cst::Token).collect())
        .parse_next(input)
}

fn name_list<'a>(input: &mut Input<'a>) -> PResult<Vec<Cst<'a>>> {
    separated(1.., node_name, (hspace0, punct(','), hspace0))
        .map(|names: Vec<Token<'a>>| names.into_iter().map(Cst::Token).collect())
        .parse_next(input)
}

fn class_def<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
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

fn class_assign<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("class").parse_next(input)?;
    hspace1.parse_next(input)?;
    let targets = cut_err(name_list).parse_next(input)?;
    hspace1.parse_next(input)?;
    let classes = cut_err(class_names).parse_next(input)?;
    eol.parse_next(input)?;
    Ok(Record::new("class", span_from(input, start))
        .with("targets", targets)
        .with("classes", classes))
}

fn style<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("style").parse_next(input)?;
    hspace1.parse_next(input)?;
    let targets = cut_err(name_list).parse_next(input)?;
    hspace1.parse_next(input)?;
    let styles = spanned(text_to_eol).parse_next(input)?;
    eol.parse_next(input)?;
    Ok(Record::new("style", span_from(input, start))
        .with("targets", targets)
        .with("styles", styles))
}

fn split_styles(raw: &str) -> Vec<String> {
    raw.trim_end_matches(';')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_risk(raw: &str) -> Option<Risk> {
    Some(match raw.to_ascii_lowercase().as_str() {
        "low" => Risk::Low,
        "medium" => Risk::Medium,
        "high" => Risk::High,
        _ => return None,
    })
}

fn parse_verify_method(raw: &str) -> Option<VerifyMethod> {
    Some(match raw.to_ascii_lowercase().as_str() {
        "analysis" => VerifyMethod::Analysis,
        "inspection" => VerifyMethod::Inspection,
        "test" => VerifyMethod::Test,
        "demonstration" => VerifyMethod::Demonstration,
        _ => return None,
    })
}

#[derive(Default)]
struct Builder {
    requirements: IndexMap<String, Requirement>,
    elements: IndexMap<String, Element>,
}

impl Builder {
    fn add_classes(&mut self, target: &str, classes: &[String]) -> bool {
        if let Some(r) = self.requirements.get_mut(target) {
            merge_unique(&mut r.classes, classes.iter().cloned());
        } else if let Some(e) = self.elements.get_mut(target) {
            merge_unique(&mut e.classes, classes.iter().cloned());
        } else {
            return false;
        }
        true
    }

    fn add_styles(&mut self, target: &str, styles: &[String]) -> bool {
        if let Some(r) = self.requirements.get_mut(target) {
            r.styles.extend(styles.iter().cloned());
        } else if let Some(e) = self.elements.get_mut(target) {
            e.styles.extend(styles.iter().cloned());
        } else {
            return false;
        }
        true
    }
}

pub fn transform(doc: &Document<'_>, _config: &Config) -> CanonResult<RequirementModel> {
    let mut model = RequirementModel::default();
    let mut builder = Builder::default();

    for stmt in doc.statements() {
        if apply_accessibility(&mut model.acc, stmt) {
            continue;
        }
        match stmt.kind {
            "direction" => model.direction = stmt.text("value").map(str::to_string),
            "requirement" => {
                let raw_kind = stmt.require_text("kind")?;
                let kind = RequirementKind::from_keyword(raw_kind).ok_or_else(|| {
                    doc.invalid(stmt, format!("unknown requirement type `{raw_kind}`"))
                })?;
                let name = stmt.require_text("name")?;
                let req = builder
                    .requirements
                    .entry(name.to_string())
                    .or_insert_with(|| Requirement {
                        name: name.to_string(),
                        kind,
                        requirement_id: String::new(),
                        text: String::new(),
                        risk: None,
                        verify_method: None,
                        classes: Vec::new(),
                        styles: Vec::new(),
                    });
                req.kind = kind;
                merge_unique(&mut req.classes, stmt.texts("classes"));
                for field in stmt.records("fields") {
                    let key = field.require_text("key")?;
                    let value = field.text("value").unwrap_or_default();
                    match key.to_ascii_lowercase().as_str() {
                        "id" => merge_text(&mut req.requirement_id, Some(value)),
                        "text" => merge_text(&mut req.text, Some(value)),
                        "risk" => {
                            let risk = parse_risk(value).ok_or_else(|| {
                                doc.invalid(field, format!("invalid risk level `{value}`"))
                            })?;
                            req.risk = Some(risk);
                        }
                        "verifymethod" => {
                            let method = parse_verify_method(value).ok_or_else(|| {
                                doc.invalid(field, format!("invalid verify method `{value}`"))
                            })?;
                            req.verify_method = Some(method);
                        }
                        _ => {
                            return Err(doc.invalid(
                                field,
                                format!("unexpected requirement field `{key}`"),
                            ));
                        }
                    }
                }
            }
            "element" => {
                let name = stmt.require_text("name")?;
                let element = builder
                    .elements
                    .entry(name.to_string())
                    .or_insert_with(|| Element {
                        name: name.to_string(),
                        element_type: String::new(),
                        doc_ref: String::new(),
                        classes: Vec::new(),
                        styles: Vec::new(),
                    });
                merge_unique(&mut element.classes, stmt.texts("classes"));
                for field in stmt.records("fields") {
                    let key = field.require_text("key")?;
                    let value = field.text("value");
                    match key.to_ascii_lowercase().as_str() {
                        "type" => merge_text(&mut element.element_type, value),
                        "docref" => merge_text(&mut element.doc_ref, value),
                        _ => {
                            return Err(doc.invalid(
                                field,
                                format!("unexpected element field `{key}`"),
                            ));
                        }
                    }
                }
            }
            "relationship" => {
                let raw = stmt.require_text("kind")?;
                let kind = RelationshipType::parse(raw).ok_or_else(|| {
                    doc.invalid(stmt, format!("unknown relationship type `{raw}`"))
                })?;
                model.relationships.push(Relationship {
                    kind,
                    src: stmt.require_text("src")?.to_string(),
                    dst: stmt.require_text("dst")?.to_string(),
                });
            }
            "classDef" => {
                let styles = split_styles(stmt.text("styles").unwrap_or_default());
                for name in stmt.texts("names") {
                    model.class_defs.insert(name.to_string(), styles.clone());
                }
            }
            "class" => {
                let classes: Vec<String> = stmt.texts("classes").map(str::to_string).collect();
                for target in stmt.texts("targets") {
                    if !builder.add_classes(target, &classes) {
                        return Err(doc.invalid(stmt, format!("unknown class target `{target}`")));
                    }
                }
            }
            "style" => {
                let styles = split_styles(stmt.text("styles").unwrap_or_default());
                for target in stmt.texts("targets") {
                    if !builder.add_styles(target, &styles) {
                        return Err(doc.invalid(stmt, format!("unknown style target `{target}`")));
                    }
                }
            }
            _ => {}
        }
    }

    model.requirements = builder.requirements.into_values().collect();
    model.elements = builder.elements.into_values().collect();
    tracing::debug!(
        requirements = model.requirements.len(),
        elements = model.elements.len(),
        relationships = model.relationships.len(),
        "requirement canonicalized"
    );
    Ok(model)
}

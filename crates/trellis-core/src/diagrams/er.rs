use indexmap::IndexMap;
use serde::Serialize;
use winnow::ascii::Caseless;
use winnow::combinator::{alt, cut_err, delimited, not, opt, peek, preceded, repeat, separated};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::stream::{Location, Stream};
use winnow::token::{literal, one_of, take_while};

use crate::canon::{Entity, EntityRegistry, apply_accessibility, merge_opt, merge_text, merge_unique};
use crate::config::Config;
use crate::cst::{Cst, Document, Record, Token};
use crate::error::{CanonResult, GrammarError, Result};
use crate::grammar::{self, accessibility, direction_statement, header, span_from};
use crate::lex::{
    Input, PResult, eol, expected, hspace0, hspace1, identifier, is_ident_char, keyword,
    multiline_space, punct, quoted, spanned, text_to_eol,
};
use crate::model::{Accessibility, Model};

pub const NOTATION: &str = "er";
pub const HEADERS: &[&str] = &["erDiagram"];
const STATEMENTS: &[&str] = &[
    "entity",
    "relationship",
    "classDef",
    "class",
    "style",
    "direction",
    "accTitle",
    "accDescr",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    One,
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
}

impl Cardinality {
    /// Two-character crow's-foot marker, read on either side of the line.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "||" => Self::One,
            "|o" | "o|" => Self::ZeroOrOne,
            "}o" | "o{" => Self::ZeroOrMore,
            "}|" | "|{" => Self::OneOrMore,
            _ => return None,
        })
    }

    pub fn from_words(words: &str) -> Option<Self> {
        let lower = words.to_ascii_lowercase();
        let normalized = lower.split_whitespace().collect::<Vec<_>>().join(" ");
        Some(match normalized.as_str() {
            "only one" | "one" | "1" => Self::One,
            "zero or one" | "one or zero" => Self::ZeroOrOne,
            "zero or more" | "zero or many" | "many(0)" | "0+" | "many" => Self::ZeroOrMore,
            "one or more" | "one or many" | "many(1)" | "1+" => Self::OneOrMore,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    Identifying,
    NonIdentifying,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErModel {
    pub direction: Option<String>,
    pub entities: Vec<ErEntity>,
    pub relationships: Vec<ErRelationship>,
    pub class_defs: IndexMap<String, Vec<String>>,
    pub acc: Accessibility,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErEntity {
    pub id: String,
    pub label: String,
    pub alias: Option<String>,
    pub attributes: Vec<ErAttribute>,
    pub classes: Vec<String>,
    pub styles: Vec<String>,
}

impl Entity for ErEntity {
    fn implicit(id: &str) -> Self {
        Self {
            id: id.to_string(),
            label: id.to_string(),
            alias: None,
            attributes: Vec::new(),
            classes: Vec::new(),
            styles: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErAttribute {
    pub data_type: String,
    pub name: String,
    pub keys: Vec<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErRelationship {
    pub from: String,
    pub to: String,
    pub cardinality_from: Cardinality,
    pub cardinality_to: Cardinality,
    pub kind: RelationshipKind,
    pub label: String,
}

impl ErModel {
    pub fn entity(&self, id: &str) -> Option<&ErEntity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn relationships_from<'a>(
        &'a self,
        id: &'a str,
    ) -> impl Iterator<Item = &'a ErRelationship> + 'a {
        self.relationships.iter().filter(move |r| r.from == id)
    }

    pub fn relationships_to<'a>(
        &'a self,
        id: &'a str,
    ) -> impl Iterator<Item = &'a ErRelationship> + 'a {
        self.relationships.iter().filter(move |r| r.to == id)
    }
}

impl Model for ErModel {
    fn entity_ids(&self) -> Vec<&str> {
        self.entities.iter().map(|e| e.id.as_str()).collect()
    }

    fn relation_endpoints(&self) -> Vec<(&str, &str)> {
        self.relationships
            .iter()
            .map(|r| (r.from.as_str(), r.to.as_str()))
            .collect()
    }
}

pub fn parse(text: &str, config: &Config) -> Result<ErModel> {
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
        relationship,
        word_relationship,
        entity,
    ))
    .parse_next(input)
}

/// Entity names: word characters, with `-` allowed inside a name but never as the start of a
/// `--`/`-.` line.
fn entity_name<'a>(input: &mut Input<'a>) -> PResult<Token<'a>> {
    alt((
        spanned(quoted).verify(|t: &Token<'a>| !t.text.is_empty()),
        spanned(
            (
                take_while(1.., |c: char| c.is_alphanumeric() || c == '_'),
                repeat(
                    0..,
                    alt((
                        take_while(1.., |c: char| c.is_alphanumeric() || c == '_').void(),
                        ('-', peek(one_of(is_ident_char))).void(),
                    )),
                )
                .map(|()| ()),
            )
                .take(),
        ),
    ))
    .context(expected("entity name"))
    .parse_next(input)
}

fn cardinality_symbol<'a>(input: &mut Input<'a>) -> PResult<Token<'a>> {
    spanned((one_of(['|', 'o', '}', '{']), one_of(['|', 'o', '}', '{'])).take())
        .context(expected("cardinality"))
        .parse_next(input)
}

/// `A ||--o{ B [: label]`
fn relationship<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let from = entity_name.parse_next(input)?;
    hspace0.parse_next(input)?;
    let card_from = cardinality_symbol.parse_next(input)?;
    let line = spanned(alt(("--", "..", ".-", "-.")))
        .context(expected("`--` or `..`"))
        .parse_next(input)?;
    let card_to = cut_err(cardinality_symbol).parse_next(input)?;
    hspace0.parse_next(input)?;
    let to = cut_err(entity_name).parse_next(input)?;
    let label = relationship_label.parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("relationship", span_from(input, start))
        .with("from", from)
        .with("cardFrom", card_from)
        .with("line", line)
        .with("cardTo", card_to)
        .with("to", to)
        .with_opt("label", label))
}

const CARDINALITY_WORDS: &[&str] = &[
    "zero or more",
    "zero or many",
    "zero or one",
    "one or more",
    "one or many",
    "one or zero",
    "only one",
    "many(0)",
    "many(1)",
    "many",
    "one",
    "0+",
    "1+",
    "1",
];

fn cardinality_words<'a>(input: &mut Input<'a>) -> PResult<Token<'a>> {
    let start = input.current_token_start();
    for words in CARDINALITY_WORDS {
        let checkpoint = input.checkpoint();
        if terminated_word(words).parse_next(input).is_ok() {
            return Ok(Token::new(*words, span_from(input, start)));
        }
        input.reset(&checkpoint);
    }
    Err(ErrMode::Backtrack(ContextError::new()))
}

fn terminated_word<'a>(words: &'static str) -> impl Parser<Input<'a>, &'a str, ErrMode<ContextError>> {
    (literal(Caseless(words)), peek(hspace1)).map(|(w, _)| w)
}

/// `A only one to zero or more B [: label]`
fn word_relationship<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let from = entity_name.parse_next(input)?;
    hspace1.parse_next(input)?;
    let card_from = cardinality_words.parse_next(input)?;
    hspace1.parse_next(input)?;
    let line = spanned(alt((
        (keyword("optionally"), hspace1, keyword("to")).take(),
        keyword("to"),
    )))
    .parse_next(input)?;
    hspace1.parse_next(input)?;
    let card_to = cut_err(cardinality_words).parse_next(input)?;
    hspace1.parse_next(input)?;
    let to = cut_err(entity_name).parse_next(input)?;
    let label = relationship_label.parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("relationship", span_from(input, start))
        .with("from", from)
        .with("cardFrom", card_from)
        .with("line", line)
        .with("cardTo", card_to)
        .with("to", to)
        .with_opt("label", label))
}

fn relationship_label<'a>(input: &mut Input<'a>) -> PResult<Option<Token<'a>>> {
    opt(preceded(
        (hspace0, punct(':'), hspace0),
        alt((spanned(quoted), spanned(text_to_eol))),
    ))
    .parse_next(input)
}

/// `NAME["alias"][:::class] [{ attributes }]`
fn entity<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let name = entity_name.parse_next(input)?;
    let alias = opt(delimited(
        punct('['),
        cut_err(alt((spanned(quoted), spanned(take_while(1.., |c: char| !matches!(c, ']' | '\n')))))),
        cut_err(punct(']')),
    ))
    .parse_next(input)?;
    let classes = opt(preceded(":::", class_names)).parse_next(input)?;
    hspace0.parse_next(input)?;
    let attributes = opt(attribute_block).parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("entity", span_from(input, start))
        .with("name", name)
        .with_opt("alias", alias)
        .with_opt("classes", classes)
        .with_opt("attributes", attributes))
}

fn class_names<'a>(input: &mut Input<'a>) -> PResult<Vec<Cst<'a>>> {
    separated(1.., spanned(identifier), (hspace0, punct(','), hspace0))
        .map(|names: Vec<Token<'a>>| names.into_iter().map(Cst::Token).collect())
        .parse_next(input)
}

fn attribute_block<'a>(input: &mut Input<'a>) -> PResult<Vec<Cst<'a>>> {
    punct('{').parse_next(input)?;
    let mut attributes = Vec::new();
    loop {
        multiline_space.parse_next(input)?;
        if opt(punct('}')).parse_next(input)?.is_some() {
            return Ok(attributes);
        }
        let attr = cut_err(attribute).parse_next(input)?;
        attributes.push(Cst::Record(attr));
    }
}

/// `type name [PK, FK] ["comment"]`
fn attribute<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let attr_word = || {
        spanned(take_while(1.., |c: char| {
            c.is_alphanumeric() || matches!(c, '_' | '-' | '(' | ')' | '[' | ']' | '*' | ',')
        }))
    };
    let data_type = attr_word().context(expected("attribute type")).parse_next(input)?;
    hspace1.parse_next(input)?;
    let name = attr_word()
        .verify(|t: &Token<'a>| !t.text.ends_with(','))
        .context(expected("attribute name"))
        .parse_next(input)?;
    let keys = opt(preceded(
        hspace1,
        separated(
            1..,
            spanned(alt((keyword("PK"), keyword("FK"), keyword("UK")))),
            (hspace0, punct(','), hspace0),
        ),
    ))
    .map(|keys: Option<Vec<Token<'a>>>| {
        keys.unwrap_or_default()
            .into_iter()
            .map(Cst::Token)
            .collect::<Vec<_>>()
    })
    .parse_next(input)?;
    let comment = opt(preceded(hspace1, spanned(quoted))).parse_next(input)?;
    hspace0.parse_next(input)?;
    let end: PResult<()> = not(one_of(|c: char| !matches!(c, '\n' | '\r' | '}' | ';' | '%')))
        .context(expected("end of attribute"))
        .parse_next(input);
    end?;
    Ok(Record::new("attribute", span_from(input, start))
        .with("type", data_type)
        .with("name", name)
        .with("keys", keys)
        .with_opt("comment", comment))
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

/// `class A,B cls1,cls2`
fn class_assign<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("class").parse_next(input)?;
    hspace1.parse_next(input)?;
    let entities = cut_err(entity_list).parse_next(input)?;
    hspace1.parse_next(input)?;
    let classes = cut_err(class_names).parse_next(input)?;
    eol.parse_next(input)?;
    Ok(Record::new("class", span_from(input, start))
        .with("entities", entities)
        .with("classes", classes))
}

/// `style A,B fill:#f9f,stroke:#333`
fn style<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("style").parse_next(input)?;
    hspace1.parse_next(input)?;
    let entities = cut_err(entity_list).parse_next(input)?;
    hspace1.parse_next(input)?;
    let styles = spanned(text_to_eol).parse_next(input)?;
    eol.parse_next(input)?;
    Ok(Record::new("style", span_from(input, start))
        .with("entities", entities)
        .with("styles", styles))
}

fn entity_list<'a>(input: &mut Input<'a>) -> PResult<Vec<Cst<'a>>> {
    separated(1.., entity_name, (hspace0, punct(','), hspace0))
        .map(|names: Vec<Token<'a>>| names.into_iter().map(Cst::Token).collect())
        .parse_next(input)
}

fn split_styles(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn transform(doc: &Document<'_>, _config: &Config) -> CanonResult<ErModel> {
    let mut entities: EntityRegistry<ErEntity> = EntityRegistry::new();
    let mut model = ErModel::default();

    for stmt in doc.statements() {
        if apply_accessibility(&mut model.acc, stmt) {
            continue;
        }
        match stmt.kind {
            "direction" => model.direction = stmt.text("value").map(str::to_string),
            "entity" => {
                let entity = entities.find_or_create(stmt.require_text("name")?);
                let alias = stmt.non_empty_text("alias");
                merge_opt(&mut entity.alias, alias.map(str::to_string));
                merge_text(&mut entity.label, alias);
                merge_unique(&mut entity.classes, stmt.texts("classes"));
                for attr in stmt.records("attributes") {
                    entity.attributes.push(ErAttribute {
                        data_type: attr.require_text("type")?.to_string(),
                        name: attr.require_text("name")?.to_string(),
                        keys: attr.texts("keys").map(str::to_string).collect(),
                        comment: attr.non_empty_text("comment").map(str::to_string),
                    });
                }
            }
            "relationship" => {
                let rel = relationship_from(doc, stmt)?;
                entities.find_or_create(&rel.from);
                entities.find_or_create(&rel.to);
                tracing::trace!(from = %rel.from, to = %rel.to, "er relationship");
                model.relationships.push(rel);
            }
            "classDef" => {
                let styles = split_styles(stmt.text("styles").unwrap_or_default());
                for name in stmt.texts("names") {
                    model.class_defs.insert(name.to_string(), styles.clone());
                }
            }
            "class" => {
                for id in stmt.texts("entities") {
                    merge_unique(&mut entities.find_or_create(id).classes, stmt.texts("classes"));
                }
            }
            "style" => {
                let styles = split_styles(stmt.text("styles").unwrap_or_default());
                for id in stmt.texts("entities") {
                    entities.find_or_create(id).styles.extend(styles.iter().cloned());
                }
            }
            _ => {}
        }
    }

    model.entities = entities.into_vec();
    tracing::debug!(
        entities = model.entities.len(),
        relationships = model.relationships.len(),
        "er canonicalized"
    );
    Ok(model)
}

fn relationship_from(doc: &Document<'_>, stmt: &Record<'_>) -> CanonResult<ErRelationship> {
    let line = stmt.require_text("line")?;
    let symbolic = matches!(line, "--" | ".." | ".-" | "-.");
    let cardinality = |field: &'static str| -> CanonResult<Cardinality> {
        let raw = stmt.require_text(field)?;
        let parsed = if symbolic {
            Cardinality::from_symbol(raw)
        } else {
            Cardinality::from_words(raw)
        };
        parsed.ok_or_else(|| doc.invalid(stmt, format!("unknown cardinality `{raw}`")))
    };

    let kind = match line {
        "--" => RelationshipKind::NonIdentifying,
        ".." | ".-" | "-." => RelationshipKind::Identifying,
        words if words.to_ascii_lowercase().starts_with("optionally") => {
            RelationshipKind::Identifying
        }
        _ => RelationshipKind::NonIdentifying,
    };

    Ok(ErRelationship {
        from: stmt.require_text("from")?.to_string(),
        to: stmt.require_text("to")?.to_string(),
        cardinality_from: cardinality("cardFrom")?,
        cardinality_to: cardinality("cardTo")?,
        kind,
        label: stmt
            .non_empty_text("label")
            .unwrap_or_default()
            .to_string(),
    })
}

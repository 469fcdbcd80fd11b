use serde::Serialize;
use winnow::combinator::{alt, cut_err, delimited, repeat};
use winnow::prelude::*;
use winnow::stream::Location;
use winnow::token::{none_of, take_while};

use crate::canon::{Entity, EntityRegistry};
use crate::config::Config;
use crate::cst::{Document, Record};
use crate::error::{CanonResult, GrammarError, Result};
use crate::grammar::{self, header, span_from};
use crate::lex::{Input, PResult, eol, hspace0, punct, spanned};
use crate::model::Model;

pub const NOTATION: &str = "sankey";
pub const HEADERS: &[&str] = &["sankey-beta", "sankey"];
const STATEMENTS: &[&str] = &["source,target,value row"];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SankeyModel {
    pub nodes: Vec<SankeyNode>,
    pub links: Vec<SankeyLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SankeyNode {
    pub id: String,
    pub label: String,
}

impl Entity for SankeyNode {
    fn implicit(id: &str) -> Self {
        Self {
            id: id.to_string(),
            label: id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SankeyLink {
    pub source: String,
    pub target: String,
    pub value: f64,
}

impl SankeyModel {
    pub fn node(&self, id: &str) -> Option<&SankeyNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn links_from<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a SankeyLink> + 'a {
        self.links.iter().filter(move |l| l.source == id)
    }

    pub fn links_to<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a SankeyLink> + 'a {
        self.links.iter().filter(move |l| l.target == id)
    }
}

impl Model for SankeyModel {
    fn entity_ids(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    fn relation_endpoints(&self) -> Vec<(&str, &str)> {
        self.links
            .iter()
            .map(|l| (l.source.as_str(), l.target.as_str()))
            .collect()
    }
}

pub fn parse(text: &str, config: &Config) -> Result<SankeyModel> {
    let doc = parse_document(text)?;
    super::canonicalized(NOTATION, transform(&doc, config))
}

pub fn parse_document(text: &str) -> std::result::Result<Document<'_>, GrammarError> {
    grammar::parse_document(NOTATION, text, header(HEADERS), row, STATEMENTS)
}

fn row<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let source = spanned(field).parse_next(input)?;
    cut_err(punct(',')).parse_next(input)?;
    let target = cut_err(spanned(field)).parse_next(input)?;
    cut_err(punct(',')).parse_next(input)?;
    let value = cut_err(spanned(field)).parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("link", span_from(input, start))
        .with("source", source)
        .with("target", target)
        .with("value", value))
}

/// CSV field: `"…"` with `""` as an escaped quote, or bare text up to the next comma.
fn field(input: &mut Input<'_>) -> PResult<String> {
    hspace0.parse_next(input)?;
    let value: PResult<String> = alt((
        delimited(
            '"',
            repeat(0.., alt(("\"\"".value('"'), none_of(['"'])))).fold(String::new, |mut s, c| {
                s.push(c);
                s
            }),
            '"',
        ),
        take_while(1.., |c: char| !matches!(c, ',' | '\n' | '\r'))
            .map(|s: &str| s.trim().to_string()),
    ))
    .parse_next(input);
    let value = value?;
    hspace0.parse_next(input)?;
    Ok(value)
}

pub fn transform(doc: &Document<'_>, _config: &Config) -> CanonResult<SankeyModel> {
    let mut nodes: EntityRegistry<SankeyNode> = EntityRegistry::new();
    let mut links = Vec::new();

    for stmt in doc.statements() {
        if stmt.kind != "link" {
            continue;
        }
        let source = stmt.require_text("source")?;
        let target = stmt.require_text("target")?;
        let raw = stmt.require_text("value")?;
        let value: f64 = raw
            .parse()
            .map_err(|_| doc.invalid(stmt, format!("invalid flow value `{raw}`")))?;
        nodes.find_or_create(source);
        nodes.find_or_create(target);
        links.push(SankeyLink {
            source: source.to_string(),
            target: target.to_string(),
            value,
        });
    }

    tracing::debug!(nodes = nodes.len(), links = links.len(), "sankey canonicalized");
    Ok(SankeyModel {
        nodes: nodes.into_vec(),
        links,
    })
}

use serde::Serialize;
use winnow::combinator::{alt, cut_err, opt, preceded, separated};
use winnow::prelude::*;
use winnow::stream::Location;
use winnow::token::take_while;

use crate::canon::{ContextStack, apply_accessibility, merge_unique};
use crate::config::Config;
use crate::cst::{Cst, Document, Record, Token};
use crate::error::{CanonResult, GrammarError, Result};
use crate::grammar::{self, accessibility, header, span_from, title};
use crate::lex::{
    Input, PResult, eol, hspace0, hspace1, integer, keyword, label_until, punct, spanned,
    text_to_eol,
};
use crate::model::{Accessibility, Model};

pub const NOTATION: &str = "journey";
pub const HEADERS: &[&str] = &["journey"];
const STATEMENTS: &[&str] = &["title", "section", "task", "accTitle", "accDescr"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyModel {
    pub title: Option<String>,
    pub sections: Vec<String>,
    pub tasks: Vec<JourneyTask>,
    /// Every actor in first-seen order.
    pub actors: Vec<String>,
    pub acc: Accessibility,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyTask {
    pub id: String,
    pub name: String,
    pub section: Option<String>,
    pub score: u8,
    pub people: Vec<String>,
}

impl JourneyModel {
    pub fn task(&self, id: &str) -> Option<&JourneyTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn tasks_of<'a>(&'a self, actor: &'a str) -> impl Iterator<Item = &'a JourneyTask> + 'a {
        self.tasks
            .iter()
            .filter(move |t| t.people.iter().any(|p| p == actor))
    }
}

impl Model for JourneyModel {
    fn entity_ids(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .map(|t| t.id.as_str())
            .chain(self.actors.iter().map(String::as_str))
            .collect()
    }

    fn relation_endpoints(&self) -> Vec<(&str, &str)> {
        self.tasks
            .iter()
            .flat_map(|t| t.people.iter().map(move |p| (t.id.as_str(), p.as_str())))
            .collect()
    }

    fn group_refs(&self) -> Vec<(&str, &str)> {
        self.tasks
            .iter()
            .filter_map(|t| Some((t.id.as_str(), t.section.as_deref()?)))
            .collect()
    }

    fn group_ids(&self) -> Vec<&str> {
        self.sections.iter().map(String::as_str).collect()
    }
}

pub fn parse(text: &str, config: &Config) -> Result<JourneyModel> {
    let doc = parse_document(text)?;
    super::canonicalized(NOTATION, transform(&doc, config))
}

pub fn parse_document(text: &str) -> std::result::Result<Document<'_>, GrammarError> {
    grammar::parse_document(NOTATION, text, header(HEADERS), statement, STATEMENTS)
}

fn statement<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    alt((accessibility, title, section, task)).parse_next(input)
}

fn section<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("section").parse_next(input)?;
    hspace1.parse_next(input)?;
    let name = spanned(text_to_eol).parse_next(input)?;
    eol.parse_next(input)?;
    Ok(Record::new("section", span_from(input, start)).with("name", name))
}

/// `Task name: score[: actor, actor]`
fn task<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let name = spanned(label_until(":").map(str::trim))
        .verify(|t: &Token<'a>| !t.text.is_empty())
        .parse_next(input)?;
    punct(':').parse_next(input)?;
    hspace0.parse_next(input)?;
    let score = cut_err(spanned(integer.take())).parse_next(input)?;
    hspace0.parse_next(input)?;
    let people = opt(preceded((punct(':'), hspace0), actors))
        .map(Option::unwrap_or_default)
        .parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("task", span_from(input, start))
        .with("name", name)
        .with("score", score)
        .with("people", people))
}

fn actors<'a>(input: &mut Input<'a>) -> PResult<Vec<Cst<'a>>> {
    separated(
        1..,
        spanned(
            take_while(1.., |c: char| !matches!(c, ',' | '\n' | '\r' | ';' | '%')).map(str::trim),
        ),
        (hspace0, punct(','), hspace0),
    )
    .map(|people: Vec<Token<'a>>| people.into_iter().map(Cst::Token).collect())
    .parse_next(input)
}

pub fn transform(doc: &Document<'_>, _config: &Config) -> CanonResult<JourneyModel> {
    let mut model = JourneyModel::default();
    let mut sections: ContextStack<String> = ContextStack::new();

    for stmt in doc.statements() {
        if apply_accessibility(&mut model.acc, stmt) {
            continue;
        }
        match stmt.kind {
            "title" => model.title = stmt.non_empty_text("text").map(str::to_string),
            "section" => {
                let name = stmt.require_text("name")?.to_string();
                merge_unique(&mut model.sections, [name.as_str()]);
                sections.switch(name);
            }
            "task" => {
                let raw = stmt.require_text("score")?;
                let score = raw
                    .parse::<u8>()
                    .ok()
                    .filter(|s| (1..=5).contains(s))
                    .ok_or_else(|| {
                        doc.invalid(stmt, format!("task score must be between 1 and 5, got {raw}"))
                    })?;
                let people: Vec<String> = stmt
                    .texts("people")
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect();
                merge_unique(&mut model.actors, people.iter().cloned());
                model.tasks.push(JourneyTask {
                    id: format!("task{}", model.tasks.len()),
                    name: stmt.require_text("name")?.to_string(),
                    section: sections.current().cloned(),
                    score,
                    people,
                });
            }
            _ => {}
        }
    }

    tracing::debug!(
        tasks = model.tasks.len(),
        actors = model.actors.len(),
        "journey canonicalized"
    );
    Ok(model)
}

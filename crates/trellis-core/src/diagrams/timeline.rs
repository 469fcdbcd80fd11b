use serde::Serialize;
use winnow::ascii::line_ending;
use winnow::combinator::{alt, eof, not, opt, peek, preceded, repeat};
use winnow::prelude::*;
use winnow::stream::Location;
use winnow::token::none_of;

use crate::canon::{ContextStack, apply_accessibility};
use crate::config::Config;
use crate::cst::{Cst, Document, Record};
use crate::error::{CanonResult, GrammarError, Result};
use crate::grammar::{self, accessibility, header, span_from, title};
use crate::lex::{
    Input, PResult, eol, hspace0, hspace1, keyword, label_until, punct, spanned, text_to_eol,
};
use crate::model::{Accessibility, Model};

pub const NOTATION: &str = "timeline";
pub const HEADERS: &[&str] = &["timeline"];
const STATEMENTS: &[&str] = &["title", "section", "period", "`:` event", "accTitle", "accDescr"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineModel {
    pub title: Option<String>,
    pub sections: Vec<String>,
    pub periods: Vec<TimelinePeriod>,
    pub acc: Accessibility,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePeriod {
    pub id: String,
    pub label: String,
    pub section: Option<String>,
    pub events: Vec<String>,
}

impl TimelineModel {
    pub fn period(&self, id: &str) -> Option<&TimelinePeriod> {
        self.periods.iter().find(|p| p.id == id)
    }

    pub fn periods_in<'a>(&'a self, section: &'a str) -> impl Iterator<Item = &'a TimelinePeriod> + 'a {
        self.periods
            .iter()
            .filter(move |p| p.section.as_deref() == Some(section))
    }
}

impl Model for TimelineModel {
    fn entity_ids(&self) -> Vec<&str> {
        self.periods.iter().map(|p| p.id.as_str()).collect()
    }

    fn relation_endpoints(&self) -> Vec<(&str, &str)> {
        Vec::new()
    }

    fn group_refs(&self) -> Vec<(&str, &str)> {
        self.periods
            .iter()
            .filter_map(|p| Some((p.id.as_str(), p.section.as_deref()?)))
            .collect()
    }

    fn group_ids(&self) -> Vec<&str> {
        self.sections.iter().map(String::as_str).collect()
    }
}

pub fn parse(text: &str, config: &Config) -> Result<TimelineModel> {
    let doc = parse_document(text)?;
    super::canonicalized(NOTATION, transform(&doc, config))
}

pub fn parse_document(text: &str) -> std::result::Result<Document<'_>, GrammarError> {
    grammar::parse_document(NOTATION, text, header(HEADERS), statement, STATEMENTS)
}

fn statement<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    alt((accessibility, title, section, continuation, period)).parse_next(input)
}

fn section<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("section").parse_next(input)?;
    hspace1.parse_next(input)?;
    let name = spanned(text_to_eol).parse_next(input)?;
    eol.parse_next(input)?;
    Ok(Record::new("section", span_from(input, start)).with("name", name))
}

/// `: event [: event…]` continuing the previous period.
fn continuation<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let events = events.parse_next(input)?;
    eol.parse_next(input)?;
    Ok(Record::new("continuation", span_from(input, start)).with("events", events))
}

/// `period [: event…]`
fn period<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let label = spanned(label_until(":").map(str::trim))
        .verify(|t: &crate::cst::Token<'a>| !t.text.is_empty())
        .parse_next(input)?;
    let events = opt(events).map(Option::unwrap_or_default).parse_next(input)?;
    eol.parse_next(input)?;
    Ok(Record::new("period", span_from(input, start))
        .with("label", label)
        .with("events", events))
}

/// One or more `: text` segments. A colon only separates events when followed by whitespace
/// or the end of the line, so `10:30` stays inside an event.
fn events<'a>(input: &mut Input<'a>) -> PResult<Vec<Cst<'a>>> {
    repeat(1.., preceded((hspace0, punct(':'), hspace0), spanned(event_text)))
        .map(|tokens: Vec<_>| tokens.into_iter().map(Cst::Token).collect())
        .parse_next(input)
}

fn event_text<'a>(input: &mut Input<'a>) -> PResult<&'a str> {
    repeat(
        0..,
        preceded(
            not(alt((separator.void(), "%%".void()))),
            none_of(['\n', '\r']),
        ),
    )
    .map(|()| ())
    .take()
    .map(str::trim)
    .parse_next(input)
}

fn separator(input: &mut Input<'_>) -> PResult<()> {
    (
        hspace0,
        ':',
        alt((hspace1.void(), peek(line_ending).void(), eof.void())),
    )
        .void()
        .parse_next(input)
}

pub fn transform(doc: &Document<'_>, _config: &Config) -> CanonResult<TimelineModel> {
    let mut model = TimelineModel::default();
    let mut sections: ContextStack<String> = ContextStack::new();

    for stmt in doc.statements() {
        if apply_accessibility(&mut model.acc, stmt) {
            continue;
        }
        match stmt.kind {
            "title" => model.title = stmt.non_empty_text("text").map(str::to_string),
            "section" => {
                let name = stmt.require_text("name")?.to_string();
                if !model.sections.contains(&name) {
                    model.sections.push(name.clone());
                }
                sections.switch(name);
            }
            "period" => {
                let id = format!("period{}", model.periods.len());
                model.periods.push(TimelinePeriod {
                    id,
                    label: stmt.require_text("label")?.to_string(),
                    section: sections.current().cloned(),
                    events: event_list(stmt),
                });
            }
            "continuation" => {
                let Some(last) = model.periods.last_mut() else {
                    return Err(doc.invalid(stmt, "event continuation before any time period"));
                };
                last.events.extend(event_list(stmt));
            }
            _ => {}
        }
    }

    tracing::debug!(periods = model.periods.len(), "timeline canonicalized");
    Ok(model)
}

fn event_list(stmt: &Record<'_>) -> Vec<String> {
    stmt.texts("events")
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .collect()
}

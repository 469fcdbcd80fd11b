use indexmap::IndexMap;
use serde::Serialize;
use winnow::combinator::{alt, cut_err, opt, preceded};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::stream::Location;

use crate::canon::{apply_accessibility, rebuild_hierarchy};
use crate::config::Config;
use crate::cst::{Document, Record};
use crate::error::{CanonResult, GrammarError, Result};
use crate::grammar::{self, accessibility, header, span_from};
use crate::lex::{
    Input, PResult, eol, hspace0, label_until, label_until_any, punct, spanned, symbol,
    text_to_eol,
};
use crate::model::{Accessibility, Model};

pub const NOTATION: &str = "kanban";
pub const HEADERS: &[&str] = &["kanban"];
const STATEMENTS: &[&str] = &["column", "item", "`::icon(`", "`:::`", "accTitle", "accDescr"];
const PRIORITIES: &[&str] = &["Very High", "High", "Medium", "Low", "Very Low"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KanbanModel {
    pub columns: Vec<KanbanColumn>,
    pub items: Vec<KanbanItem>,
    pub acc: Accessibility,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KanbanColumn {
    pub id: String,
    pub label: String,
    pub icon: Option<String>,
    pub classes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KanbanItem {
    pub id: String,
    pub label: String,
    pub column: String,
    pub ticket: Option<String>,
    /// `kanban.ticketBaseUrl` with `#TICKET#` replaced by the ticket.
    pub ticket_url: Option<String>,
    pub assigned: Option<String>,
    pub priority: Option<String>,
    pub icon: Option<String>,
    pub classes: Vec<String>,
    /// Metadata keys other than the ones broken out above.
    pub metadata: IndexMap<String, String>,
}

impl KanbanModel {
    pub fn column(&self, id: &str) -> Option<&KanbanColumn> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn item(&self, id: &str) -> Option<&KanbanItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn items_in<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a KanbanItem> + 'a {
        self.items.iter().filter(move |i| i.column == column)
    }
}

impl Model for KanbanModel {
    fn entity_ids(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.id.as_str()).collect()
    }

    fn relation_endpoints(&self) -> Vec<(&str, &str)> {
        Vec::new()
    }

    fn group_refs(&self) -> Vec<(&str, &str)> {
        self.items
            .iter()
            .map(|i| (i.id.as_str(), i.column.as_str()))
            .collect()
    }

    fn group_ids(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.id.as_str()).collect()
    }
}

pub fn parse(text: &str, config: &Config) -> Result<KanbanModel> {
    let doc = parse_document(text)?;
    super::canonicalized(NOTATION, transform(&doc, config))
}

pub fn parse_document(text: &str) -> std::result::Result<Document<'_>, GrammarError> {
    grammar::parse_indented_document(NOTATION, text, header(HEADERS), line, STATEMENTS)
}

fn line<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let indent = spanned(hspace0).parse_next(input)?;
    let record = alt((accessibility, icon, classes, node)).parse_next(input)?;
    Ok(record.with("indent", indent))
}

fn icon<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    symbol("::icon(").parse_next(input)?;
    let name = cut_err(spanned(label_until(")").map(str::trim))).parse_next(input)?;
    cut_err(punct(')')).parse_next(input)?;
    eol.parse_next(input)?;
    Ok(Record::new("icon", span_from(input, start)).with("name", name))
}

fn classes<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    symbol(":::").parse_next(input)?;
    let names = spanned(text_to_eol).parse_next(input)?;
    eol.parse_next(input)?;
    Ok(Record::new("classes", span_from(input, start)).with("names", names))
}

/// `id`, `id[label]` or `[label]`, optionally followed by `@{ key: value, … }`.
fn node<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let id = opt(spanned(
        label_until_any(&["[", "@{", "%%"])
            .map(str::trim_end)
            .verify(|s: &str| !s.is_empty()),
    ))
    .parse_next(input)?;
    let label = opt(preceded(
        punct('['),
        cut_err((spanned(label_until("]")), punct(']'))).map(|(label, _)| label),
    ))
    .parse_next(input)?;
    if id.is_none() && label.is_none() {
        return Err(ErrMode::Backtrack(ContextError::new()));
    }
    hspace0.parse_next(input)?;
    let metadata = opt(preceded(
        symbol("@{"),
        cut_err((spanned(label_until("}")), punct('}'))).map(|(body, _)| body),
    ))
    .parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("node", span_from(input, start))
        .with_opt("id", id)
        .with_opt("label", label)
        .with_opt("metadata", metadata))
}

fn unquote(raw: &str) -> &str {
    let raw = raw.trim();
    raw.strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .unwrap_or(raw)
}

/// Parses the `@{ … }` body as a YAML flow mapping.
fn metadata(
    doc: &Document<'_>,
    stmt: &Record<'_>,
    body: &str,
) -> CanonResult<IndexMap<String, String>> {
    let value: serde_yaml::Value = serde_yaml::from_str(&format!("{{{body}}}"))
        .map_err(|err| doc.invalid(stmt, format!("invalid item metadata: {err}")))?;
    let serde_yaml::Value::Mapping(map) = value else {
        return Err(doc.invalid(stmt, "item metadata must be a mapping"));
    };
    let mut out = IndexMap::new();
    for (key, value) in map {
        let Some(key) = key.as_str() else {
            continue;
        };
        let value = match value {
            serde_yaml::Value::String(s) => s,
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::Bool(b) => b.to_string(),
            serde_yaml::Value::Null => continue,
            _ => return Err(doc.invalid(stmt, format!("metadata `{key}` must be a scalar"))),
        };
        out.insert(key.to_string(), value);
    }
    Ok(out)
}

struct Line<'r, 'a> {
    stmt: &'r Record<'a>,
    id: String,
    label: String,
    icon: Option<String>,
    classes: Vec<String>,
}

pub fn transform(doc: &Document<'_>, config: &Config) -> CanonResult<KanbanModel> {
    let mut model = KanbanModel::default();
    let mut lines: Vec<Line<'_, '_>> = Vec::new();
    let mut auto_id = 0usize;

    for stmt in doc.statements() {
        if apply_accessibility(&mut model.acc, stmt) {
            continue;
        }
        match stmt.kind {
            "node" => {
                let label = stmt.text("label").map(unquote);
                let id = match stmt.text("id").map(str::trim) {
                    Some(id) => id.to_string(),
                    None => {
                        auto_id += 1;
                        format!("kbn{auto_id}")
                    }
                };
                lines.push(Line {
                    stmt,
                    label: label.unwrap_or(&id).to_string(),
                    id,
                    icon: None,
                    classes: Vec::new(),
                });
            }
            "icon" | "classes" => {
                let last = lines.last_mut().ok_or_else(|| {
                    doc.invalid(stmt, "decoration before any kanban column or item")
                })?;
                if stmt.kind == "icon" {
                    last.icon = stmt.non_empty_text("name").map(str::to_string);
                } else {
                    last.classes.extend(
                        stmt.text("names")
                            .unwrap_or_default()
                            .split_whitespace()
                            .map(str::to_string),
                    );
                }
            }
            _ => {}
        }
    }

    let indents: Vec<usize> = lines
        .iter()
        .map(|l| l.stmt.text("indent").map_or(0, |s| s.chars().count()))
        .collect();
    let hierarchy = rebuild_hierarchy(&indents);
    let column_level = hierarchy.first().map_or(0, |h| h.level);
    let ticket_base = config.get_str("kanban.ticketBaseUrl");

    for (line, place) in lines.into_iter().zip(hierarchy) {
        if place.level < column_level {
            return Err(doc.invalid(
                line.stmt,
                format!("items without a column, found column `{}`", line.label),
            ));
        }
        if place.level == column_level {
            model.columns.push(KanbanColumn {
                id: line.id,
                label: line.label,
                icon: line.icon,
                classes: line.classes,
            });
            continue;
        }

        // Deeper nesting does not create sub-items; everything belongs to the column.
        let Some(column) = model.columns.last() else {
            return Err(doc.invalid(line.stmt, "kanban item before any column"));
        };
        let column = column.id.clone();
        let mut meta = match line.stmt.text("metadata") {
            Some(body) => metadata(doc, line.stmt, body)?,
            None => IndexMap::new(),
        };
        if let Some(priority) = meta.get("priority") {
            if !PRIORITIES.contains(&priority.as_str()) {
                return Err(doc.invalid(
                    line.stmt,
                    format!("unknown priority `{priority}`, expected one of {PRIORITIES:?}"),
                ));
            }
        }
        let label = meta.shift_remove("label").unwrap_or(line.label);
        let ticket = meta.shift_remove("ticket");
        let ticket_url = ticket
            .as_deref()
            .zip(ticket_base)
            .map(|(ticket, base)| base.replace("#TICKET#", ticket));
        let icon = meta.shift_remove("icon").or(line.icon);
        model.items.push(KanbanItem {
            id: line.id,
            label,
            column,
            ticket,
            ticket_url,
            assigned: meta.shift_remove("assigned"),
            priority: meta.shift_remove("priority"),
            icon,
            classes: line.classes,
            metadata: meta,
        });
    }

    tracing::debug!(
        columns = model.columns.len(),
        items = model.items.len(),
        "kanban canonicalized"
    );
    Ok(model)
}

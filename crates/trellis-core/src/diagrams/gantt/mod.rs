//! Gantt charts: settings, sections and tasks with dates resolved through chrono.

use chrono::{NaiveDateTime, TimeDelta};
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::canon::apply_accessibility;
use crate::config::Config;
use crate::cst::{Document, Record};
use crate::error::{CanonResult, CanonicalizationError, GrammarError, Position, Result};
use crate::grammar::header;
use crate::model::{Accessibility, Model};

pub mod date;
pub(crate) mod grammar;

use date::Calendar;

pub const NOTATION: &str = "gantt";
pub const HEADERS: &[&str] = &["gantt"];
const STATEMENTS: &[&str] = &[
    "task",
    "section",
    "dateFormat",
    "axisFormat",
    "tickInterval",
    "excludes",
    "includes",
    "todayMarker",
    "weekday",
    "inclusiveEndDates",
    "topAxis",
    "click",
    "title",
    "accTitle",
    "accDescr",
];

const DEFAULT_DATE_FORMAT: &str = "YYYY-MM-DD";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GanttModel {
    pub title: Option<String>,
    pub date_format: String,
    pub axis_format: Option<String>,
    pub tick_interval: Option<String>,
    pub today_marker: Option<String>,
    pub weekday: Option<String>,
    pub excludes: Vec<String>,
    pub includes: Vec<String>,
    pub inclusive_end_dates: bool,
    pub top_axis: bool,
    pub sections: Vec<String>,
    pub tasks: Vec<Task>,
    pub acc: Accessibility,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub name: String,
    pub section: Option<String>,
    pub active: bool,
    pub done: bool,
    pub crit: bool,
    pub milestone: bool,
    pub start_spec: TaskStart,
    pub end_spec: TaskEnd,
    /// `None` when the start cannot be resolved, e.g. under an unsupported `dateFormat`.
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub link: Option<String>,
    pub callback: Option<Callback>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TaskStart {
    /// Starts when the task written before it ends.
    Previous,
    After { ids: Vec<String> },
    Date { text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TaskEnd {
    Until { ids: Vec<String> },
    Date { text: String },
    Duration { text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Callback {
    pub name: String,
    pub args: Vec<String>,
}

impl TaskStart {
    fn references(&self) -> &[String] {
        match self {
            Self::After { ids } => ids,
            _ => &[],
        }
    }
}

impl TaskEnd {
    fn references(&self) -> &[String] {
        match self {
            Self::Until { ids } => ids,
            _ => &[],
        }
    }
}

impl GanttModel {
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn section_tasks<'a>(&'a self, section: &'a str) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks
            .iter()
            .filter(move |t| t.section.as_deref() == Some(section))
    }
}

impl Model for GanttModel {
    fn entity_ids(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.id.as_str()).collect()
    }

    /// One edge per `after`/`until` reference, from the referenced task to the dependent one.
    fn relation_endpoints(&self) -> Vec<(&str, &str)> {
        self.tasks
            .iter()
            .flat_map(|t| {
                t.start_spec
                    .references()
                    .iter()
                    .chain(t.end_spec.references())
                    .map(move |r| (r.as_str(), t.id.as_str()))
            })
            .collect()
    }
}

pub fn parse(text: &str, config: &Config) -> Result<GanttModel> {
    let doc = parse_document(text)?;
    super::canonicalized(NOTATION, transform(&doc, config))
}

pub fn parse_document(text: &str) -> std::result::Result<Document<'_>, GrammarError> {
    crate::grammar::parse_document(NOTATION, text, header(HEADERS), grammar::statement, STATEMENTS)
}

/// The fields of a task line after its leading tags are removed.
struct TaskData {
    active: bool,
    done: bool,
    crit: bool,
    milestone: bool,
    id: Option<String>,
    start: TaskStart,
    end: TaskEnd,
}

fn split_ids(list: &str) -> Vec<String> {
    list.split_whitespace().map(str::to_string).collect()
}

/// Splits `[tags,] [id,] [start,] end`.
fn task_data(raw: &str) -> std::result::Result<TaskData, String> {
    let mut items: Vec<&str> = raw.split(',').map(str::trim).collect();
    let mut data = TaskData {
        active: false,
        done: false,
        crit: false,
        milestone: false,
        id: None,
        start: TaskStart::Previous,
        end: TaskEnd::Duration {
            text: String::new(),
        },
    };
    while let Some(&tag) = items.first() {
        match tag {
            "active" => data.active = true,
            "done" => data.done = true,
            "crit" => data.crit = true,
            "milestone" => data.milestone = true,
            _ => break,
        }
        items.remove(0);
    }
    let (id, start, end) = match items.as_slice() {
        [end] => (None, None, *end),
        [start, end] => (None, Some(*start), *end),
        [id, start, end] => (Some(*id), Some(*start), *end),
        [] => return Err("task has no end or duration".to_string()),
        _ => return Err(format!("too many fields in task data `{raw}`")),
    };
    data.id = id.filter(|id| !id.is_empty()).map(str::to_string);
    if let Some(start) = start {
        data.start = match start.strip_prefix("after ") {
            Some(ids) => TaskStart::After { ids: split_ids(ids) },
            None => TaskStart::Date {
                text: start.to_string(),
            },
        };
    }
    data.end = match end.strip_prefix("until ") {
        Some(ids) => TaskEnd::Until { ids: split_ids(ids) },
        None if date::parse_duration(end).is_some() => TaskEnd::Duration {
            text: end.to_string(),
        },
        None => TaskEnd::Date {
            text: end.to_string(),
        },
    };
    Ok(data)
}

struct GanttBuilder {
    model: GanttModel,
    section: Option<String>,
    index: FxHashMap<String, usize>,
    /// Where each task was written, for reference errors raised after the walk.
    positions: Vec<Position>,
    task_count: usize,
}

impl GanttBuilder {
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
                "setting" => self.apply_setting(doc, stmt)?,
                "section" => {
                    let name = stmt.require_text("name")?.to_string();
                    if !self.model.sections.contains(&name) {
                        self.model.sections.push(name.clone());
                    }
                    self.section = Some(name);
                }
                "task" => self.apply_task(doc, stmt)?,
                "click" => self.apply_click(doc, stmt)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn apply_setting(&mut self, doc: &Document<'_>, stmt: &Record<'_>) -> CanonResult<()> {
        let key = stmt.require_text("key")?;
        let value = stmt.text("value").map(str::to_string);
        let list = || {
            stmt.text("value")
                .unwrap_or_default()
                .split([',', ' '])
                .map(|v| v.trim().to_ascii_lowercase())
                .filter(|v| !v.is_empty())
                .collect::<Vec<_>>()
        };
        match key {
            "dateFormat" => {
                let format = value.unwrap_or_default();
                if !date::is_supported(&format) {
                    tracing::warn!(format = %format, "dateFormat is not supported; task dates stay unresolved");
                }
                self.model.date_format = format;
            }
            "axisFormat" => self.model.axis_format = value,
            "tickInterval" => self.model.tick_interval = value,
            "todayMarker" => self.model.today_marker = value,
            "weekday" => self.model.weekday = value.map(|v| v.to_ascii_lowercase()),
            "excludes" => self.model.excludes.extend(list()),
            "includes" => self.model.includes.extend(list()),
            "inclusiveEndDates" => self.model.inclusive_end_dates = true,
            "topAxis" => self.model.top_axis = true,
            other => return Err(doc.invalid(stmt, format!("unknown setting `{other}`"))),
        }
        Ok(())
    }

    fn apply_task(&mut self, doc: &Document<'_>, stmt: &Record<'_>) -> CanonResult<()> {
        let name = stmt.require_text("name")?;
        let data = task_data(stmt.require_text("data")?).map_err(|msg| doc.invalid(stmt, msg))?;
        self.task_count += 1;
        let id = data
            .id
            .unwrap_or_else(|| format!("task{}", self.task_count));
        if self.index.contains_key(&id) {
            return Err(doc.invalid(stmt, format!("duplicate task id `{id}`")));
        }

        let supported = date::is_supported(&self.model.date_format);
        let fixed = |text: &str| -> CanonResult<Option<NaiveDateTime>> {
            if !supported {
                return Ok(None);
            }
            date::parse_date(&self.model.date_format, text)
                .map(Some)
                .ok_or_else(|| {
                    doc.invalid(
                        stmt,
                        format!("`{text}` does not match dateFormat `{}`", self.model.date_format),
                    )
                })
        };
        let start = match &data.start {
            TaskStart::Date { text } => fixed(text)?,
            _ => None,
        };
        let mut end = match &data.end {
            TaskEnd::Date { text } => fixed(text)?,
            _ => None,
        };
        if self.model.inclusive_end_dates {
            end = end
                .map(|e| {
                    e.checked_add_signed(TimeDelta::days(1))
                        .ok_or_else(|| doc.invalid(stmt, "inclusive end date is past the last supported date"))
                })
                .transpose()?;
        }

        self.index.insert(id.clone(), self.model.tasks.len());
        self.positions.push(doc.position_of(stmt));
        self.model.tasks.push(Task {
            id,
            name: name.to_string(),
            section: self.section.clone(),
            active: data.active,
            done: data.done,
            crit: data.crit,
            milestone: data.milestone,
            start_spec: data.start,
            end_spec: data.end,
            start,
            end,
            link: None,
            callback: None,
        });
        Ok(())
    }

    fn apply_click(&mut self, doc: &Document<'_>, stmt: &Record<'_>) -> CanonResult<()> {
        let callback = stmt.text("callback").map(|name| Callback {
            name: name.to_string(),
            args: stmt
                .text("args")
                .unwrap_or_default()
                .split(',')
                .map(|a| a.trim().trim_matches('"').to_string())
                .filter(|a| !a.is_empty())
                .collect(),
        });
        let href = stmt.text("href").map(str::to_string);
        for id in stmt.texts("ids") {
            let idx = *self
                .index
                .get(id)
                .ok_or_else(|| doc.invalid(stmt, format!("click on unknown task `{id}`")))?;
            let task = &mut self.model.tasks[idx];
            if callback.is_some() {
                task.callback = callback.clone();
            }
            if href.is_some() {
                task.link = href.clone();
            }
        }
        Ok(())
    }

    fn check_references(&self) -> CanonResult<()> {
        for (task, position) in self.model.tasks.iter().zip(&self.positions) {
            let refs = task.start_spec.references().iter().chain(task.end_spec.references());
            for r in refs {
                if !self.index.contains_key(r) {
                    return Err(CanonicalizationError::invalid_at(
                        format!("task `{}` refers to unknown task `{r}`", task.id),
                        *position,
                    ));
                }
            }
        }
        Ok(())
    }

    /// Fills in derived starts and ends until nothing changes, so references may point forward.
    fn resolve_dates(&mut self) -> CanonResult<()> {
        if !date::is_supported(&self.model.date_format) {
            return Ok(());
        }
        let model = &mut self.model;
        loop {
            let mut progressed = false;
            for i in 0..model.tasks.len() {
                if model.tasks[i].start.is_none() {
                    let start = match &model.tasks[i].start_spec {
                        TaskStart::Previous => i.checked_sub(1).and_then(|p| model.tasks[p].end),
                        TaskStart::After { ids } => ids
                            .iter()
                            .map(|r| self.index.get(r).and_then(|&at| model.tasks[at].end))
                            .collect::<Option<Vec<_>>>()
                            .and_then(|ends| ends.into_iter().max()),
                        TaskStart::Date { .. } => None,
                    };
                    if start.is_some() {
                        model.tasks[i].start = start;
                        progressed = true;
                    }
                }
                let Some(start) = model.tasks[i].start else {
                    continue;
                };
                if model.tasks[i].end.is_some() {
                    continue;
                }
                let end = match &model.tasks[i].end_spec {
                    TaskEnd::Until { ids } => ids
                        .iter()
                        .map(|r| self.index.get(r).and_then(|&at| model.tasks[at].start))
                        .collect::<Option<Vec<_>>>()
                        .and_then(|starts| starts.into_iter().min()),
                    TaskEnd::Duration { text } => match date::parse_duration(text) {
                        Some(d) => {
                            let calendar = Calendar {
                                excludes: &model.excludes,
                                includes: &model.includes,
                                date_format: &model.date_format,
                            };
                            let end = start
                                .checked_add_signed(d)
                                .and_then(|end| calendar.stretch(start, end))
                                .ok_or_else(|| {
                                    CanonicalizationError::invalid_at(
                                        format!(
                                            "task `{}` lasting `{text}` ends outside the supported date range",
                                            model.tasks[i].id
                                        ),
                                        self.positions[i],
                                    )
                                })?;
                            Some(end)
                        }
                        None => None,
                    },
                    TaskEnd::Date { .. } => None,
                };
                if end.is_some() {
                    model.tasks[i].end = end;
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }
        let unresolved = model.tasks.iter().filter(|t| t.end.is_none()).count();
        if unresolved > 0 {
            tracing::debug!(unresolved, "gantt tasks without resolvable dates");
        }
        Ok(())
    }
}

pub fn transform(doc: &Document<'_>, config: &Config) -> CanonResult<GanttModel> {
    let date_format = config
        .get_str("gantt.dateFormat")
        .unwrap_or(DEFAULT_DATE_FORMAT)
        .to_string();
    let mut builder = GanttBuilder {
        model: GanttModel {
            title: None,
            date_format,
            axis_format: None,
            tick_interval: None,
            today_marker: None,
            weekday: None,
            excludes: Vec::new(),
            includes: Vec::new(),
            inclusive_end_dates: false,
            top_axis: false,
            sections: Vec::new(),
            tasks: Vec::new(),
            acc: Accessibility::default(),
        },
        section: None,
        index: FxHashMap::default(),
        positions: Vec::new(),
        task_count: 0,
    };
    builder.walk(doc, doc.statements())?;
    builder.check_references()?;
    builder.resolve_dates()?;
    let model = builder.model;

    tracing::debug!(
        sections = model.sections.len(),
        tasks = model.tasks.len(),
        "gantt canonicalized"
    );
    Ok(model)
}

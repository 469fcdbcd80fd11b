//! State diagrams: states, composite states with concurrent regions, transitions and notes.

use indexmap::IndexMap;
use serde::Serialize;

use crate::canon::{ContextStack, Entity, EntityRegistry, apply_accessibility, merge_text, merge_unique};
use crate::config::Config;
use crate::cst::{Document, Record};
use crate::diagrams::flowchart::{normalize_direction, split_styles};
use crate::error::{CanonResult, GrammarError, Result};
use crate::grammar::header;
use crate::model::{Accessibility, Model};

pub(crate) mod grammar;

pub const NOTATION: &str = "state";
pub const HEADERS: &[&str] = &["stateDiagram-v2", "stateDiagram"];
const STATEMENTS: &[&str] = &[
    "state",
    "transition",
    "note",
    "--",
    "direction",
    "classDef",
    "class",
    "style",
    "accTitle",
    "accDescr",
];

/// Scope name used for `[*]` outside any composite state.
const ROOT: &str = "root";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StateKind {
    #[default]
    Default,
    Start,
    End,
    Fork,
    Join,
    Choice,
    Composite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NotePosition {
    LeftOf,
    RightOf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateModel {
    pub direction: String,
    pub states: Vec<StateNode>,
    pub transitions: Vec<Transition>,
    pub notes: Vec<StateNote>,
    pub class_defs: IndexMap<String, Vec<String>>,
    pub acc: Accessibility,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateNode {
    pub id: String,
    pub label: String,
    pub kind: StateKind,
    pub descriptions: Vec<String>,
    /// Enclosing composite state.
    pub parent: Option<String>,
    /// Concurrent region of the parent, counted from 0.
    pub region: usize,
    /// Number of concurrent regions; 0 for non-composite states.
    pub regions: usize,
    pub direction: Option<String>,
    pub classes: Vec<String>,
    pub styles: Vec<String>,
    /// False for states that only appear as transition endpoints or style targets.
    pub declared: bool,
}

impl Entity for StateNode {
    fn implicit(id: &str) -> Self {
        Self {
            id: id.to_string(),
            label: id.to_string(),
            kind: StateKind::Default,
            descriptions: Vec::new(),
            parent: None,
            region: 0,
            regions: 0,
            direction: None,
            classes: Vec::new(),
            styles: Vec::new(),
            declared: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    pub from: String,
    pub to: String,
    pub label: Option<String>,
    /// Composite state the transition was written in.
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateNote {
    pub target: String,
    pub position: NotePosition,
    pub text: String,
}

impl StateModel {
    pub fn state(&self, id: &str) -> Option<&StateNode> {
        self.states.iter().find(|s| s.id == id)
    }

    pub fn transitions_from<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Transition> + 'a {
        self.transitions.iter().filter(move |t| t.from == id)
    }

    pub fn children<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a StateNode> + 'a {
        self.states
            .iter()
            .filter(move |s| s.parent.as_deref() == Some(id))
    }
}

impl Model for StateModel {
    /// Only declared states count; a transition to a state never declared leaves the model invalid.
    fn entity_ids(&self) -> Vec<&str> {
        self.states
            .iter()
            .filter(|s| s.declared)
            .map(|s| s.id.as_str())
            .collect()
    }

    fn relation_endpoints(&self) -> Vec<(&str, &str)> {
        self.transitions
            .iter()
            .map(|t| (t.from.as_str(), t.to.as_str()))
            .collect()
    }

    fn group_refs(&self) -> Vec<(&str, &str)> {
        self.states
            .iter()
            .filter_map(|s| s.parent.as_deref().map(|p| (s.id.as_str(), p)))
            .collect()
    }

    fn group_ids(&self) -> Vec<&str> {
        self.states
            .iter()
            .filter(|s| s.kind == StateKind::Composite)
            .map(|s| s.id.as_str())
            .collect()
    }
}

pub fn parse(text: &str, config: &Config) -> Result<StateModel> {
    let doc = parse_document(text)?;
    super::canonicalized(NOTATION, transform(&doc, config))
}

pub fn parse_document(text: &str) -> std::result::Result<Document<'_>, GrammarError> {
    crate::grammar::parse_document(NOTATION, text, header(HEADERS), grammar::statement, STATEMENTS)
}

struct Scope {
    id: String,
    region: usize,
}

struct StateBuilder {
    model: StateModel,
    states: EntityRegistry<StateNode>,
    scopes: ContextStack<Scope>,
}

impl StateBuilder {
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
                    match self.scopes.current().map(|s| s.id.clone()) {
                        Some(id) => self.place(&id).direction = Some(dir.to_string()),
                        None => self.model.direction = dir.to_string(),
                    }
                }
                "state" => self.apply_state(doc, stmt)?,
                "description" => {
                    let id = stmt.require_text("id")?;
                    let state = self.place(id);
                    state.declared = true;
                    state.descriptions.push(stmt.text("text").unwrap_or_default().to_string());
                }
                "transition" => self.apply_transition(stmt)?,
                "note" => {
                    let target = stmt.require_text("target")?;
                    let position = if stmt.require_text("placement")?.starts_with("left") {
                        NotePosition::LeftOf
                    } else {
                        NotePosition::RightOf
                    };
                    self.place(target);
                    self.model.notes.push(StateNote {
                        target: target.to_string(),
                        position,
                        text: stmt.text("text").unwrap_or_default().to_string(),
                    });
                }
                "divider" => match self.scopes.current_mut() {
                    Some(scope) => scope.region += 1,
                    None => {
                        return Err(doc.invalid(stmt, "`--` is only allowed inside a composite state"));
                    }
                },
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

    /// Finds or creates a state, placing it in the current scope the first time it is seen.
    fn place(&mut self, id: &str) -> &mut StateNode {
        let fresh = !self.states.contains(id);
        let (parent, region) = match self.scopes.current() {
            Some(scope) => (Some(scope.id.clone()), scope.region),
            None => (None, 0),
        };
        let state = self.states.find_or_create(id);
        if fresh {
            state.parent = parent;
            state.region = region;
        }
        state
    }

    /// Resolves `[*]` to the start or end pseudo-state of the current scope.
    fn resolve(&mut self, reference: &str, as_source: bool) -> String {
        if reference != grammar::PSEUDO {
            return reference.to_string();
        }
        let scope = self
            .scopes
            .current()
            .map_or(ROOT, |s| s.id.as_str())
            .to_string();
        let (suffix, kind) = if as_source {
            ("start", StateKind::Start)
        } else {
            ("end", StateKind::End)
        };
        let id = format!("{scope}_{suffix}");
        let state = self.place(&id);
        state.kind = kind;
        state.declared = true;
        id
    }

    fn apply_state(&mut self, doc: &Document<'_>, stmt: &Record<'_>) -> CanonResult<()> {
        let id = stmt.require_text("id")?;
        let state = self.place(id);
        state.declared = true;
        merge_text(&mut state.label, stmt.non_empty_text("label"));
        if let Some(css) = stmt.text("css") {
            merge_unique(&mut state.classes, [css]);
        }
        if let Some(text) = stmt.non_empty_text("description") {
            state.descriptions.push(text.to_string());
        }
        if let Some(pseudo) = stmt.text("pseudo") {
            state.kind = match pseudo {
                "fork" => StateKind::Fork,
                "join" => StateKind::Join,
                "choice" => StateKind::Choice,
                other => return Err(doc.invalid(stmt, format!("unknown state type `{other}`"))),
            };
        }
        if stmt.has("body") {
            if state.kind != StateKind::Default && state.kind != StateKind::Composite {
                return Err(doc.invalid(stmt, format!("`{id}` cannot both be a pseudo-state and have a body")));
            }
            state.kind = StateKind::Composite;
            self.scopes.push(Scope {
                id: id.to_string(),
                region: 0,
            });
            let walked = self.walk(doc, stmt.records("body"));
            let regions = self.scopes.pop().map_or(1, |s| s.region + 1);
            walked?;
            if let Some(state) = self.states.get_mut(id) {
                state.regions = state.regions.max(regions);
            }
        }
        Ok(())
    }

    fn apply_transition(&mut self, stmt: &Record<'_>) -> CanonResult<()> {
        let from = self.resolve(stmt.require_text("from")?, true);
        let to = self.resolve(stmt.require_text("to")?, false);
        // Endpoints named only here stay undeclared.
        let source = self.place(&from);
        if let Some(css) = stmt.text("fromCss") {
            merge_unique(&mut source.classes, [css]);
        }
        let target = self.place(&to);
        if let Some(css) = stmt.text("toCss") {
            merge_unique(&mut target.classes, [css]);
        }
        self.model.transitions.push(Transition {
            from,
            to,
            label: stmt.non_empty_text("label").map(str::to_string),
            parent: self.scopes.current().map(|s| s.id.clone()),
        });
        Ok(())
    }
}

pub fn transform(doc: &Document<'_>, _config: &Config) -> CanonResult<StateModel> {
    let mut builder = StateBuilder {
        model: StateModel {
            direction: "TB".to_string(),
            states: Vec::new(),
            transitions: Vec::new(),
            notes: Vec::new(),
            class_defs: IndexMap::new(),
            acc: Accessibility::default(),
        },
        states: EntityRegistry::new(),
        scopes: ContextStack::new(),
    };
    builder.walk(doc, doc.statements())?;
    let mut model = builder.model;
    model.states = builder.states.into_vec();

    let undeclared = model.states.iter().filter(|s| !s.declared).count();
    if undeclared > 0 {
        tracing::debug!(undeclared, "transitions reference undeclared states");
    }
    tracing::debug!(
        states = model.states.len(),
        transitions = model.transitions.len(),
        "state canonicalized"
    );
    Ok(model)
}

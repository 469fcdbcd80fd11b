//! Sequence diagrams: participants, messages, activations, notes and nested fragments.

use serde::Serialize;

use crate::canon::{ActivationTracker, Entity, EntityRegistry, apply_accessibility, merge_text};
use crate::config::Config;
use crate::cst::{Document, Record};
use crate::error::{CanonResult, GrammarError, Result};
use crate::grammar::header;
use crate::model::{Accessibility, Model};

pub(crate) mod grammar;

pub const NOTATION: &str = "sequence";
pub const HEADERS: &[&str] = &["sequenceDiagram"];
const STATEMENTS: &[&str] = &[
    "participant",
    "actor",
    "message",
    "activate",
    "deactivate",
    "Note",
    "loop",
    "alt",
    "opt",
    "par",
    "critical",
    "break",
    "rect",
    "box",
    "autonumber",
    "create",
    "destroy",
    "title",
    "accTitle",
    "accDescr",
];

const BOX_COLORS: &[&str] = &[
    "transparent", "black", "white", "gray", "grey", "silver", "red", "maroon", "orange", "yellow",
    "olive", "lime", "green", "teal", "aqua", "cyan", "blue", "navy", "purple", "fuchsia",
    "magenta", "pink", "violet", "gold", "beige", "lightblue", "lightgreen", "lightgrey",
    "lightyellow", "aliceblue", "lavender", "salmon", "coral", "khaki", "plum", "tan", "wheat",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ParticipantKind {
    #[default]
    Participant,
    Actor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ArrowKind {
    /// `->`
    SolidOpen,
    /// `-->`
    DottedOpen,
    /// `->>`
    Solid,
    /// `-->>`
    Dotted,
    /// `-x`
    SolidCross,
    /// `--x`
    DottedCross,
    /// `-)`
    SolidPoint,
    /// `--)`
    DottedPoint,
    /// `<<->>`
    BidirectionalSolid,
    /// `<<-->>`
    BidirectionalDotted,
}

impl ArrowKind {
    pub fn from_op(op: &str) -> Option<Self> {
        Some(match op {
            "->" => Self::SolidOpen,
            "-->" => Self::DottedOpen,
            "->>" => Self::Solid,
            "-->>" => Self::Dotted,
            "-x" => Self::SolidCross,
            "--x" => Self::DottedCross,
            "-)" => Self::SolidPoint,
            "--)" => Self::DottedPoint,
            "<<->>" => Self::BidirectionalSolid,
            "<<-->>" => Self::BidirectionalDotted,
            _ => return None,
        })
    }

    pub fn is_dotted(self) -> bool {
        matches!(
            self,
            Self::DottedOpen
                | Self::Dotted
                | Self::DottedCross
                | Self::DottedPoint
                | Self::BidirectionalDotted
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NotePlacement {
    LeftOf,
    RightOf,
    Over,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FragmentKind {
    Loop,
    Alt,
    Opt,
    Par,
    Critical,
    Break,
    Rect,
}

impl FragmentKind {
    fn from_keyword(kw: &str) -> Option<Self> {
        Some(match kw {
            "loop" => Self::Loop,
            "alt" => Self::Alt,
            "opt" => Self::Opt,
            "par" => Self::Par,
            "critical" => Self::Critical,
            "break" => Self::Break,
            "rect" => Self::Rect,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceModel {
    pub title: Option<String>,
    pub participants: Vec<Participant>,
    pub messages: Vec<Message>,
    /// Closed activation windows in closing order, then the ones closed at the end.
    pub activations: Vec<Activation>,
    pub notes: Vec<Note>,
    /// Outer fragments precede the fragments nested in them.
    pub fragments: Vec<Fragment>,
    pub boxes: Vec<ParticipantBox>,
    /// The first `autonumber` setting; per-message numbers live on [`Message::number`].
    pub autonumber: Option<Autonumber>,
    pub mirror_actors: bool,
    pub acc: Accessibility,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    pub label: String,
    pub kind: ParticipantKind,
    /// Index of the message that introduces a `create`d participant.
    pub created_at: Option<usize>,
    /// Index of the message that follows `destroy`.
    pub destroyed_at: Option<usize>,
    pub in_box: Option<usize>,
}

impl Entity for Participant {
    fn implicit(id: &str) -> Self {
        Self {
            id: id.to_string(),
            label: id.to_string(),
            kind: ParticipantKind::Participant,
            created_at: None,
            destroyed_at: None,
            in_box: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub index: usize,
    pub from: String,
    pub to: String,
    pub text: String,
    pub arrow: ArrowKind,
    /// `+` suffix: the receiver activates.
    pub activate: bool,
    /// `-` suffix: the sender deactivates.
    pub deactivate: bool,
    pub number: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activation {
    pub participant: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub placement: NotePlacement,
    pub actors: Vec<String>,
    pub text: String,
    /// Number of messages emitted before the note.
    pub after_messages: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    pub kind: FragmentKind,
    pub sections: Vec<FragmentSection>,
    /// Enclosing fragment, as an index into [`SequenceModel::fragments`].
    pub parent: Option<usize>,
    /// Half-open message range `[start, end)`.
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentSection {
    pub label: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantBox {
    pub title: Option<String>,
    pub color: String,
    pub participants: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Autonumber {
    pub start: u64,
    pub step: u64,
}

impl SequenceModel {
    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn activations_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Activation> + 'a {
        self.activations.iter().filter(move |a| a.participant == id)
    }
}

impl Model for SequenceModel {
    fn entity_ids(&self) -> Vec<&str> {
        self.participants.iter().map(|p| p.id.as_str()).collect()
    }

    fn relation_endpoints(&self) -> Vec<(&str, &str)> {
        self.messages
            .iter()
            .map(|m| (m.from.as_str(), m.to.as_str()))
            .collect()
    }
}

pub fn parse(text: &str, config: &Config) -> Result<SequenceModel> {
    let doc = parse_document(text)?;
    super::canonicalized(NOTATION, transform(&doc, config))
}

pub fn parse_document(text: &str) -> std::result::Result<Document<'_>, GrammarError> {
    crate::grammar::parse_document(NOTATION, text, header(HEADERS), grammar::statement, STATEMENTS)
}

/// Splits a box heading into its color and title; a heading without a color is all title.
pub(crate) fn split_box_heading(heading: &str) -> (String, Option<String>) {
    let heading = heading.trim();
    let lower = heading.to_ascii_lowercase();
    let functional = ["rgba(", "rgb(", "hsla(", "hsl("]
        .iter()
        .any(|prefix| lower.starts_with(prefix));
    let split = if functional {
        heading.find(')').map(|end| end + 1)
    } else {
        let end = heading
            .find(char::is_whitespace)
            .unwrap_or(heading.len());
        let word = &lower[..end];
        let is_hex = word.len() > 1
            && word.starts_with('#')
            && word[1..].chars().all(|c| c.is_ascii_hexdigit());
        (is_hex || BOX_COLORS.contains(&word)).then_some(end)
    };
    match split {
        Some(end) => {
            let title = heading[end..].trim();
            (
                heading[..end].to_string(),
                (!title.is_empty()).then(|| title.to_string()),
            )
        }
        None => (
            "transparent".to_string(),
            (!heading.is_empty()).then(|| heading.to_string()),
        ),
    }
}

struct Numbering {
    /// `None` once the counter has passed `u64::MAX`.
    next: Option<u64>,
    step: u64,
}

struct SequenceBuilder {
    model: SequenceModel,
    participants: EntityRegistry<Participant>,
    tracker: ActivationTracker,
    numbering: Option<Numbering>,
    current_box: Option<usize>,
    pending_create: Option<String>,
    pending_destroy: Vec<String>,
}

impl SequenceBuilder {
    fn walk<'r, 'a: 'r>(
        &mut self,
        doc: &Document<'_>,
        stmts: impl Iterator<Item = &'r Record<'a>>,
        parent: Option<usize>,
    ) -> CanonResult<()> {
        for stmt in stmts {
            if apply_accessibility(&mut self.model.acc, stmt) {
                continue;
            }
            match stmt.kind {
                "title" => self.model.title = stmt.non_empty_text("text").map(str::to_string),
                "participant" => self.declare(doc, stmt)?,
                "destroy" => {
                    let id = stmt.require_text("id")?;
                    self.participants.find_or_create(id);
                    self.pending_destroy.push(id.to_string());
                }
                "box" => self.apply_box(doc, stmt, parent)?,
                "activate" => {
                    let id = stmt.require_text("id")?;
                    self.participants.find_or_create(id);
                    self.tracker.activate(id);
                }
                "deactivate" => {
                    let id = stmt.require_text("id")?;
                    self.deactivate(doc, stmt, id)?;
                }
                "note" => self.apply_note(doc, stmt)?,
                "autonumber" => self.apply_autonumber(doc, stmt)?,
                "fragment" => self.apply_fragment(doc, stmt, parent)?,
                "message" => self.apply_message(doc, stmt)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn declare(&mut self, doc: &Document<'_>, stmt: &Record<'_>) -> CanonResult<()> {
        let id = stmt.require_text("id")?;
        let current_box = self.current_box;
        let participant = self.participants.find_or_create(id);
        if stmt.text("kind") == Some("actor") {
            participant.kind = ParticipantKind::Actor;
        }
        merge_text(&mut participant.label, stmt.text("alias"));
        if let Some(idx) = current_box {
            match participant.in_box {
                Some(existing) if existing != idx => {
                    return Err(doc.invalid(
                        stmt,
                        format!("participant `{id}` is already in another box"),
                    ));
                }
                Some(_) => {}
                None => {
                    participant.in_box = Some(idx);
                    self.model.boxes[idx].participants.push(id.to_string());
                }
            }
        }
        if stmt.has("create") {
            self.pending_create = Some(id.to_string());
        }
        Ok(())
    }

    fn deactivate(&mut self, doc: &Document<'_>, stmt: &Record<'_>, id: &str) -> CanonResult<()> {
        match self.tracker.deactivate(id) {
            Some(window) => {
                tracing::trace!(participant = id, start = window.start, end = window.end, "activation closed");
                Ok(())
            }
            None => Err(doc.invalid(
                stmt,
                format!("`{id}` is deactivated but has no active activation"),
            )),
        }
    }

    fn apply_box(
        &mut self,
        doc: &Document<'_>,
        stmt: &Record<'_>,
        parent: Option<usize>,
    ) -> CanonResult<()> {
        if self.current_box.is_some() {
            return Err(doc.invalid(stmt, "boxes cannot be nested"));
        }
        let (color, title) = split_box_heading(stmt.text("heading").unwrap_or_default());
        self.model.boxes.push(ParticipantBox {
            title,
            color,
            participants: Vec::new(),
        });
        self.current_box = Some(self.model.boxes.len() - 1);
        let walked = self.walk(doc, stmt.records("body"), parent);
        self.current_box = None;
        walked
    }

    fn apply_note(&mut self, doc: &Document<'_>, stmt: &Record<'_>) -> CanonResult<()> {
        let raw = stmt.require_text("placement")?;
        let words: Vec<String> = raw.split_whitespace().map(str::to_ascii_lowercase).collect();
        let placement = match words.first().map(String::as_str) {
            Some("left") => NotePlacement::LeftOf,
            Some("right") => NotePlacement::RightOf,
            Some("over") => NotePlacement::Over,
            _ => return Err(doc.invalid(stmt, format!("unknown note placement `{raw}`"))),
        };
        let actors: Vec<String> = stmt.texts("actors").map(str::to_string).collect();
        if actors.len() > 1 && placement != NotePlacement::Over {
            return Err(doc.invalid(stmt, "only `over` notes may span two participants"));
        }
        for id in &actors {
            self.participants.find_or_create(id);
        }
        self.model.notes.push(Note {
            placement,
            actors,
            text: stmt.text("text").unwrap_or_default().to_string(),
            after_messages: self.model.messages.len(),
        });
        Ok(())
    }

    fn apply_autonumber(&mut self, doc: &Document<'_>, stmt: &Record<'_>) -> CanonResult<()> {
        if stmt.has("off") {
            self.numbering = None;
            return Ok(());
        }
        let number = |field: &'static str, default: u64| -> CanonResult<u64> {
            match stmt.text(field) {
                Some(raw) => raw
                    .parse()
                    .map_err(|_| doc.invalid(stmt, format!("autonumber {field} `{raw}` is out of range"))),
                None => Ok(default),
            }
        };
        let setting = Autonumber {
            start: number("start", 1)?,
            step: number("step", 1)?,
        };
        if self.model.autonumber.is_none() {
            self.model.autonumber = Some(setting);
        }
        self.numbering = Some(Numbering {
            next: Some(setting.start),
            step: setting.step,
        });
        Ok(())
    }

    fn apply_fragment(
        &mut self,
        doc: &Document<'_>,
        stmt: &Record<'_>,
        parent: Option<usize>,
    ) -> CanonResult<()> {
        let keyword = stmt.require_text("kind")?;
        let kind = FragmentKind::from_keyword(keyword)
            .ok_or_else(|| doc.invalid(stmt, format!("unknown fragment `{keyword}`")))?;
        let idx = self.model.fragments.len();
        let start = self.model.messages.len();
        self.model.fragments.push(Fragment {
            kind,
            sections: Vec::new(),
            parent,
            start,
            end: start,
        });

        let mut sections = Vec::new();
        for section in stmt.records("sections") {
            let section_start = self.model.messages.len();
            self.walk(doc, section.records("body"), Some(idx))?;
            sections.push(FragmentSection {
                label: section.text("label").unwrap_or_default().to_string(),
                start: section_start,
                end: self.model.messages.len(),
            });
        }
        let fragment = &mut self.model.fragments[idx];
        fragment.sections = sections;
        fragment.end = self.model.messages.len();
        Ok(())
    }

    fn apply_message(&mut self, doc: &Document<'_>, stmt: &Record<'_>) -> CanonResult<()> {
        let from = stmt.require_text("from")?;
        let to = stmt.require_text("to")?;
        let op = stmt.require_text("op")?;
        let arrow = ArrowKind::from_op(op)
            .ok_or_else(|| doc.invalid(stmt, format!("unknown message arrow `{op}`")))?;
        self.participants.find_or_create(from);
        self.participants.find_or_create(to);

        let index = self.tracker.next_message();
        if let Some(created) = self.pending_create.take() {
            if created != from && created != to {
                return Err(doc.invalid(
                    stmt,
                    format!("`{created}` is created but the next message does not involve it"),
                ));
            }
            if let Some(p) = self.participants.get_mut(&created) {
                p.created_at = Some(index);
            }
        }
        for id in std::mem::take(&mut self.pending_destroy) {
            if let Some(p) = self.participants.get_mut(&id) {
                p.destroyed_at = Some(index);
            }
        }

        let suffix = stmt.text("suffix");
        if suffix == Some("+") {
            self.tracker.activate(to);
        }
        if suffix == Some("-") {
            self.deactivate(doc, stmt, from)?;
        }
        let number = match self.numbering.as_mut() {
            Some(n) => {
                let current = n
                    .next
                    .ok_or_else(|| doc.invalid(stmt, "autonumber ran past the largest message number"))?;
                n.next = current.checked_add(n.step);
                Some(current)
            }
            None => None,
        };
        self.model.messages.push(Message {
            index,
            from: from.to_string(),
            to: to.to_string(),
            text: stmt.text("text").unwrap_or_default().to_string(),
            arrow,
            activate: suffix == Some("+"),
            deactivate: suffix == Some("-"),
            number,
        });
        Ok(())
    }

    fn finish(self) -> SequenceModel {
        let mut model = self.model;
        model.participants = self.participants.into_vec();
        model.activations = self
            .tracker
            .finish()
            .into_iter()
            .map(|w| Activation {
                participant: w.participant,
                start: w.start,
                end: w.end,
            })
            .collect();
        model
    }
}

pub fn transform(doc: &Document<'_>, config: &Config) -> CanonResult<SequenceModel> {
    let mut builder = SequenceBuilder {
        model: SequenceModel {
            title: None,
            participants: Vec::new(),
            messages: Vec::new(),
            activations: Vec::new(),
            notes: Vec::new(),
            fragments: Vec::new(),
            boxes: Vec::new(),
            autonumber: None,
            mirror_actors: config.get_bool("sequence.mirrorActors").unwrap_or(false),
            acc: Accessibility::default(),
        },
        participants: EntityRegistry::new(),
        tracker: ActivationTracker::new(),
        numbering: None,
        current_box: None,
        pending_create: None,
        pending_destroy: Vec::new(),
    };
    builder.walk(doc, doc.statements(), None)?;
    if let Some(created) = &builder.pending_create {
        tracing::warn!(participant = %created, "created participant never receives a message");
    }
    let model = builder.finish();

    tracing::debug!(
        participants = model.participants.len(),
        messages = model.messages.len(),
        fragments = model.fragments.len(),
        "sequence canonicalized"
    );
    Ok(model)
}

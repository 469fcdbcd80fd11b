//! Concrete syntax tree produced by the notation grammars.
//!
//! A closed union of leaf tokens, kind-tagged records with ordered named captures, and lists.
//! Records are built once by a grammar rule and only read afterwards; transforms pull captures
//! out with the explicit extractors below instead of probing shapes.

use std::borrow::Cow;
use std::ops::Range;

use crate::error::{CanonicalizationError, Position};

/// Byte range in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Self::new(range.start, range.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub text: Cow<'a, str>,
    pub span: Span,
}

impl<'a> Token<'a> {
    pub fn new(text: impl Into<Cow<'a, str>>, span: Span) -> Self {
        Self {
            text: text.into(),
            span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record<'a> {
    pub kind: &'static str,
    pub span: Span,
    fields: Vec<(&'static str, Cst<'a>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cst<'a> {
    Token(Token<'a>),
    Record(Record<'a>),
    List(Vec<Cst<'a>>),
}

impl<'a> From<Token<'a>> for Cst<'a> {
    fn from(value: Token<'a>) -> Self {
        Self::Token(value)
    }
}

impl<'a> From<Record<'a>> for Cst<'a> {
    fn from(value: Record<'a>) -> Self {
        Self::Record(value)
    }
}

impl<'a, T: Into<Cst<'a>>> From<Vec<T>> for Cst<'a> {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl<'a> Cst<'a> {
    pub fn as_record(&self) -> Option<&Record<'a>> {
        match self {
            Self::Record(r) => Some(r),
            Self::Token(_) | Self::List(_) => None,
        }
    }

    pub fn as_token(&self) -> Option<&Token<'a>> {
        match self {
            Self::Token(t) => Some(t),
            Self::Record(_) | Self::List(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        self.as_token().map(|t| t.text.as_ref())
    }

    pub fn as_list(&self) -> &[Cst<'a>] {
        match self {
            Self::List(items) => items,
            Self::Token(_) | Self::Record(_) => &[],
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::Token(t) => t.span,
            Self::Record(r) => r.span,
            Self::List(items) => match (items.first(), items.last()) {
                (Some(first), Some(last)) => Span::new(first.span().start, last.span().end),
                _ => Span::default(),
            },
        }
    }
}

impl<'a> Record<'a> {
    pub fn new(kind: &'static str, span: Span) -> Self {
        Self {
            kind,
            span,
            fields: Vec::new(),
        }
    }

    pub fn with(mut self, name: &'static str, value: impl Into<Cst<'a>>) -> Self {
        self.fields.push((name, value.into()));
        self
    }

    /// Adds the capture only when the optional part of the rule matched.
    pub fn with_opt(self, name: &'static str, value: Option<impl Into<Cst<'a>>>) -> Self {
        match value {
            Some(v) => self.with(name, v),
            None => self,
        }
    }

    /// Adds an empty-text marker capture when `present`; read back with [`Record::has`].
    pub fn with_flag(self, name: &'static str, present: bool) -> Self {
        if present {
            let span = Span::new(self.span.end, self.span.end);
            self.with(name, Token::new("", span))
        } else {
            self
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &Cst<'a>)> {
        self.fields.iter().map(|(k, v)| (*k, v))
    }

    pub fn get(&self, name: &str) -> Option<&Cst<'a>> {
        self.fields.iter().find(|(k, _)| *k == name).map(|(_, v)| v)
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }

    pub fn token(&self, name: &str) -> Option<&Token<'a>> {
        self.get(name).and_then(Cst::as_token)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Cst::as_text)
    }

    /// Text capture that is empty after trimming counts as absent.
    pub fn non_empty_text(&self, name: &str) -> Option<&str> {
        self.text(name).map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn require_text(&self, name: &'static str) -> Result<&str, CanonicalizationError> {
        self.text(name).ok_or(CanonicalizationError::MissingField {
            record: self.kind,
            field: name,
        })
    }

    pub fn record(&self, name: &str) -> Option<&Record<'a>> {
        self.get(name).and_then(Cst::as_record)
    }

    pub fn require_record(&self, name: &'static str) -> Result<&Record<'a>, CanonicalizationError> {
        self.record(name).ok_or(CanonicalizationError::MissingField {
            record: self.kind,
            field: name,
        })
    }

    /// Items of a list capture; an absent capture reads as an empty list.
    pub fn list(&self, name: &str) -> &[Cst<'a>] {
        self.get(name).map(Cst::as_list).unwrap_or(&[])
    }

    pub fn records(&self, name: &str) -> impl Iterator<Item = &Record<'a>> {
        self.list(name).iter().filter_map(Cst::as_record)
    }

    pub fn texts(&self, name: &str) -> impl Iterator<Item = &str> {
        self.list(name).iter().filter_map(Cst::as_text)
    }
}

/// One parsed document: the source text plus the root record (`kind = "document"`).
#[derive(Debug, Clone, PartialEq)]
pub struct Document<'a> {
    pub notation: &'static str,
    pub source: &'a str,
    pub root: Record<'a>,
}

impl<'a> Document<'a> {
    pub fn new(notation: &'static str, source: &'a str, root: Record<'a>) -> Self {
        Self {
            notation,
            source,
            root,
        }
    }

    pub fn header(&self) -> Result<&Record<'a>, CanonicalizationError> {
        self.root.require_record("header")
    }

    pub fn statements(&self) -> impl Iterator<Item = &Record<'a>> {
        self.root.records("statements")
    }

    pub fn position(&self, offset: usize) -> Position {
        Position::of_offset(self.source, offset)
    }

    pub fn position_of(&self, record: &Record<'_>) -> Position {
        self.position(record.span.start)
    }

    /// A canonicalization error pointing at the start of `record`.
    pub fn invalid(&self, record: &Record<'_>, message: impl Into<String>) -> CanonicalizationError {
        CanonicalizationError::invalid_at(message, self.position_of(record))
    }
}

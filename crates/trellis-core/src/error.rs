use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;
pub type CanonResult<T> = std::result::Result<T, CanonicalizationError>;

/// 1-based line/column of a byte offset in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn of_offset(text: &str, offset: usize) -> Self {
        let offset = offset.min(text.len());
        let mut line = 1;
        let mut line_start = 0;
        for (idx, ch) in text.char_indices() {
            if idx >= offset {
                break;
            }
            if ch == '\n' {
                line += 1;
                line_start = idx + 1;
            }
        }
        let column = text
            .get(line_start..offset)
            .map(|s| s.chars().count())
            .unwrap_or(0)
            + 1;
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// The input does not match any grammar alternative at `offset`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{notation}: syntax error at {position} (offset {offset}); expected {}", ExpectedList(.expected))]
pub struct GrammarError {
    pub notation: &'static str,
    pub offset: usize,
    pub position: Position,
    pub expected: Vec<String>,
}

struct ExpectedList<'a>(&'a [String]);

impl fmt::Display for ExpectedList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.split_last() {
            None => f.write_str("valid input"),
            Some((only, [])) => f.write_str(only),
            Some((last, head)) => write!(f, "one of {} or {last}", head.join(", ")),
        }
    }
}

/// The CST was well formed but violates a modeling rule of the notation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CanonicalizationError {
    /// A capture the grammar always produces is absent: an internal invariant violation.
    #[error("internal: `{record}` record has no `{field}` capture")]
    MissingField {
        record: &'static str,
        field: &'static str,
    },

    #[error("{message}{}", AtPosition(.position))]
    Invalid {
        message: String,
        position: Option<Position>,
    },
}

impl CanonicalizationError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
            position: None,
        }
    }

    pub fn invalid_at(message: impl Into<String>, position: Position) -> Self {
        Self::Invalid {
            message: message.into(),
            position: Some(position),
        }
    }
}

struct AtPosition<'a>(&'a Option<Position>);

impl fmt::Display for AtPosition<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(pos) => write!(f, " (at {pos})"),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error("{notation}: {source}")]
    Canonicalization {
        notation: &'static str,
        #[source]
        source: CanonicalizationError,
    },
}

impl Error {
    pub fn canonicalization(notation: &'static str, source: CanonicalizationError) -> Self {
        Self::Canonicalization { notation, source }
    }

    pub fn position(&self) -> Option<Position> {
        match self {
            Self::Grammar(e) => Some(e.position),
            Self::Canonicalization {
                source: CanonicalizationError::Invalid { position, .. },
                ..
            } => *position,
            Self::Canonicalization { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_counts_lines_and_chars() {
        let text = "ab\ncdé\nf";
        assert_eq!(Position::of_offset(text, 0), Position { line: 1, column: 1 });
        assert_eq!(Position::of_offset(text, 3), Position { line: 2, column: 1 });
        assert_eq!(Position::of_offset(text, 5), Position { line: 2, column: 3 });
        assert_eq!(Position::of_offset(text, text.len()), Position { line: 3, column: 2 });
    }

    #[test]
    fn grammar_error_lists_expected_tokens() {
        let err = GrammarError {
            notation: "flowchart",
            offset: 4,
            position: Position { line: 2, column: 1 },
            expected: vec!["`]`".to_string(), "`)`".to_string(), "`}`".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "flowchart: syntax error at line 2, column 1 (offset 4); expected one of `]`, `)` or `}`"
        );
    }
}

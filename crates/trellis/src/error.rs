use crate::detect::DetectTypeError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] trellis_core::Error),

    #[error(transparent)]
    DetectType(#[from] DetectTypeError),

    #[error("Unsupported diagram type: {diagram_type}")]
    UnsupportedDiagram { diagram_type: String },

    #[error(
        "Malformed YAML front-matter: open and close it with un-indented `---` lines ({message})"
    )]
    MalformedFrontMatter { message: String },

    #[error("Invalid YAML front-matter: {message}")]
    InvalidFrontMatterYaml { message: String },

    #[error("Invalid directive: {message}")]
    InvalidDirective { message: String },

    #[error("{diagram_type}: {violation}")]
    Invalid {
        diagram_type: String,
        violation: trellis_core::Violation,
    },
}

impl Error {
    /// Source position of a grammar or canonicalization failure, if any.
    pub fn position(&self) -> Option<trellis_core::Position> {
        match self {
            Self::Core(err) => err.position(),
            _ => None,
        }
    }
}

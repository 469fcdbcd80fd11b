#![forbid(unsafe_code)]

//! Diagram notation grammars + canonical semantic models (headless).
//!
//! Text goes through three stages:
//! - [`lex`] and [`grammar`]: shared recognizers and one PEG grammar per notation, producing a
//!   [`cst::Document`]
//! - [`diagrams`]: one canonicalizer per notation, turning the document into a typed model
//! - [`model::Model`]: the contract every model satisfies (entity ids, relation endpoints,
//!   groupings, referential integrity)
//!
//! Detection, front-matter and directives live in the `trellis` facade crate.

pub mod canon;
pub mod config;
pub mod cst;
pub mod diagrams;
pub mod error;
pub mod grammar;
pub mod lex;
pub mod model;

pub use config::Config;
pub use cst::{Cst, Document, Record, Span, Token};
pub use diagrams::Diagram;
pub use error::{CanonicalizationError, Error, GrammarError, Position, Result};
pub use model::{Accessibility, Model, Violation};

#[cfg(test)]
mod tests;

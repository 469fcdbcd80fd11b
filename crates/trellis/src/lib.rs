#![forbid(unsafe_code)]

//! `trellis` turns diagram text into typed, validated models.
//!
//! The notation grammars and models live in [`trellis_core`] (re-exported here). This crate adds
//! the outer pipeline: line-ending cleanup, YAML front-matter and `%%{init}%%` directives
//! ([`preprocess`]), header detection ([`detect`]) and dispatch to the notation parser
//! ([`registry`]).
//!
//! ```
//! use trellis::{Engine, Model};
//!
//! let parsed = Engine::new().parse("erDiagram\nCUSTOMER ||--o{ ORDER : places\n")?;
//! assert_eq!(parsed.meta.diagram_type, "er");
//! assert_eq!(parsed.model.entity_ids(), vec!["CUSTOMER", "ORDER"]);
//! # Ok::<(), trellis::Error>(())
//! ```

pub mod detect;
mod error;
pub mod preprocess;
pub mod registry;

pub use trellis_core::*;

pub use detect::{DetectTypeError, Detector, DetectorRegistry};
pub use error::{Error, Result};
pub use preprocess::{PreprocessResult, preprocess_diagram};
pub use registry::{DiagramParser, DiagramRegistry};

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Run [`Model::violations`] and fail on the first one.
    pub require_valid: bool,
}

impl ParseOptions {
    /// Errors are returned; models with dangling references are still returned.
    pub fn strict() -> Self {
        Self {
            require_valid: false,
        }
    }

    /// Like [`ParseOptions::strict`], and a model that fails referential integrity is an error.
    pub fn validated() -> Self {
        Self {
            require_valid: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParseMetadata {
    pub diagram_type: String,
    /// Overrides extracted from front-matter and directives.
    pub config: Config,
    /// Site config with the overrides applied; this is what the notation parser saw.
    pub effective_config: Config,
    pub title: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ParsedDiagram {
    pub meta: ParseMetadata,
    pub model: Diagram,
}

#[derive(Debug, Clone)]
pub struct Engine {
    registry: DetectorRegistry,
    diagram_registry: DiagramRegistry,
    site_config: Config,
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            registry: DetectorRegistry::default_notations(),
            diagram_registry: DiagramRegistry::default_notations(),
            site_config: Config::empty_object(),
        }
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_site_config(mut self, site_config: Config) -> Self {
        self.site_config.deep_merge(site_config.as_value());
        self
    }

    pub fn registry(&self) -> &DetectorRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut DetectorRegistry {
        &mut self.registry
    }

    pub fn diagram_registry(&self) -> &DiagramRegistry {
        &self.diagram_registry
    }

    pub fn diagram_registry_mut(&mut self) -> &mut DiagramRegistry {
        &mut self.diagram_registry
    }

    /// Preprocesses and detects the notation without running its grammar.
    pub fn parse_metadata(&self, text: &str) -> Result<ParseMetadata> {
        let (_, meta) = self.preprocess_and_detect(text)?;
        Ok(meta)
    }

    pub fn parse(&self, text: &str) -> Result<ParsedDiagram> {
        self.parse_with_options(text, ParseOptions::strict())
    }

    pub fn parse_with_options(&self, text: &str, options: ParseOptions) -> Result<ParsedDiagram> {
        let (code, meta) = self.preprocess_and_detect(text)?;
        self.finish(code, meta, options)
    }

    /// Parses `text` as `diagram_type`, skipping detection.
    ///
    /// Useful when the caller already knows the notation, e.g. from a Markdown fence info
    /// string.
    pub fn parse_as(&self, diagram_type: &str, text: &str) -> Result<ParsedDiagram> {
        self.parse_as_with_options(diagram_type, text, ParseOptions::strict())
    }

    pub fn parse_as_with_options(
        &self,
        diagram_type: &str,
        text: &str,
        options: ParseOptions,
    ) -> Result<ParsedDiagram> {
        if self.diagram_registry.get(diagram_type).is_none() {
            return Err(Error::UnsupportedDiagram {
                diagram_type: diagram_type.to_string(),
            });
        }
        let pre = preprocess_diagram(text, &self.registry)?;
        let meta = self.metadata(diagram_type.to_string(), pre.title, pre.config);
        self.finish(pre.code, meta, options)
    }

    fn preprocess_and_detect(&self, text: &str) -> Result<(String, ParseMetadata)> {
        let pre = preprocess_diagram(text, &self.registry)?;
        let mut detect_config = self.site_config.clone();
        detect_config.deep_merge(pre.config.as_value());
        let diagram_type = self.registry.detect_type(&pre.code, &mut detect_config)?;

        let mut meta = self.metadata(diagram_type.to_string(), pre.title, pre.config);
        // Detectors may record settings implied by the header (e.g. `flowchart-elk`).
        meta.effective_config = detect_config;
        Ok((pre.code, meta))
    }

    fn metadata(&self, diagram_type: String, title: Option<String>, config: Config) -> ParseMetadata {
        let mut effective_config = self.site_config.clone();
        effective_config.deep_merge(config.as_value());
        ParseMetadata {
            diagram_type,
            config,
            effective_config,
            title,
        }
    }

    fn finish(&self, code: String, meta: ParseMetadata, options: ParseOptions) -> Result<ParsedDiagram> {
        let model = self
            .diagram_registry
            .parse(&meta.diagram_type, &code, &meta.effective_config)?;

        if options.require_valid {
            if let Some(violation) = model.violations().into_iter().next() {
                return Err(Error::Invalid {
                    diagram_type: meta.diagram_type,
                    violation,
                });
            }
        }

        tracing::debug!(
            diagram_type = %meta.diagram_type,
            entities = model.entity_ids().len(),
            "parsed diagram"
        );
        Ok(ParsedDiagram { meta, model })
    }
}

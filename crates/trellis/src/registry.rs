use indexmap::IndexMap;
use trellis_core::diagrams::{
    architecture, block, c4, class, er, flowchart, gantt, git_graph, journey, kanban, mindmap,
    packet, pie, quadrant_chart, requirement, sankey, sequence, state, timeline, treemap,
};
use trellis_core::{Config, Diagram};

use crate::{Error, Result};

/// Text to model for one notation. `text` has already been preprocessed.
pub type DiagramParser = fn(text: &str, config: &Config) -> trellis_core::Result<Diagram>;

/// Notation id to parser, in registration order.
#[derive(Debug, Clone, Default)]
pub struct DiagramRegistry {
    parsers: IndexMap<&'static str, DiagramParser>,
}

macro_rules! register {
    ($reg:ident, $($module:ident),+ $(,)?) => {
        $(
            $reg.insert($module::NOTATION, |text, config| {
                $module::parse(text, config).map(Diagram::from)
            });
        )+
    };
}

impl DiagramRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, diagram_type: &'static str, parser: DiagramParser) {
        self.parsers.insert(diagram_type, parser);
    }

    pub fn get(&self, diagram_type: &str) -> Option<DiagramParser> {
        self.parsers.get(diagram_type).copied()
    }

    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.parsers.keys().copied()
    }

    pub fn default_notations() -> Self {
        let mut reg = Self::new();
        register!(
            reg,
            flowchart,
            sequence,
            class,
            state,
            er,
            gantt,
            git_graph,
            mindmap,
            treemap,
            kanban,
            timeline,
            journey,
            pie,
            requirement,
            c4,
            block,
            quadrant_chart,
            packet,
            sankey,
            architecture,
        );
        reg
    }

    pub fn parse(&self, diagram_type: &str, text: &str, config: &Config) -> Result<Diagram> {
        let Some(parser) = self.get(diagram_type) else {
            return Err(Error::UnsupportedDiagram {
                diagram_type: diagram_type.to_string(),
            });
        };
        tracing::debug!(diagram_type, bytes = text.len(), "dispatching to notation parser");
        Ok(parser(text, config)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::DetectorRegistry;

    #[test]
    fn every_detected_type_has_a_parser() {
        let parsers = DiagramRegistry::default_notations();
        let detectors = DetectorRegistry::default_notations();
        let mut detected: Vec<_> = detectors.ids().collect();
        let mut registered: Vec<_> = parsers.ids().collect();
        detected.sort_unstable();
        registered.sort_unstable();
        assert_eq!(detected, registered);
        assert_eq!(registered.len(), 20);
    }

    #[test]
    fn unknown_type_is_unsupported() {
        let err = DiagramRegistry::default_notations()
            .parse("radar", "radar-beta\n", &Config::default())
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedDiagram { diagram_type } if diagram_type == "radar"));
    }

    #[test]
    fn custom_parser_can_be_registered() {
        let mut reg = DiagramRegistry::new();
        reg.insert("pie", |text, config| pie::parse(text, config).map(Diagram::from));
        let diagram = reg.parse("pie", "pie\n\"a\": 1\n", &Config::default()).unwrap();
        assert_eq!(diagram.notation(), "pie");
    }
}

use std::sync::LazyLock;

use regex::Regex;
use trellis_core::Config;

use crate::preprocess::{strip_directives, strip_front_matter};

#[derive(Debug, Clone, thiserror::Error)]
#[error("no diagram type detected for text: {text}")]
pub struct DetectTypeError {
    pub text: String,
}

pub type DetectorFn = fn(text: &str, config: &mut Config) -> bool;

#[derive(Debug, Clone)]
pub struct Detector {
    pub id: &'static str,
    pub detector: DetectorFn,
}

/// Ordered list of header detectors. The first detector that accepts the cleaned text wins.
#[derive(Debug, Clone, Default)]
pub struct DetectorRegistry {
    detectors: Vec<Detector>,
}

static ANY_COMMENT_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*%%.*$").ok());

impl DetectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, detector: Detector) {
        self.detectors.push(detector);
    }

    pub fn add_fn(&mut self, id: &'static str, detector: DetectorFn) {
        self.add(Detector { id, detector });
    }

    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.detectors.iter().map(|d| d.id)
    }

    pub fn detect_type(
        &self,
        text: &str,
        config: &mut Config,
    ) -> Result<&'static str, DetectTypeError> {
        let without_front_matter = strip_front_matter(text);
        let without_directives = strip_directives(&without_front_matter);
        let cleaned = match ANY_COMMENT_RE.as_ref() {
            Some(re) => re.replace_all(&without_directives, "").into_owned(),
            None => without_directives,
        };

        for det in &self.detectors {
            if (det.detector)(&cleaned, config) {
                tracing::debug!(diagram_type = det.id, "detected diagram type");
                return Ok(det.id);
            }
        }

        Err(DetectTypeError {
            text: cleaned.trim().to_string(),
        })
    }

    /// Every notation shipped by `trellis-core`, in an order where no header is shadowed by a
    /// shorter one registered earlier.
    pub fn default_notations() -> Self {
        let mut reg = Self::new();

        reg.add_fn("flowchart", detector_flowchart);
        reg.add_fn("mindmap", detector_mindmap);
        reg.add_fn("architecture", detector_architecture);
        reg.add_fn("c4", detector_c4);
        reg.add_fn("kanban", detector_kanban);
        reg.add_fn("class", detector_class);
        reg.add_fn("er", detector_er);
        reg.add_fn("gantt", detector_gantt);
        reg.add_fn("pie", detector_pie);
        reg.add_fn("requirement", detector_requirement);
        reg.add_fn("sequence", detector_sequence);
        reg.add_fn("timeline", detector_timeline);
        reg.add_fn("gitGraph", detector_git_graph);
        reg.add_fn("state", detector_state);
        reg.add_fn("journey", detector_journey);
        reg.add_fn("quadrantChart", detector_quadrant);
        reg.add_fn("sankey", detector_sankey);
        reg.add_fn("packet", detector_packet);
        reg.add_fn("block", detector_block);
        reg.add_fn("treemap", detector_treemap);

        reg
    }
}

macro_rules! header_detector {
    ($name:ident, $pattern:literal) => {
        fn $name(txt: &str, _config: &mut Config) -> bool {
            static RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new($pattern).ok());
            RE.as_ref().is_some_and(|re| re.is_match(txt))
        }
    };
}

fn detector_flowchart(txt: &str, config: &mut Config) -> bool {
    static ELK_RE: LazyLock<Option<Regex>> =
        LazyLock::new(|| Regex::new(r"^\s*flowchart-elk").ok());
    static RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^\s*(flowchart|graph)").ok());

    if ELK_RE.as_ref().is_some_and(|re| re.is_match(txt)) {
        config.set_value("layout", serde_json::Value::String("elk".to_string()));
        return true;
    }
    RE.as_ref().is_some_and(|re| re.is_match(txt))
}

header_detector!(detector_mindmap, r"^\s*mindmap");
header_detector!(detector_architecture, r"^\s*architecture");
header_detector!(
    detector_c4,
    r"^\s*C4(Context|Container|Component|Dynamic|Deployment)"
);
header_detector!(detector_kanban, r"^\s*kanban");
header_detector!(detector_class, r"^\s*classDiagram");
header_detector!(detector_er, r"^\s*erDiagram");
header_detector!(detector_gantt, r"^\s*gantt");
header_detector!(detector_pie, r"^\s*pie");
header_detector!(detector_requirement, r"^\s*requirement(Diagram)?");
header_detector!(detector_sequence, r"^\s*sequenceDiagram");
header_detector!(detector_timeline, r"^\s*timeline");
header_detector!(detector_git_graph, r"^\s*gitGraph");
header_detector!(detector_state, r"^\s*stateDiagram");
header_detector!(detector_journey, r"^\s*journey");
header_detector!(detector_quadrant, r"^\s*quadrantChart");
header_detector!(detector_sankey, r"^\s*sankey(-beta)?");
header_detector!(detector_packet, r"^\s*packet(-beta)?");
header_detector!(detector_block, r"^\s*block(-beta)?");
header_detector!(detector_treemap, r"^\s*treemap");

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(text: &str) -> Result<&'static str, DetectTypeError> {
        DetectorRegistry::default_notations().detect_type(text, &mut Config::default())
    }

    #[test]
    fn detects_every_header_spelling() {
        let cases = [
            ("flowchart TD\nA-->B", "flowchart"),
            ("graph LR\nA-->B", "flowchart"),
            ("sequenceDiagram\nA->>B: hi", "sequence"),
            ("classDiagram-v2\nclass A", "class"),
            ("stateDiagram-v2\n[*] --> A", "state"),
            ("erDiagram\nA ||--o{ B : x", "er"),
            ("gantt\ntitle x", "gantt"),
            ("gitGraph\ncommit", "gitGraph"),
            ("mindmap\nroot", "mindmap"),
            ("treemap-beta\n\"a\"", "treemap"),
            ("kanban\ntodo", "kanban"),
            ("timeline\n2024 : x", "timeline"),
            ("journey\nsection s", "journey"),
            ("pie title Pets\n\"a\": 1", "pie"),
            ("requirementDiagram\n", "requirement"),
            ("C4Deployment\n", "c4"),
            ("block-beta\na", "block"),
            ("quadrantChart\n", "quadrantChart"),
            ("packet-beta\n0-7: \"a\"", "packet"),
            ("sankey-beta\na,b,1", "sankey"),
            ("architecture-beta\nservice a", "architecture"),
        ];
        for (text, expected) in cases {
            assert_eq!(detect(text).unwrap(), expected, "{text}");
        }
    }

    #[test]
    fn skips_front_matter_directives_and_comments() {
        let text = "---\ntitle: T\n---\n%%{init: {\"theme\": \"dark\"}}%%\n%% note\n  gantt\n";
        assert_eq!(detect(text).unwrap(), "gantt");
    }

    #[test]
    fn flowchart_elk_sets_layout() {
        let mut config = Config::default();
        let id = DetectorRegistry::default_notations()
            .detect_type("flowchart-elk TD\nA-->B", &mut config)
            .unwrap();
        assert_eq!(id, "flowchart");
        assert_eq!(config.get_str("layout"), Some("elk"));
    }

    #[test]
    fn unknown_header_is_error() {
        let err = detect("%% only a comment\nbogus\n").unwrap_err();
        assert_eq!(err.text, "bogus");
    }
}

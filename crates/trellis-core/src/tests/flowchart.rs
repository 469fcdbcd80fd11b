use crate::diagrams::flowchart::{self, Arrowhead, FlowchartModel, NodeShape, Stroke};
use crate::*;
use serde_json::json;

fn parse(text: &str) -> FlowchartModel {
    flowchart::parse(text, &Config::default()).unwrap()
}

fn edge_ids(model: &FlowchartModel) -> Vec<&str> {
    model.edges.iter().map(|e| e.id.as_str()).collect()
}

#[test]
fn flowchart_unterminated_bracket_is_grammar_error() {
    let err = flowchart::parse("flowchart TD\nA[Start", &Config::default()).unwrap_err();
    let Error::Grammar(err) = err else {
        panic!("expected a grammar error, got {err:?}");
    };
    assert_eq!(err.notation, "flowchart");
    assert_eq!(err.position.line, 2);
    assert!(err.expected.contains(&"`]`".to_string()), "{:?}", err.expected);
}

#[test]
fn flowchart_header_direction_and_config_default() {
    assert_eq!(parse("flowchart TD\nA-->B\n").direction, "TB");
    assert_eq!(parse("graph RL\nA-->B\n").direction, "RL");
    assert_eq!(parse("graph\nA-->B\n").direction, "TB");

    let config = Config::from_value(json!({ "flowchart": { "defaultDirection": "LR" } }));
    let model = flowchart::parse("graph\nA-->B\n", &config).unwrap();
    assert_eq!(model.direction, "LR");
}

#[test]
fn flowchart_edge_creates_implicit_nodes() {
    let model = parse("flowchart LR\nA --> B\n");
    assert_eq!(model.entity_ids(), vec!["A", "B"]);
    let b = model.node("B").unwrap();
    assert_eq!(b.label, "B");
    assert_eq!(b.shape, NodeShape::Square);
    assert!(model.is_valid());
}

#[test]
fn flowchart_later_bare_reference_keeps_label() {
    let model = parse("flowchart LR\nA(Round) --> B\nA --> C\nB[Bravo]\nB\n");
    let a = model.node("A").unwrap();
    assert_eq!((a.label.as_str(), a.shape), ("Round", NodeShape::Round));
    assert_eq!(model.node("B").unwrap().label, "Bravo");
    assert_eq!(model.entity_ids(), vec!["A", "B", "C"]);
}

#[test]
fn flowchart_chains_and_groups_fan_out() {
    let model = parse("flowchart TD\nA & B --> C -- yes --> D\nA -->|again| C\n");
    assert_eq!(
        edge_ids(&model),
        vec!["L_A_C_0", "L_B_C_0", "L_C_D_0", "L_A_C_1"]
    );
    assert_eq!(model.edges[2].label.as_deref(), Some("yes"));
    assert_eq!(model.edges[3].label.as_deref(), Some("again"));
}

#[test]
fn flowchart_link_variants() {
    let model = parse("flowchart LR\nA -.-> B\nB ==> C\nC --- D\nD <--> E\nE ~~~ F\nF --o G\n");
    let summary: Vec<_> = model
        .edges
        .iter()
        .map(|e| (e.start, e.end, e.stroke))
        .collect();
    assert_eq!(
        summary,
        vec![
            (Arrowhead::None, Arrowhead::Point, Stroke::Dotted),
            (Arrowhead::None, Arrowhead::Point, Stroke::Thick),
            (Arrowhead::None, Arrowhead::None, Stroke::Normal),
            (Arrowhead::Point, Arrowhead::Point, Stroke::Normal),
            (Arrowhead::None, Arrowhead::None, Stroke::Invisible),
            (Arrowhead::None, Arrowhead::Circle, Stroke::Normal),
        ]
    );
}

#[test]
fn flowchart_vertex_shapes() {
    let model = parse("flowchart LR\nA((c)) --> B{d} --> C[(db)] --> D>odd] --> E{{hex}} --> F[/lean/]\n");
    let shapes: Vec<_> = model.nodes.iter().map(|n| n.shape).collect();
    assert_eq!(
        shapes,
        vec![
            NodeShape::Circle,
            NodeShape::Diamond,
            NodeShape::Cylinder,
            NodeShape::Odd,
            NodeShape::Hexagon,
            NodeShape::LeanRight,
        ]
    );
    assert_eq!(model.node("C").unwrap().label, "db");
}

#[test]
fn flowchart_quoted_label_may_contain_closers() {
    let model = parse("flowchart LR\nA[\"a [b] c\"]\n");
    assert_eq!(model.node("A").unwrap().label, "a [b] c");
}

#[test]
fn flowchart_subgraphs_nest_and_link() {
    let text = r#"flowchart TB
  c1-->a2
  subgraph one
    a1-->a2
  end
  subgraph two [Second]
    direction LR
    b1-->b2
    subgraph inner
      x
    end
  end
  one --> two
"#;
    let model = parse(text);
    assert_eq!(model.entity_ids(), vec!["c1", "a2", "a1", "b1", "b2", "x", "one", "inner", "two"]);

    let one = model.subgraph("one").unwrap();
    assert_eq!(one.nodes, vec!["a1", "a2"]);
    let two = model.subgraph("two").unwrap();
    assert_eq!(two.title, "Second");
    assert_eq!(two.direction.as_deref(), Some("LR"));
    assert_eq!(two.nodes, vec!["b1", "b2", "inner"]);
    assert_eq!(model.subgraph("inner").unwrap().parent.as_deref(), Some("two"));
    assert_eq!(model.subgraph_of("x").map(|s| s.id.as_str()), Some("inner"));
    assert!(model.is_valid());
}

#[test]
fn flowchart_quoted_subgraph_title_gets_generated_id() {
    let model = parse("flowchart TB\nsubgraph \"My Group\"\n  a\nend\n");
    let sub = &model.subgraphs[0];
    assert_eq!(sub.id, "subGraph0");
    assert_eq!(sub.title, "My Group");
}

#[test]
fn flowchart_unclosed_subgraph_is_grammar_error() {
    let err = flowchart::parse("flowchart TB\nsubgraph one\n  a\n", &Config::default()).unwrap_err();
    let Error::Grammar(err) = err else {
        panic!("expected a grammar error");
    };
    assert!(err.expected.contains(&"`end`".to_string()), "{:?}", err.expected);
}

#[test]
fn flowchart_styling_and_interaction() {
    let text = r#"flowchart LR
A --> B
classDef hot fill:#f00,stroke:#333
class A,B hot
style A color:red
linkStyle 0 stroke:#0f0
click A "https://example.com" "Tip" _blank
click B call doIt(1, 2)
A:::cold
"#;
    let model = parse(text);
    assert_eq!(model.class_defs["hot"], vec!["fill:#f00", "stroke:#333"]);

    let a = model.node("A").unwrap();
    assert_eq!(a.classes, vec!["hot", "cold"]);
    assert_eq!(a.styles, vec!["color:red"]);
    assert_eq!(a.link.as_deref(), Some("https://example.com"));
    assert_eq!(a.link_target.as_deref(), Some("_blank"));
    assert_eq!(a.tooltip.as_deref(), Some("Tip"));

    let b = serde_json::to_value(model.node("B").unwrap()).unwrap();
    assert_eq!(b["callback"], json!({ "function": "doIt", "args": "1, 2" }));
    assert_eq!(model.edges[0].styles, vec!["stroke:#0f0"]);
}

#[test]
fn flowchart_link_style_out_of_bounds() {
    let err = flowchart::parse("flowchart LR\nA-->B\nlinkStyle 3 stroke:red\n", &Config::default())
        .unwrap_err();
    assert!(matches!(err, Error::Canonicalization { notation: "flowchart", .. }));
    assert!(err.to_string().contains("out of bounds"));
}

#[test]
fn flowchart_comments_and_terminators() {
    let model = parse("%% leading\nflowchart LR\nA-->B; B-->C %% trailing\n%% own line\nC-->D\n");
    assert_eq!(edge_ids(&model), vec!["L_A_B_0", "L_B_C_0", "L_C_D_0"]);
}

#[test]
fn flowchart_parse_is_deterministic() {
    let text = "flowchart LR\nA & B --> C\nsubgraph s\n  C --> D\nend\nclass D x\n";
    let first = parse(text);
    let second = parse(text);
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn flowchart_single_dash_arrow() {
    let model = parse("flowchart LR\nA->B\nB -> C\nC->|yes|D\n");
    assert_eq!(model.entity_ids(), vec!["A", "B", "C", "D"]);
    let ends: Vec<_> = model
        .edges
        .iter()
        .map(|e| (e.from.as_str(), e.to.as_str(), e.end, e.stroke, e.length))
        .collect();
    assert_eq!(
        ends,
        vec![
            ("A", "B", Arrowhead::Point, Stroke::Normal, 1),
            ("B", "C", Arrowhead::Point, Stroke::Normal, 1),
            ("C", "D", Arrowhead::Point, Stroke::Normal, 1),
        ]
    );
    assert_eq!(model.edges[2].label.as_deref(), Some("yes"));
    assert!(model.is_valid());
}

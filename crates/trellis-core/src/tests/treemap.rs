use crate::diagrams::treemap::{self, TreemapModel};
use crate::*;

fn parse(text: &str) -> TreemapModel {
    treemap::parse(text, &Config::default()).unwrap()
}

#[test]
fn treemap_sections_sum_their_leaves() {
    let text = r#"treemap-beta
title Budget
"Section 1"
    "Leaf 1.1": 12
    "Section 1.2":::hot
      "Leaf 1.2.1": 12
"Section 2"
    "Leaf 2.1": 20.5
classDef hot fill:#f00,stroke:#333;
"#;
    let model = parse(text);
    assert_eq!(model.title.as_deref(), Some("Budget"));
    assert_eq!(model.entity_ids().len(), 6);

    let section = model.node("Section 1").unwrap();
    assert!(!section.is_leaf);
    assert_eq!(section.value, 24.0);
    assert_eq!(model.node("Section 1.2").unwrap().value, 12.0);
    assert_eq!(model.node("Section 2").unwrap().value, 20.5);
    assert_eq!(model.total(), 44.5);

    let roots: Vec<_> = model.roots().map(|n| n.name.as_str()).collect();
    assert_eq!(roots, vec!["Section 1", "Section 2"]);
    let children: Vec<_> = model.children(0).map(|n| n.name.as_str()).collect();
    assert_eq!(children, vec!["Leaf 1.1", "Section 1.2"]);

    assert_eq!(model.node("Section 1.2").unwrap().class_name.as_deref(), Some("hot"));
    assert_eq!(model.class_defs["hot"], vec!["fill:#f00", "stroke:#333"]);
    assert!(model.is_valid());
}

#[test]
fn treemap_undefined_class_is_a_violation() {
    let model = parse("treemap\n\"A\": 1:::missing\n");
    assert!(matches!(
        model.violations().as_slice(),
        [Violation::UnknownGroup { .. }]
    ));
}

#[test]
fn treemap_negative_value_is_error() {
    let err = treemap::parse("treemap\n\"A\"\n  \"B\": -3\n", &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Canonicalization { notation: "treemap", .. }));
    assert_eq!(err.position().map(|p| p.line), Some(3));
}

#[test]
fn treemap_unquoted_item_is_grammar_error() {
    let err = treemap::parse("treemap\nLeaf: 3\n", &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Grammar(_)));
}

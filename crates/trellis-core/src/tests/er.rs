use crate::diagrams::er::{self, Cardinality, RelationshipKind};
use crate::*;
use serde_json::json;

fn parse(text: &str) -> diagrams::er::ErModel {
    er::parse(text, &Config::default()).unwrap()
}

#[test]
fn er_relationship_creates_both_entities() {
    let model = parse("erDiagram\nCUSTOMER ||--o{ ORDER");
    assert_eq!(model.entity_ids(), vec!["CUSTOMER", "ORDER"]);
    assert_eq!(model.relationships.len(), 1);
    let rel = &model.relationships[0];
    assert_eq!(rel.cardinality_from, Cardinality::One);
    assert_eq!(rel.cardinality_to, Cardinality::ZeroOrMore);
    assert_eq!(rel.kind, RelationshipKind::NonIdentifying);
    assert!(model.is_valid());

    let value = serde_json::to_value(rel).unwrap();
    assert_eq!(value["cardinalityFrom"], json!("one"));
    assert_eq!(value["cardinalityTo"], json!("zero_or_more"));
    assert_eq!(value["kind"], json!("non_identifying"));
}

#[test]
fn er_dotted_line_is_identifying_and_keeps_label() {
    let model = parse("erDiagram\nA ||--|{ B : places\nB }o..o| C\n");
    assert_eq!(model.entity_ids(), vec!["A", "B", "C"]);
    assert_eq!(model.relationships[0].label, "places");
    assert_eq!(model.relationships[0].cardinality_to, Cardinality::OneOrMore);
    let second = &model.relationships[1];
    assert_eq!(second.kind, RelationshipKind::Identifying);
    assert_eq!(second.cardinality_from, Cardinality::ZeroOrMore);
    assert_eq!(second.cardinality_to, Cardinality::ZeroOrOne);
    assert_eq!(second.label, "");
}

#[test]
fn er_word_cardinalities() {
    let model = parse("erDiagram\nPERSON only one to zero or more CAR : drives\n");
    let rel = &model.relationships[0];
    assert_eq!((rel.from.as_str(), rel.to.as_str()), ("PERSON", "CAR"));
    assert_eq!(rel.cardinality_from, Cardinality::One);
    assert_eq!(rel.cardinality_to, Cardinality::ZeroOrMore);
    assert_eq!(rel.label, "drives");
}

#[test]
fn er_alias_and_attributes() {
    let text = r#"erDiagram
foo["bar"] {
  string title PK, FK "comment"
}
"#;
    let model = parse(text);
    let value = serde_json::to_value(model.entity("foo").unwrap()).unwrap();
    assert_eq!(value["alias"], json!("bar"));
    assert_eq!(value["label"], json!("bar"));
    assert_eq!(
        value["attributes"],
        json!([{
            "dataType": "string",
            "name": "title",
            "keys": ["PK", "FK"],
            "comment": "comment"
        }])
    );
}

#[test]
fn er_repeated_blocks_merge_attributes() {
    let text = "erDiagram\nBOOK {}\nBOOK {\n  string title\n}\nBOOK{\n  string author\n}\n";
    let model = parse(text);
    assert_eq!(model.entities.len(), 1);
    let names: Vec<_> = model.entities[0]
        .attributes
        .iter()
        .map(|a| a.name.as_str())
        .collect();
    assert_eq!(names, vec!["title", "author"]);
}

#[test]
fn er_class_and_style_statements() {
    let text = "erDiagram\nA\nclassDef hot fill:#f00\nclass A hot\nstyle B stroke:#333\n";
    let model = parse(text);
    assert_eq!(model.entity_ids(), vec!["A", "B"]);
    assert_eq!(model.entity("A").unwrap().classes, vec!["hot"]);
    assert_eq!(model.entity("B").unwrap().styles, vec!["stroke:#333"]);
    assert_eq!(model.class_defs["hot"], vec!["fill:#f00"]);
}

#[test]
fn er_truncated_relationship_is_grammar_error() {
    let err = er::parse("erDiagram\nA ||--\n", &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Grammar(_)));
    assert_eq!(err.position().map(|p| p.line), Some(2));
}

#[test]
fn er_unknown_cardinality_is_canonicalization_error() {
    let err = er::parse("erDiagram\nA {|--|| B\n", &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Canonicalization { notation: "er", .. }));
}

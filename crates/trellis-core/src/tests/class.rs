use crate::diagrams::class::{self, ClassModel, Classifier, LineKind, RelationEnd, Visibility};
use crate::*;
use serde_json::json;

fn parse(text: &str) -> ClassModel {
    class::parse(text, &Config::default()).unwrap()
}

#[test]
fn class_bodies_and_member_lines_accumulate() {
    let text = r#"classDiagram
class Animal {
  <<abstract>>
  +int age
  +isMammal() bool
  +mate()*
}
Animal <|-- Duck
Animal : +String gender
Duck : +swim()
"#;
    let model = parse(text);
    assert_eq!(model.entity_ids(), vec!["Animal", "Duck"]);

    let animal = model.class("Animal").unwrap();
    assert_eq!(animal.annotations, vec!["abstract"]);
    let attrs: Vec<_> = animal.attributes.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(attrs, vec!["int age", "String gender"]);
    let methods: Vec<_> = animal.methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(methods, vec!["isMammal", "mate"]);
    assert_eq!(animal.methods[0].return_type.as_deref(), Some("bool"));
    assert_eq!(animal.methods[1].classifier, Some(Classifier::Abstract));
    assert_eq!(animal.attributes[0].visibility, Some(Visibility::Public));

    let rel = &model.relations[0];
    assert_eq!((rel.from.as_str(), rel.to.as_str()), ("Animal", "Duck"));
    assert_eq!((rel.from_end, rel.to_end, rel.line), (RelationEnd::Extension, RelationEnd::None, LineKind::Solid));
    assert_eq!(model.class("Duck").unwrap().methods[0].name, "swim");
    assert!(model.is_valid());
}

#[test]
fn class_generics_and_labels() {
    let model = parse("classDiagram\nclass Square~Shape~{\n  int id\n}\nclass Box~T~[\"Label\"]\n");
    let square = model.class("Square").unwrap();
    assert_eq!(square.generic.as_deref(), Some("Shape"));
    assert_eq!(square.label, "Square<Shape>");
    let boxed = model.class("Box").unwrap();
    assert_eq!(boxed.generic.as_deref(), Some("T"));
    assert_eq!(boxed.label, "Label");
}

#[test]
fn class_relation_variants() {
    let text = "classDiagram\nCustomer \"1\" --> \"*\" Ticket : owns\nA ..|> B\nC ()-- D\nE --* F\nG o-- H\n";
    let model = parse(text);
    let first = serde_json::to_value(&model.relations[0]).unwrap();
    assert_eq!(
        first,
        json!({
            "from": "Customer",
            "to": "Ticket",
            "fromEnd": "none",
            "toEnd": "dependency",
            "line": "solid",
            "fromCardinality": "1",
            "toCardinality": "*",
            "label": "owns"
        })
    );
    let ends: Vec<_> = model.relations[1..]
        .iter()
        .map(|r| (r.from_end, r.to_end, r.line))
        .collect();
    assert_eq!(
        ends,
        vec![
            (RelationEnd::None, RelationEnd::Extension, LineKind::Dotted),
            (RelationEnd::Lollipop, RelationEnd::None, LineKind::Solid),
            (RelationEnd::None, RelationEnd::Composition, LineKind::Solid),
            (RelationEnd::Aggregation, RelationEnd::None, LineKind::Solid),
        ]
    );
}

#[test]
fn class_namespaces_collect_declared_classes() {
    let model = parse("classDiagram\nnamespace Shapes {\n  class Triangle\n  class Square\n}\nSquare <|-- Cube\n");
    assert_eq!(model.namespaces.len(), 1);
    assert_eq!(model.namespaces[0].classes, vec!["Triangle", "Square"]);
    assert_eq!(model.class("Square").unwrap().namespace.as_deref(), Some("Shapes"));
    assert_eq!(model.class("Cube").unwrap().namespace, None);
    assert!(model.is_valid());
}

#[test]
fn class_notes_and_styling() {
    let text = r#"classDiagram
direction LR
class A
note for A "a note"
note "free"
cssClass "A,B" hot
classDef hot fill:#f00
style A stroke:#333
"#;
    let model = parse(text);
    assert_eq!(model.direction, "LR");
    assert_eq!(model.entity_ids(), vec!["A", "B"]);
    assert_eq!(model.notes[0].target.as_deref(), Some("A"));
    assert_eq!(model.notes[1].target, None);
    assert_eq!(model.notes[1].text, "free");
    assert_eq!(model.class("B").unwrap().css_classes, vec!["hot"]);
    assert_eq!(model.class("A").unwrap().styles, vec!["stroke:#333"]);
    assert_eq!(model.class_defs["hot"], vec!["fill:#f00"]);
}

#[test]
fn class_unclosed_body_is_grammar_error() {
    let err = class::parse("classDiagram\nclass A {\n  int x\n", &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Grammar(_)));
}

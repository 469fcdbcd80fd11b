use crate::diagrams::pie::{self, PieModel};
use crate::*;
use serde_json::json;

fn parse(text: &str) -> PieModel {
    pie::parse(text, &Config::default()).unwrap()
}

#[test]
fn pie_show_data_and_slices() {
    let model = parse("pie showData\n \"Cats\": 2\n 'Dogs': 3.5\n");
    assert_eq!(
        serde_json::to_value(&model).unwrap(),
        json!({
            "showData": true,
            "title": null,
            "slices": [
                { "label": "Cats", "value": 2.0 },
                { "label": "Dogs", "value": 3.5 }
            ],
            "acc": {}
        })
    );
    assert_eq!(model.total(), 5.5);
    assert!(model.is_valid());
}

#[test]
fn pie_title_on_header_or_own_line() {
    assert_eq!(parse("pie title Pets\n\"a\": 1\n").title.as_deref(), Some("Pets"));
    let model = parse("pie showData title Pets\n\"a\": 1\n");
    assert!(model.show_data);
    assert_eq!(model.title.as_deref(), Some("Pets"));

    let model = parse("pie\ntitle Key elements\naccTitle: Pets\naccDescr: Share of pets\n\"a\": 1\n");
    assert_eq!(model.title.as_deref(), Some("Key elements"));
    assert_eq!(model.acc.title.as_deref(), Some("Pets"));
    assert_eq!(model.acc.description.as_deref(), Some("Share of pets"));
}

#[test]
fn pie_duplicate_label_keeps_first_value() {
    let model = parse("pie\n\"a\": 1\n\"b\": 2\n\"a\": 9\n");
    assert_eq!(model.entity_ids(), vec!["a", "b"]);
    assert_eq!(model.slice("a").unwrap().value, 1.0);
}

#[test]
fn pie_negative_value_is_error() {
    let err = pie::parse("pie\n\"a\": -1\n", &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Canonicalization { notation: "pie", .. }));
    assert_eq!(err.position().map(|p| p.line), Some(2));
}

#[test]
fn pie_missing_colon_is_grammar_error() {
    let err = pie::parse("pie\n\"a\" 1\n", &Config::default()).unwrap_err();
    let Error::Grammar(err) = err else {
        panic!("expected a grammar error");
    };
    assert_eq!(err.position.line, 2);
}

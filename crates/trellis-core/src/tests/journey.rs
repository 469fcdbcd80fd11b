use crate::diagrams::journey::{self, JourneyModel};
use crate::*;

fn parse(text: &str) -> JourneyModel {
    journey::parse(text, &Config::default()).unwrap()
}

#[test]
fn journey_tasks_scores_and_actors() {
    let text = r#"journey
title My working day
section Go to work
  Make tea: 5: Me
  Go upstairs: 3: Me, Cat
section Go home
  Sit down: 2
"#;
    let model = parse(text);
    assert_eq!(model.title.as_deref(), Some("My working day"));
    assert_eq!(model.sections, vec!["Go to work", "Go home"]);
    assert_eq!(model.actors, vec!["Me", "Cat"]);

    let tasks: Vec<_> = model
        .tasks
        .iter()
        .map(|t| (t.id.as_str(), t.name.as_str(), t.score, t.section.as_deref()))
        .collect();
    assert_eq!(
        tasks,
        vec![
            ("task0", "Make tea", 5, Some("Go to work")),
            ("task1", "Go upstairs", 3, Some("Go to work")),
            ("task2", "Sit down", 2, Some("Go home")),
        ]
    );
    assert_eq!(model.task("task1").unwrap().people, vec!["Me", "Cat"]);
    let cat: Vec<_> = model.tasks_of("Cat").map(|t| t.name.as_str()).collect();
    assert_eq!(cat, vec!["Go upstairs"]);
    assert!(model.is_valid());
}

#[test]
fn journey_score_out_of_range_is_error() {
    let err = journey::parse("journey\nsection s\nTask: 7: Me\n", &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Canonicalization { notation: "journey", .. }));
    assert!(err.to_string().contains("between 1 and 5"));
    assert_eq!(err.position().map(|p| p.line), Some(3));
}

#[test]
fn journey_missing_score_is_grammar_error() {
    let err = journey::parse("journey\nTask: Me\n", &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Grammar(_)));
}

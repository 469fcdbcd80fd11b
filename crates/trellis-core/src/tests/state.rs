use crate::diagrams::state::{self, NotePosition, StateKind, StateModel};
use crate::*;

fn parse(text: &str) -> StateModel {
    state::parse(text, &Config::default()).unwrap()
}

#[test]
fn state_start_and_end_markers_resolve_per_scope() {
    let text = r#"stateDiagram-v2
state Still
state Moving
[*] --> Still
Still --> Moving : push
Moving --> [*]
"#;
    let model = parse(text);
    assert_eq!(model.entity_ids(), vec!["Still", "Moving", "root_start", "root_end"]);
    assert_eq!(model.state("root_start").unwrap().kind, StateKind::Start);
    assert_eq!(model.state("root_end").unwrap().kind, StateKind::End);

    let edges: Vec<_> = model
        .transitions
        .iter()
        .map(|t| (t.from.as_str(), t.to.as_str(), t.label.as_deref()))
        .collect();
    assert_eq!(
        edges,
        vec![
            ("root_start", "Still", None),
            ("Still", "Moving", Some("push")),
            ("Moving", "root_end", None),
        ]
    );
    assert!(model.is_valid());
}

#[test]
fn state_transition_to_undeclared_state_is_invalid() {
    let model = parse("stateDiagram-v2\nstate A\nA --> B\n");
    let b = model.state("B").unwrap();
    assert!(!b.declared);
    assert_eq!(b.label, "B");
    assert!(!model.is_valid());
    assert!(
        model
            .violations()
            .iter()
            .any(|v| matches!(v, Violation::DanglingEndpoint { missing, .. } if missing == "B"))
    );
}

#[test]
fn state_descriptions_and_bare_lines_declare() {
    let model = parse("stateDiagram\nA : waiting\nA : still waiting\nA --> B\nB\n");
    assert_eq!(model.state("A").unwrap().descriptions, vec!["waiting", "still waiting"]);
    assert!(model.state("B").unwrap().declared);
    assert!(model.is_valid());
}

#[test]
fn state_composite_with_concurrent_regions() {
    let text = r#"stateDiagram-v2
[*] --> Active
state Active {
  direction LR
  [*] --> Working
  Working : busy
  --
  Idle : resting
  [*] --> Idle
}
Active --> [*]
"#;
    let model = parse(text);
    let active = model.state("Active").unwrap();
    assert_eq!(active.kind, StateKind::Composite);
    assert_eq!(active.regions, 2);
    assert_eq!(active.direction.as_deref(), Some("LR"));

    let children: Vec<_> = model
        .children("Active")
        .map(|s| (s.id.as_str(), s.region))
        .collect();
    assert_eq!(children, vec![("Active_start", 0), ("Working", 0), ("Idle", 1)]);
    assert_eq!(model.transitions[1].parent.as_deref(), Some("Active"));
    assert_eq!(model.transitions.last().unwrap().to, "root_end");
    assert!(model.is_valid());
}

#[test]
fn state_pseudo_states_labels_and_notes() {
    let text = r#"stateDiagram-v2
state fork_state <<fork>>
state "Long name" as LN
state C <<choice>>
note left of LN : a note
note right of C
  multi
  line
end note
"#;
    let model = parse(text);
    assert_eq!(model.state("fork_state").unwrap().kind, StateKind::Fork);
    assert_eq!(model.state("C").unwrap().kind, StateKind::Choice);
    assert_eq!(model.state("LN").unwrap().label, "Long name");

    assert_eq!(model.notes[0].position, NotePosition::LeftOf);
    assert_eq!(model.notes[0].text, "a note");
    assert_eq!(model.notes[1].target, "C");
    assert!(model.notes[1].text.starts_with("multi"));
    assert!(model.notes[1].text.ends_with("line"));
}

#[test]
fn state_styling() {
    let model = parse(
        "stateDiagram-v2\nclassDef bad fill:#f00\nstate A\nstate B\nA:::bad --> B:::bad\nclass A other\nstyle B stroke:#333\n",
    );
    assert_eq!(model.class_defs["bad"], vec!["fill:#f00"]);
    assert_eq!(model.state("A").unwrap().classes, vec!["bad", "other"]);
    assert_eq!(model.state("B").unwrap().styles, vec!["stroke:#333"]);
}

#[test]
fn state_structural_errors() {
    let err = state::parse("stateDiagram-v2\n--\n", &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Canonicalization { notation: "state", .. }));

    let err = state::parse("stateDiagram-v2\nstate F <<fork>> {\n}\n", &Config::default()).unwrap_err();
    assert!(err.to_string().contains("pseudo-state"));

    let err = state::parse("stateDiagram-v2\nstate X {\n  A\n", &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Grammar(_)));
}

#[test]
fn state_transition_endpoints_are_placed_in_their_scope() {
    let model = parse("stateDiagram-v2\n[*] --> A\nstate C {\n  [*] --> D\n}\n");
    let ids: Vec<_> = model.states.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["root_start", "A", "C", "C_start", "D"]);

    let a = model.state("A").unwrap();
    assert_eq!(a.parent, None);
    assert!(!a.declared);
    let d = model.state("D").unwrap();
    assert_eq!(d.parent.as_deref(), Some("C"));
    assert!(!d.declared);

    let missing: Vec<_> = model
        .violations()
        .into_iter()
        .filter_map(|v| match v {
            Violation::DanglingEndpoint { missing, .. } => Some(missing),
            _ => None,
        })
        .collect();
    assert_eq!(missing, vec!["A", "D"]);
}

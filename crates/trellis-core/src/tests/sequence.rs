use crate::diagrams::sequence::{
    self, ArrowKind, Autonumber, FragmentKind, NotePlacement, ParticipantKind, SequenceModel,
};
use crate::*;
use serde_json::json;

fn parse(text: &str) -> SequenceModel {
    sequence::parse(text, &Config::default()).unwrap()
}

#[test]
fn sequence_activation_suffix_binds_to_arrow() {
    let model = parse("sequenceDiagram\nAlice->>+John: Hello\nJohn-->>-Alice: Hi\n");
    assert_eq!(model.entity_ids(), vec!["Alice", "John"]);

    let first = &model.messages[0];
    assert_eq!((first.from.as_str(), first.to.as_str()), ("Alice", "John"));
    assert_eq!(first.arrow, ArrowKind::Solid);
    assert!(first.activate);

    let second = &model.messages[1];
    assert_eq!(second.arrow, ArrowKind::Dotted);
    assert!(second.deactivate);

    let windows = serde_json::to_value(&model.activations).unwrap();
    assert_eq!(windows, json!([{ "participant": "John", "start": 0, "end": 1 }]));
    assert!(model.is_valid());
}

#[test]
fn sequence_explicit_activation_left_open_closes_at_end() {
    let model = parse("sequenceDiagram\nA->>B: one\nactivate B\nB->>A: two\nA->>B: three\n");
    let windows: Vec<_> = model.activations_of("B").map(|a| (a.start, a.end)).collect();
    assert_eq!(windows, vec![(0, 2)]);
}

#[test]
fn sequence_unbalanced_deactivate_is_error() {
    let err = sequence::parse("sequenceDiagram\nA->>B: x\ndeactivate B\n", &Config::default())
        .unwrap_err();
    assert!(matches!(err, Error::Canonicalization { notation: "sequence", .. }));
    assert_eq!(err.position().map(|p| p.line), Some(3));
}

#[test]
fn sequence_participants_keep_declared_alias() {
    let model = parse("sequenceDiagram\nactor A as Alice\nparticipant B as Bob\nA->>B: hi\nparticipant A\n");
    let a = model.participant("A").unwrap();
    assert_eq!(a.kind, ParticipantKind::Actor);
    assert_eq!(a.label, "Alice");
    assert_eq!(model.participant("B").unwrap().label, "Bob");
}

#[test]
fn sequence_fragments_nest_with_sections() {
    let text = r#"sequenceDiagram
loop Every minute
  A->>B: ping
  alt ok
    B->>A: pong
  else failed
    B-xA: error
  end
end
opt extra
  A-)B: async
end
"#;
    let model = parse(text);
    let kinds: Vec<_> = model.fragments.iter().map(|f| (f.kind, f.parent, f.start, f.end)).collect();
    assert_eq!(
        kinds,
        vec![
            (FragmentKind::Loop, None, 0, 3),
            (FragmentKind::Alt, Some(0), 1, 3),
            (FragmentKind::Opt, None, 3, 4),
        ]
    );
    let sections: Vec<_> = model.fragments[1]
        .sections
        .iter()
        .map(|s| (s.label.as_str(), s.start, s.end))
        .collect();
    assert_eq!(sections, vec![("ok", 1, 2), ("failed", 2, 3)]);
    assert_eq!(model.messages[2].arrow, ArrowKind::SolidCross);
    assert_eq!(model.messages[3].arrow, ArrowKind::SolidPoint);
}

#[test]
fn sequence_unclosed_fragment_is_grammar_error() {
    let err = sequence::parse("sequenceDiagram\nloop x\nA->>B: y\n", &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Grammar(_)));
}

#[test]
fn sequence_notes() {
    let model = parse("sequenceDiagram\nA->>B: x\nNote over A,B: shared\nnote left of A: aside\n");
    assert_eq!(model.notes[0].placement, NotePlacement::Over);
    assert_eq!(model.notes[0].actors, vec!["A", "B"]);
    assert_eq!(model.notes[0].after_messages, 1);
    assert_eq!(model.notes[1].placement, NotePlacement::LeftOf);
    assert_eq!(model.notes[1].text, "aside");

    let err = sequence::parse("sequenceDiagram\nNote right of A,B: no\n", &Config::default());
    assert!(err.is_err());
}

#[test]
fn sequence_autonumber_start_step_and_off() {
    let model = parse("sequenceDiagram\nautonumber 10 5\nA->>B: a\nA->>B: b\nautonumber off\nA->>B: c\n");
    let numbers: Vec<_> = model.messages.iter().map(|m| m.number).collect();
    assert_eq!(numbers, vec![Some(10), Some(15), None]);
    assert_eq!(model.autonumber, Some(Autonumber { start: 10, step: 5 }));
}

#[test]
fn sequence_boxes_group_participants() {
    let model = parse("sequenceDiagram\nbox Aqua Team\nparticipant A\nparticipant B\nend\nparticipant C\nA->>C: x\n");
    let value = serde_json::to_value(&model.boxes).unwrap();
    assert_eq!(
        value,
        json!([{ "title": "Team", "color": "Aqua", "participants": ["A", "B"] }])
    );
    assert_eq!(model.participant("A").unwrap().in_box, Some(0));
    assert_eq!(model.participant("C").unwrap().in_box, None);
}

#[test]
fn sequence_nested_boxes_are_rejected() {
    let err = sequence::parse(
        "sequenceDiagram\nbox Outer\nbox Inner\nparticipant A\nend\nend\n",
        &Config::default(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("nested"));
}

#[test]
fn sequence_create_and_destroy() {
    let model = parse("sequenceDiagram\nA->>B: hi\ncreate participant C\nA->>C: new\ndestroy C\nC->>A: bye\n");
    let c = model.participant("C").unwrap();
    assert_eq!(c.created_at, Some(1));
    assert_eq!(c.destroyed_at, Some(2));

    let err = sequence::parse(
        "sequenceDiagram\ncreate participant C\nA->>B: unrelated\n",
        &Config::default(),
    );
    assert!(err.is_err());
}

#[test]
fn sequence_title_and_config() {
    let config = Config::from_value(json!({ "sequence": { "mirrorActors": true } }));
    let model = sequence::parse("sequenceDiagram\ntitle: Checkout\nA->>B: go\n", &config).unwrap();
    assert_eq!(model.title.as_deref(), Some("Checkout"));
    assert!(model.mirror_actors);
}

#[test]
fn sequence_autonumber_overflow_is_error() {
    let text = "sequenceDiagram\nautonumber 18446744073709551615 1\nA->>B: last\nA->>B: one too many\n";
    let err = sequence::parse(text, &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Canonicalization { notation: "sequence", .. }));
    assert_eq!(err.position().map(|p| p.line), Some(4));

    let model = parse("sequenceDiagram\nautonumber 18446744073709551615 1\nA->>B: last\n");
    assert_eq!(model.messages[0].number, Some(u64::MAX));
}

#[test]
fn sequence_dotted_arrow_minus_suffix_deactivates_sender() {
    let model = parse("sequenceDiagram\nA->>B: x\nactivate B\nB-->>-A: y\nA->>B: z\n");
    assert_eq!(model.entity_ids(), vec!["A", "B"]);

    let reply = &model.messages[1];
    assert_eq!((reply.from.as_str(), reply.to.as_str()), ("B", "A"));
    assert_eq!(reply.arrow, ArrowKind::Dotted);
    assert!(reply.deactivate);
    assert!(!reply.activate);

    let windows: Vec<_> = model.activations_of("B").map(|a| (a.start, a.end)).collect();
    assert_eq!(windows, vec![(0, 1)]);
    assert!(model.is_valid());
}

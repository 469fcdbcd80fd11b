use crate::diagrams::requirement::{
    self, RelationshipType, RequirementKind, RequirementModel, Risk, VerifyMethod,
};
use crate::*;
use serde_json::json;

fn parse(text: &str) -> RequirementModel {
    requirement::parse(text, &Config::default()).unwrap()
}

const SYSTEM: &str = r#"requirementDiagram
requirement test_req {
  id: 1
  text: "the test text."
  risk: high
  verifymethod: test
}
functionalRequirement "Login Flow":::important {
  id: 1.1
  text: users log in
}
element test_entity {
  type: simulation
  docref: reqs/test.md
}
test_entity - satisfies -> test_req
test_req <- contains - "Login Flow"
classDef important fill:#f96
style test_req stroke:red
"#;

#[test]
fn requirement_definitions_and_relationships() {
    let model = parse(SYSTEM);
    assert_eq!(model.entity_ids(), vec!["test_req", "Login Flow", "test_entity"]);

    let req = model.requirement("test_req").unwrap();
    assert_eq!(req.kind, RequirementKind::Requirement);
    assert_eq!(req.requirement_id, "1");
    assert_eq!(req.text, "the test text.");
    assert_eq!(req.risk, Some(Risk::High));
    assert_eq!(req.verify_method, Some(VerifyMethod::Test));
    assert_eq!(req.styles, vec!["stroke:red"]);

    let login = model.requirement("Login Flow").unwrap();
    assert_eq!(login.kind, RequirementKind::FunctionalRequirement);
    assert_eq!(login.requirement_id, "1.1");
    assert_eq!(login.classes, vec!["important"]);

    let element = serde_json::to_value(model.element("test_entity").unwrap()).unwrap();
    assert_eq!(
        element,
        json!({
            "name": "test_entity",
            "elementType": "simulation",
            "docRef": "reqs/test.md",
            "classes": [],
            "styles": []
        })
    );

    let rels: Vec<_> = model
        .relationships
        .iter()
        .map(|r| (r.kind, r.src.as_str(), r.dst.as_str()))
        .collect();
    assert_eq!(
        rels,
        vec![
            (RelationshipType::Satisfies, "test_entity", "test_req"),
            (RelationshipType::Contains, "Login Flow", "test_req"),
        ]
    );
    assert_eq!(model.relationships_to("test_req").count(), 2);
    assert_eq!(model.relationships_from("test_entity").count(), 1);
    assert!(model.is_valid());
}

#[test]
fn requirement_relationship_to_undefined_node_is_a_violation() {
    let model = parse("requirementDiagram\nelement e {\n  type: doc\n}\ne - traces -> ghost\n");
    assert!(
        model
            .violations()
            .iter()
            .any(|v| matches!(v, Violation::DanglingEndpoint { missing, .. } if missing == "ghost"))
    );
}

#[test]
fn requirement_invalid_values_are_errors() {
    let err = requirement::parse(
        "requirementDiagram\nrequirement r {\n  risk: extreme\n}\n",
        &Config::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Canonicalization { notation: "requirement", .. }));
    assert_eq!(err.position().map(|p| p.line), Some(3));

    let err = requirement::parse(
        "requirementDiagram\nrequirement r {\n  id: 1\n}\nr - likes -> r\n",
        &Config::default(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("likes"));

    let err = requirement::parse(
        "requirementDiagram\nstyle ghost fill:#fff\n",
        &Config::default(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("ghost"));
}

#[test]
fn requirement_unclosed_body_is_grammar_error() {
    let err = requirement::parse("requirementDiagram\nrequirement r {\n  id: 1\n", &Config::default())
        .unwrap_err();
    assert!(matches!(err, Error::Grammar(_)));
}

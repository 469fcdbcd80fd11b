use crate::diagrams::c4::{self, C4Model, GLOBAL_BOUNDARY};
use crate::*;
use serde_json::json;

fn parse(text: &str) -> C4Model {
    c4::parse(text, &Config::default()).unwrap()
}

const CONTEXT: &str = r#"C4Context
title System Context diagram
Person(customerA, "Banking Customer A", "A customer of the bank.")
Enterprise_Boundary(b0, "BankBoundary0") {
  System(SystemAA, "Internet Banking System", "Allows customers to view information.")
  System_Boundary(b1, "BankBoundary") {
    SystemDb_Ext(SystemE, "Mainframe", $descr="Stores data")
  }
}
Container(web, "Web App", "Rust", "Serves pages", $tags="v1")
Rel(customerA, SystemAA, "Uses")
BiRel(SystemAA, SystemE, "Reads", "JDBC")
UpdateElementStyle(customerA, $fontColor="red", $bgColor="grey")
UpdateRelStyle(customerA, SystemAA, $textColor="blue", $offsetY="-10")
UpdateLayoutConfig($c4ShapeInRow="3", $c4BoundaryInRow="1")
"#;

#[test]
fn c4_elements_nest_in_boundaries() {
    let model = parse(CONTEXT);
    assert_eq!(model.c4_type, "C4Context");
    assert_eq!(model.title.as_deref(), Some("System Context diagram"));
    assert_eq!(
        model.entity_ids(),
        vec!["customerA", "SystemAA", "SystemE", "web", "b0", "b1"]
    );

    let parents: Vec<_> = model
        .elements
        .iter()
        .map(|e| (e.alias.as_str(), e.parent_boundary.as_str()))
        .collect();
    assert_eq!(
        parents,
        vec![
            ("customerA", GLOBAL_BOUNDARY),
            ("SystemAA", "b0"),
            ("SystemE", "b1"),
            ("web", GLOBAL_BOUNDARY),
        ]
    );
    let b1 = model.boundary("b1").unwrap();
    assert_eq!(b1.parent_boundary, "b0");
    assert_eq!(b1.boundary_type, "SYSTEM");
    assert_eq!(model.boundary("b0").unwrap().boundary_type, "ENTERPRISE");

    let inner: Vec<_> = model.elements_in("b1").map(|e| e.alias.as_str()).collect();
    assert_eq!(inner, vec!["SystemE"]);
    assert!(model.is_valid());
}

#[test]
fn c4_positional_and_named_arguments() {
    let model = parse(CONTEXT);
    let mainframe = model.element("SystemE").unwrap();
    assert_eq!(mainframe.shape, "external_system_db");
    assert_eq!(mainframe.description.as_deref(), Some("Stores data"));

    let web = model.element("web").unwrap();
    assert_eq!(web.shape, "container");
    assert_eq!(web.technology.as_deref(), Some("Rust"));
    assert_eq!(web.description.as_deref(), Some("Serves pages"));
    assert_eq!(web.tags.as_deref(), Some("v1"));
    assert_eq!(web.sprite, None);

    let person = serde_json::to_value(&model.element("customerA").unwrap().styles).unwrap();
    assert_eq!(person, json!({ "bgColor": "grey", "fontColor": "red" }));
}

#[test]
fn c4_relations_and_layout() {
    let model = parse(CONTEXT);
    let rels: Vec<_> = model
        .relations
        .iter()
        .map(|r| (r.kind.as_str(), r.from.as_str(), r.to.as_str(), r.label.as_str()))
        .collect();
    assert_eq!(
        rels,
        vec![
            ("rel", "customerA", "SystemAA", "Uses"),
            ("birel", "SystemAA", "SystemE", "Reads"),
        ]
    );
    assert_eq!(model.relations[1].technology.as_deref(), Some("JDBC"));
    let styles = serde_json::to_value(&model.relations[0].styles).unwrap();
    assert_eq!(styles, json!({ "textColor": "blue", "offsetY": "-10" }));
    assert_eq!(model.relations_from("SystemAA").count(), 1);
    assert_eq!(model.relations_to("SystemAA").count(), 1);

    assert_eq!(model.layout.shape_in_row, 3);
    assert_eq!(model.layout.boundary_in_row, 1);
}

#[test]
fn c4_layout_defaults_from_config() {
    let config = Config::from_value(json!({ "c4": { "c4ShapeInRow": 6 } }));
    let model = c4::parse("C4Container\nPerson(a, \"A\")\n", &config).unwrap();
    assert_eq!(model.c4_type, "C4Container");
    assert_eq!(model.layout.shape_in_row, 6);
    assert_eq!(model.layout.boundary_in_row, 2);
}

#[test]
fn c4_deployment_nodes() {
    let model = parse(
        "C4Deployment\nDeployment_Node(dc, \"Data center\", \"Ubuntu\", \"Main site\") {\n  Node_L(rack, \"Rack\")\n  {\n  }\n}\n",
    );
    let dc = model.boundary("dc").unwrap();
    assert_eq!(dc.node_type.as_deref(), Some("node"));
    assert_eq!(dc.boundary_type, "Ubuntu");
    assert_eq!(dc.description.as_deref(), Some("Main site"));
    let rack = model.boundary("rack").unwrap();
    assert_eq!(rack.node_type.as_deref(), Some("nodeL"));
    assert_eq!(rack.parent_boundary, "dc");
}

#[test]
fn c4_errors() {
    let err = c4::parse("C4Context\nPerson()\n", &Config::default()).unwrap_err();
    assert!(err.to_string().contains("alias"));

    let err = c4::parse("C4Context\nTeleport(a, b)\n", &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Canonicalization { notation: "c4", .. }));
    assert!(err.to_string().contains("Teleport"));

    let err = c4::parse("C4Context\nUpdateRelStyle(a, b, $textColor=\"red\")\n", &Config::default())
        .unwrap_err();
    assert!(err.to_string().contains("unknown relation"));

    let err = c4::parse("C4Context\nBoundary(b, \"B\") {\n  Person(p, \"P\")\n", &Config::default())
        .unwrap_err();
    assert!(matches!(err, Error::Grammar(_)));
}

use crate::diagrams::block::{self, BlockKind, BlockModel};
use crate::diagrams::flowchart::NodeShape;
use crate::*;

fn parse(text: &str) -> BlockModel {
    block::parse(text, &Config::default()).unwrap()
}

const GRID: &str = r#"block-beta
columns 3
a["Alpha"] b:2
space
block:grp:2
  columns 2
  c d
end
e<["go"]>(right, down)
a --> b
b -- "x" --> c
a --> b
block
  f(round)
end
classDef hot fill:#f00
class a hot
style b stroke:red
"#;

#[test]
fn block_grid_places_blocks_and_composites() {
    let model = parse(GRID);
    assert_eq!(model.columns, Some(3));
    assert_eq!(
        model.entity_ids(),
        vec!["a", "b", "space1-0", "grp", "c", "d", "e", "block1", "f"]
    );

    let roots: Vec<_> = model.roots().map(|b| b.id.as_str()).collect();
    assert_eq!(roots, vec!["a", "b", "space1-0", "grp", "e", "block1"]);

    let grp = model.block("grp").unwrap();
    assert_eq!(grp.kind, BlockKind::Composite);
    assert_eq!(grp.label, "");
    assert_eq!((grp.width, grp.columns), (2, Some(2)));
    assert_eq!(grp.children, vec!["c", "d"]);

    assert_eq!(model.block("a").unwrap().label, "Alpha");
    assert_eq!(model.block("b").unwrap().width, 2);
    assert_eq!(model.block("space1-0").unwrap().kind, BlockKind::Space);
    assert_eq!(model.block("f").unwrap().parent.as_deref(), Some("block1"));
    assert_eq!(model.block("f").unwrap().shape, NodeShape::Round);
    assert!(model.warnings.is_empty());
    assert!(model.is_valid());
}

#[test]
fn block_arrows_and_edges() {
    let model = parse(GRID);
    let arrow = model.block("e").unwrap();
    assert_eq!(arrow.kind, BlockKind::Arrow);
    assert_eq!(arrow.label, "go");
    assert_eq!(arrow.directions, vec!["right", "down"]);

    let edges: Vec<_> = model
        .edges
        .iter()
        .map(|e| (e.id.as_str(), e.label.as_deref()))
        .collect();
    assert_eq!(
        edges,
        vec![("1-a-b", None), ("1-b-c", Some("x")), ("2-a-b", None)]
    );
}

#[test]
fn block_styling() {
    let model = parse(GRID);
    assert_eq!(model.class_defs["hot"], vec!["fill:#f00"]);
    assert_eq!(model.block("a").unwrap().classes, vec!["hot"]);
    assert_eq!(model.block("b").unwrap().styles, vec!["stroke:red"]);
}

#[test]
fn block_wider_than_grid_warns() {
    let model = parse("block-beta\ncolumns 2\nwide:3\nspace:2\n");
    assert_eq!(model.warnings.len(), 1);
    assert!(model.warnings[0].contains("wide"));
    assert_eq!(model.block("space1-1").unwrap().kind, BlockKind::Space);
}

#[test]
fn block_errors() {
    let err = block::parse("block-beta\ne<[\"x\"]>(sideways)\n", &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Canonicalization { notation: "block", .. }));
    assert!(err.to_string().contains("sideways"));

    let err = block::parse("block-beta\nblock:g\n  a\n", &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Grammar(_)));
}

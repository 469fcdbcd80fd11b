use crate::diagrams::quadrant_chart::{self, QuadrantModel};
use crate::*;
use serde_json::json;

fn parse(text: &str) -> QuadrantModel {
    quadrant_chart::parse(text, &Config::default()).unwrap()
}

const CAMPAIGNS: &str = r#"quadrantChart
title Reach and engagement of campaigns
x-axis Low Reach --> High Reach
y-axis "Low Engagement"
quadrant-1 We should expand
quadrant-2 Need to promote
quadrant-3 Re-evaluate
quadrant-4 May be improved
Campaign A:::hot: [0.3, 0.6]
Campaign B: [0.75, 0.2] radius: 10, color: #ff3300
"Campaign: C": [1, 1]
classDef hot color: #f00
"#;

#[test]
fn quadrant_axes_and_quadrants() {
    let model = parse(CAMPAIGNS);
    assert_eq!(model.title.as_deref(), Some("Reach and engagement of campaigns"));
    assert_eq!(
        serde_json::to_value(&model.x_axis).unwrap(),
        json!({ "low": "Low Reach", "high": "High Reach" })
    );
    assert_eq!(model.y_axis.low.as_deref(), Some("Low Engagement"));
    assert_eq!(model.y_axis.high, None);
    assert_eq!(model.quadrants.q1.as_deref(), Some("We should expand"));
    assert_eq!(model.quadrants.q4.as_deref(), Some("May be improved"));
}

#[test]
fn quadrant_points_with_classes_and_styles() {
    let model = parse(CAMPAIGNS);
    assert_eq!(model.entity_ids(), vec!["Campaign A", "Campaign B", "Campaign: C"]);

    let a = model.point("Campaign A").unwrap();
    assert_eq!((a.x, a.y), (0.3, 0.6));
    assert_eq!(a.class_name.as_deref(), Some("hot"));
    assert_eq!(QuadrantModel::quadrant_of(a), 2);

    let b = model.point("Campaign B").unwrap();
    assert_eq!(b.styles, vec!["radius: 10", "color: #ff3300"]);
    assert_eq!(QuadrantModel::quadrant_of(b), 4);
    assert_eq!(QuadrantModel::quadrant_of(model.point("Campaign: C").unwrap()), 1);
    assert!(model.is_valid());
}

#[test]
fn quadrant_coordinate_out_of_range_is_error() {
    let err = quadrant_chart::parse("quadrantChart\nP: [1.2, 0.5]\n", &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Canonicalization { notation: "quadrantChart", .. }));
    assert!(err.to_string().contains("outside [0, 1]"));
    assert_eq!(err.position().map(|p| p.line), Some(2));
}

#[test]
fn quadrant_malformed_point_is_grammar_error() {
    let err = quadrant_chart::parse("quadrantChart\nP: [0.5]\n", &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Grammar(_)));
}

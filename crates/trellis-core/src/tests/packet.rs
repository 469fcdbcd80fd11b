use crate::diagrams::packet::{self, PacketModel};
use crate::*;
use serde_json::json;

fn parse(text: &str) -> PacketModel {
    packet::parse(text, &Config::default()).unwrap()
}

#[test]
fn packet_fields_are_contiguous_and_split_into_rows() {
    let text = r#"packet-beta
title TCP Packet
0-15: "Source Port"
16-31: "Destination Port"
32-63: "Sequence Number"
+8: "Flags"
72: "URG"
"#;
    let model = parse(text);
    assert_eq!(model.title.as_deref(), Some("TCP Packet"));
    assert_eq!(model.bits_per_row, 32);
    assert_eq!(
        model.entity_ids(),
        vec!["0-15", "16-31", "32-63", "64-71", "72-72"]
    );
    assert_eq!(model.total_bits(), 73);
    assert_eq!(model.block_at_bit(66).map(|b| b.label.as_str()), Some("Flags"));

    let rows: Vec<Vec<&str>> = model
        .rows
        .iter()
        .map(|row| row.iter().map(|b| b.id.as_str()).collect())
        .collect();
    assert_eq!(
        rows,
        vec![vec!["0-15", "16-31"], vec!["32-63"], vec!["64-71", "72-72"]]
    );
    assert!(model.is_valid());
}

#[test]
fn packet_field_spanning_rows_is_split() {
    let config = Config::from_value(json!({ "packet": { "bitsPerRow": 16 } }));
    let model = packet::parse("packet\n0-23: \"Wide\"\n", &config).unwrap();
    assert_eq!(model.blocks.len(), 1);
    let parts: Vec<_> = model
        .rows
        .iter()
        .map(|row| (row[0].start, row[0].end))
        .collect();
    assert_eq!(parts, vec![(0, 15), (16, 23)]);
    assert_eq!(model.rows[1][0].label, "Wide");
}

#[test]
fn packet_gap_or_reversed_range_is_error() {
    let err = packet::parse("packet\n0-7: \"a\"\n10-15: \"b\"\n", &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Canonicalization { notation: "packet", .. }));
    assert!(err.to_string().contains("expected 8"));
    assert_eq!(err.position().map(|p| p.line), Some(3));

    let err = packet::parse("packet\n0-7: \"a\"\n8-4: \"b\"\n", &Config::default()).unwrap_err();
    assert!(err.to_string().contains("before its start"));

    let err = packet::parse("packet\n+0: \"a\"\n", &Config::default()).unwrap_err();
    assert!(err.to_string().contains("at least one bit"));
}

#[test]
fn packet_unquoted_label_is_grammar_error() {
    let err = packet::parse("packet\n0-7: a\n", &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Grammar(_)));
}

#[test]
fn packet_bit_numbers_at_the_limits_are_errors() {
    let err = packet::parse(
        "packet\n0-7: \"a\"\n+18446744073709551615: \"b\"\n",
        &Config::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Canonicalization { notation: "packet", .. }));
    assert_eq!(err.position().map(|p| p.line), Some(3));

    let err = packet::parse("packet\n0-18446744073709551615: \"a\"\n", &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Canonicalization { notation: "packet", .. }));

    let err = packet::parse("packet\n0-4000000000: \"a\"\n", &Config::default()).unwrap_err();
    assert!(err.to_string().contains("rows"));

    let config = Config::from_value(json!({ "packet": { "bitsPerRow": i64::MAX } }));
    let err = packet::parse("packet\n0-18446744073709551615: \"a\"\n", &config).unwrap_err();
    assert!(err.to_string().contains("last bit number"));
}

#[test]
fn packet_last_allowed_row_is_accepted() {
    let model = parse("packet\n0-131071: \"all\"\n");
    assert_eq!(model.rows.len(), 4096);
    assert_eq!(model.total_bits(), 131072);
}

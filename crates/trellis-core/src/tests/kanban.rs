use crate::diagrams::kanban::{self, KanbanModel};
use crate::*;
use serde_json::json;

fn parse(text: &str) -> KanbanModel {
    kanban::parse(text, &Config::default()).unwrap()
}

const BOARD: &str = r#"kanban
  todo[Todo]
    id1[Create docs]@{ ticket: MC-1, assigned: 'ann', priority: 'High', team: core }
    [Write tests]
  done[Done]
    id2[Ship]
    ::icon(rocket)
    :::shipped
"#;

#[test]
fn kanban_columns_hold_items() {
    let model = parse(BOARD);
    let columns: Vec<_> = model.columns.iter().map(|c| (c.id.as_str(), c.label.as_str())).collect();
    assert_eq!(columns, vec![("todo", "Todo"), ("done", "Done")]);
    assert_eq!(model.entity_ids(), vec!["id1", "kbn1", "id2"]);

    let todo: Vec<_> = model.items_in("todo").map(|i| i.label.as_str()).collect();
    assert_eq!(todo, vec!["Create docs", "Write tests"]);

    let shipped = model.item("id2").unwrap();
    assert_eq!(shipped.column, "done");
    assert_eq!(shipped.icon.as_deref(), Some("rocket"));
    assert_eq!(shipped.classes, vec!["shipped"]);
    assert!(model.is_valid());
}

#[test]
fn kanban_metadata_is_broken_out() {
    let model = parse(BOARD);
    let item = serde_json::to_value(model.item("id1").unwrap()).unwrap();
    assert_eq!(item["ticket"], json!("MC-1"));
    assert_eq!(item["ticketUrl"], json!(null));
    assert_eq!(item["assigned"], json!("ann"));
    assert_eq!(item["priority"], json!("High"));
    assert_eq!(item["metadata"], json!({ "team": "core" }));
}

#[test]
fn kanban_ticket_url_from_config() {
    let config = Config::from_value(json!({ "kanban": { "ticketBaseUrl": "https://tracker/#TICKET#" } }));
    let model = kanban::parse(BOARD, &config).unwrap();
    assert_eq!(
        model.item("id1").unwrap().ticket_url.as_deref(),
        Some("https://tracker/MC-1")
    );
}

#[test]
fn kanban_rejects_unknown_priority_and_orphan_lines() {
    let err = kanban::parse(
        "kanban\ncol\n  a[x]@{ priority: 'Urgent' }\n",
        &Config::default(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("Urgent"));

    let err = kanban::parse("kanban\n  col\n    a\nb\n", &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Canonicalization { notation: "kanban", .. }));
}

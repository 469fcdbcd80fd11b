use crate::diagrams::git_graph::{self, CommitKind, CommitType, GitGraphModel};
use crate::*;
use serde_json::json;

fn parse(text: &str) -> GitGraphModel {
    git_graph::parse(text, &Config::default()).unwrap()
}

fn parents(model: &GitGraphModel, id: &str) -> Vec<String> {
    model.commit(id).unwrap().parents.clone()
}

#[test]
fn git_graph_parent_is_last_commit_on_current_branch() {
    let model = parse(
        "gitGraph\ncommit id: \"c1\"\nbranch dev\ncheckout dev\ncommit id: \"c2\"\ncheckout main\ncommit id: \"c3\"",
    );
    assert_eq!(model.entity_ids(), vec!["c1", "c2", "c3"]);
    assert!(parents(&model, "c2").is_empty());
    assert_eq!(parents(&model, "c3"), vec!["c1"]);
    assert_eq!(model.branch("dev").unwrap().parent.as_deref(), Some("main"));
    assert_eq!(model.branch("dev").unwrap().created_after.as_deref(), Some("c1"));
    assert!(model.is_valid());
}

#[test]
fn git_graph_generates_sequential_ids() {
    let model = parse("gitGraph\ncommit\ncommit msg: \"second\"\n");
    assert_eq!(model.entity_ids(), vec!["0-main", "1-main"]);
    assert_eq!(model.commits[1].message, "second");
    assert_eq!(model.commits[1].seq, 1);
    assert!(!model.commits[1].custom_id);
}

#[test]
fn git_graph_merge_has_two_parents() {
    let model = parse("gitGraph\ncommit\nbranch feat\ncommit\ncheckout main\nmerge feat tag: \"v1\"\n");
    let merge = &model.commits[2];
    assert_eq!(merge.id, "2-main");
    assert_eq!(merge.kind, CommitKind::Merge);
    assert_eq!(merge.parents, vec!["0-main", "1-feat"]);
    assert_eq!(merge.merge_source.as_deref(), Some("feat"));
    assert_eq!(merge.tags, vec!["v1"]);
}

#[test]
fn git_graph_merge_errors() {
    let err = git_graph::parse("gitGraph\ncommit\nmerge main\n", &Config::default()).unwrap_err();
    assert!(err.to_string().contains("into itself"));

    let err = git_graph::parse("gitGraph\ncommit\nmerge nope\n", &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Canonicalization { notation: "gitGraph", .. }));
    assert_eq!(err.position().map(|p| p.line), Some(3));
}

#[test]
fn git_graph_cherry_pick_tags_source() {
    let model = parse(
        "gitGraph\ncommit id: \"a\"\nbranch dev\ncommit id: \"b\"\ncheckout main\ncherry-pick id: \"b\"\n",
    );
    let pick = model.commits.last().unwrap();
    assert_eq!(pick.kind, CommitKind::CherryPick);
    assert_eq!(pick.parents, vec!["a", "b"]);
    assert_eq!(pick.tags, vec!["cherry-pick:b"]);
    assert_eq!(pick.cherry_pick_source.as_deref(), Some("b"));
}

#[test]
fn git_graph_commit_types_and_tags() {
    let model = parse("gitGraph\ncommit id: \"x\" type: HIGHLIGHT tag: \"t1\" tag: \"t2\"\n");
    assert_eq!(model.commits[0].commit_type, CommitType::Highlight);
    assert_eq!(model.commits[0].tags, vec!["t1", "t2"]);
}

#[test]
fn git_graph_duplicate_ids_warn() {
    let model = parse("gitGraph\ncommit id: \"a\"\ncommit id: \"a\"\nbranch main\n");
    assert_eq!(model.warnings.len(), 2);
    assert!(!model.is_valid());
}

#[test]
fn git_graph_checkout_of_unknown_branch_creates_it() {
    let model = parse("gitGraph\ncommit\ncheckout hotfix\ncommit\n");
    let value = serde_json::to_value(model.branch("hotfix").unwrap()).unwrap();
    assert_eq!(
        value,
        json!({
            "name": "hotfix",
            "index": 1,
            "order": null,
            "parent": "main",
            "createdAfter": "0-main"
        })
    );
    assert_eq!(model.commits[1].branch, "hotfix");
}

#[test]
fn git_graph_main_branch_from_config() {
    let config = Config::from_value(json!({
        "gitGraph": { "mainBranchName": "trunk", "mainBranchOrder": 2 }
    }));
    let model = git_graph::parse("gitGraph TB:\ncommit\n", &config).unwrap();
    assert_eq!(model.main_branch, "trunk");
    assert_eq!(model.direction, "TB");
    assert_eq!(model.commits[0].id, "0-trunk");
    assert_eq!(model.branch("trunk").unwrap().order, Some(2));
}

use serde::Serialize;
use winnow::combinator::{alt, cut_err, preceded, repeat};
use winnow::prelude::*;
use winnow::stream::Location;

use crate::canon::{BranchLineage, apply_accessibility};
use crate::config::Config;
use crate::cst::{Cst, Document, Record, Token};
use crate::error::{CanonResult, GrammarError, Result};
use crate::grammar::{self, accessibility, header, span_from};
use crate::lex::{
    Input, PResult, eol, expected, hspace0, hspace1, integer, keyword, name, punct, quoted,
    spanned,
};
use crate::model::{Accessibility, Model};

pub const NOTATION: &str = "gitGraph";
pub const HEADERS: &[&str] = &["gitGraph"];
const STATEMENTS: &[&str] = &[
    "commit",
    "branch",
    "checkout",
    "switch",
    "merge",
    "cherry-pick",
    "accTitle",
    "accDescr",
];
const DEFAULT_MAIN_BRANCH: &str = "main";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CommitKind {
    Commit,
    Merge,
    CherryPick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CommitType {
    #[default]
    Normal,
    Reverse,
    Highlight,
}

impl CommitType {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "NORMAL" => Some(Self::Normal),
            "REVERSE" => Some(Self::Reverse),
            "HIGHLIGHT" => Some(Self::Highlight),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitGraphModel {
    pub direction: String,
    pub main_branch: String,
    pub commits: Vec<GitCommit>,
    pub branches: Vec<GitBranch>,
    /// Recoverable anomalies, such as reused commit ids.
    pub warnings: Vec<String>,
    pub acc: Accessibility,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitCommit {
    pub id: String,
    pub seq: usize,
    pub message: String,
    pub branch: String,
    pub parents: Vec<String>,
    pub kind: CommitKind,
    pub commit_type: CommitType,
    pub custom_id: bool,
    pub tags: Vec<String>,
    pub merge_source: Option<String>,
    pub cherry_pick_source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitBranch {
    pub name: String,
    /// Creation order; the main branch is 0.
    pub index: usize,
    pub order: Option<i64>,
    pub parent: Option<String>,
    pub created_after: Option<String>,
}

impl GitGraphModel {
    pub fn commit(&self, id: &str) -> Option<&GitCommit> {
        self.commits.iter().find(|c| c.id == id)
    }

    pub fn branch(&self, name: &str) -> Option<&GitBranch> {
        self.branches.iter().find(|b| b.name == name)
    }

    pub fn commits_on<'a>(&'a self, branch: &'a str) -> impl Iterator<Item = &'a GitCommit> + 'a {
        self.commits.iter().filter(move |c| c.branch == branch)
    }

    /// Commits that list `id` as a parent.
    pub fn children_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a GitCommit> + 'a {
        self.commits
            .iter()
            .filter(move |c| c.parents.iter().any(|p| p == id))
    }
}

impl Model for GitGraphModel {
    fn entity_ids(&self) -> Vec<&str> {
        self.commits.iter().map(|c| c.id.as_str()).collect()
    }

    fn relation_endpoints(&self) -> Vec<(&str, &str)> {
        self.commits
            .iter()
            .flat_map(|c| c.parents.iter().map(move |p| (p.as_str(), c.id.as_str())))
            .collect()
    }

    fn group_refs(&self) -> Vec<(&str, &str)> {
        self.commits
            .iter()
            .map(|c| (c.id.as_str(), c.branch.as_str()))
            .collect()
    }

    fn group_ids(&self) -> Vec<&str> {
        self.branches.iter().map(|b| b.name.as_str()).collect()
    }
}

pub fn parse(text: &str, config: &Config) -> Result<GitGraphModel> {
    let doc = parse_document(text)?;
    super::canonicalized(NOTATION, transform(&doc, config))
}

pub fn parse_document(text: &str) -> std::result::Result<Document<'_>, GrammarError> {
    grammar::parse_document(NOTATION, text, header(HEADERS), statement, STATEMENTS)
}

fn statement<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    alt((
        accessibility,
        commit,
        branch,
        checkout,
        merge,
        cherry_pick,
    ))
    .parse_next(input)
}

fn branch_name<'a>(input: &mut Input<'a>) -> PResult<Token<'a>> {
    alt((spanned(quoted), spanned(name)))
        .context(expected("branch name"))
        .parse_next(input)
}

/// `key: value` pairs following a command. Values are quoted strings, commit types or integers.
fn options<'a>(input: &mut Input<'a>) -> PResult<Vec<Cst<'a>>> {
    repeat(0.., preceded(hspace1, option))
        .map(|opts: Vec<Record<'a>>| opts.into_iter().map(Cst::Record).collect())
        .parse_next(input)
}

fn option<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let key = spanned(alt((
        keyword("id"),
        keyword("msg"),
        keyword("tag"),
        keyword("type"),
        keyword("order"),
        keyword("parent"),
    )))
    .parse_next(input)?;
    hspace0.parse_next(input)?;
    punct(':').parse_next(input)?;
    hspace0.parse_next(input)?;
    let value = cut_err(alt((
        spanned(quoted),
        spanned(alt((
            keyword("NORMAL"),
            keyword("REVERSE"),
            keyword("HIGHLIGHT"),
        ))),
        spanned(integer.take()),
    )))
    .context(expected("option value"))
    .parse_next(input)?;
    Ok(Record::new("option", span_from(input, start))
        .with("key", key)
        .with("value", value))
}

fn commit<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("commit").parse_next(input)?;
    let opts = options.parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("commit", span_from(input, start)).with("options", opts))
}

fn branch<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("branch").parse_next(input)?;
    hspace1.parse_next(input)?;
    let name = cut_err(branch_name).parse_next(input)?;
    let opts = options.parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("branch", span_from(input, start))
        .with("name", name)
        .with("options", opts))
}

fn checkout<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    alt((keyword("checkout"), keyword("switch"))).parse_next(input)?;
    hspace1.parse_next(input)?;
    let name = cut_err(branch_name).parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("checkout", span_from(input, start)).with("name", name))
}

fn merge<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("merge").parse_next(input)?;
    hspace1.parse_next(input)?;
    let name = cut_err(branch_name).parse_next(input)?;
    let opts = options.parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("merge", span_from(input, start))
        .with("name", name)
        .with("options", opts))
}

fn cherry_pick<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    keyword("cherry-pick").parse_next(input)?;
    let opts = options.parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("cherryPick", span_from(input, start)).with("options", opts))
}

/// Options of one command, in source order.
struct Options<'r> {
    pairs: Vec<(&'r str, &'r str)>,
}

impl<'r> Options<'r> {
    fn of(stmt: &'r Record<'_>) -> Self {
        let pairs = stmt
            .records("options")
            .filter_map(|o| Some((o.text("key")?, o.text("value")?)))
            .collect();
        Self { pairs }
    }

    fn get(&self, key: &str) -> Option<&'r str> {
        self.pairs.iter().rev().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }

    fn all(&self, key: &'r str) -> impl Iterator<Item = &'r str> + '_ {
        self.pairs
            .iter()
            .filter(move |(k, _)| *k == key)
            .map(|(_, v)| *v)
    }
}

struct GitGraphBuilder<'d> {
    doc: &'d Document<'d>,
    lineage: BranchLineage,
    commits: Vec<GitCommit>,
    orders: Vec<(String, Option<i64>)>,
    warnings: Vec<String>,
}

impl<'d> GitGraphBuilder<'d> {
    fn next_id(&self) -> String {
        format!("{}-{}", self.commits.len(), self.lineage.current())
    }

    fn has_commit(&self, id: &str) -> bool {
        self.commits.iter().any(|c| c.id == id)
    }

    fn push_commit(&mut self, mut commit: GitCommit) {
        if self.has_commit(&commit.id) {
            let warning = format!("commit id {} already exists", commit.id);
            tracing::warn!(id = %commit.id, "duplicate gitGraph commit id");
            self.warnings.push(warning);
        }
        commit.seq = self.commits.len();
        self.lineage.record_commit(&commit.id);
        self.commits.push(commit);
    }

    fn ensure_branch(&mut self, name: &str, order: Option<i64>) -> bool {
        let created = self.lineage.create_branch(name);
        if created {
            self.orders.push((name.to_string(), order));
        }
        created
    }

    fn commit(&mut self, stmt: &Record<'_>) -> CanonResult<()> {
        let opts = Options::of(stmt);
        let custom = opts.get("id");
        let commit = GitCommit {
            id: custom.map_or_else(|| self.next_id(), str::to_string),
            seq: 0,
            message: opts.get("msg").unwrap_or_default().to_string(),
            branch: self.lineage.current().to_string(),
            parents: self
                .lineage
                .parent_for_next()
                .map(str::to_string)
                .into_iter()
                .collect(),
            kind: CommitKind::Commit,
            commit_type: self.commit_type(stmt, &opts)?,
            custom_id: custom.is_some(),
            tags: opts.all("tag").map(str::to_string).collect(),
            merge_source: None,
            cherry_pick_source: None,
        };
        self.push_commit(commit);
        Ok(())
    }

    fn commit_type(&self, stmt: &Record<'_>, opts: &Options<'_>) -> CanonResult<CommitType> {
        match opts.get("type") {
            None => Ok(CommitType::Normal),
            Some(raw) => CommitType::parse(raw)
                .ok_or_else(|| self.doc.invalid(stmt, format!("unknown commit type `{raw}`"))),
        }
    }

    fn branch(&mut self, stmt: &Record<'_>) -> CanonResult<()> {
        let name = stmt.require_text("name")?;
        let order = Options::of(stmt).get("order").and_then(|o| o.parse().ok());
        if !self.ensure_branch(name, order) {
            let warning = format!("branch {name} already exists");
            tracing::warn!(branch = name, "re-declared gitGraph branch");
            self.warnings.push(warning);
        }
        self.lineage.checkout(name);
        Ok(())
    }

    fn checkout(&mut self, stmt: &Record<'_>) -> CanonResult<()> {
        let name = stmt.require_text("name")?;
        if self.ensure_branch(name, None) {
            tracing::debug!(branch = name, "checkout of undeclared branch creates it");
        }
        self.lineage.checkout(name);
        Ok(())
    }

    fn merge(&mut self, stmt: &Record<'_>) -> CanonResult<()> {
        let other = stmt.require_text("name")?;
        let current = self.lineage.current().to_string();
        if other == current {
            return Err(self
                .doc
                .invalid(stmt, format!("cannot merge branch {other} into itself")));
        }
        if !self.lineage.contains(other) {
            return Err(self
                .doc
                .invalid(stmt, format!("branch to be merged ({other}) does not exist")));
        }

        let opts = Options::of(stmt);
        let custom = opts.get("id");
        if let Some(id) = custom.filter(|id| self.has_commit(id)) {
            return Err(self
                .doc
                .invalid(stmt, format!("merge commit id {id} already exists")));
        }

        let parents = [
            self.lineage.parent_for_next(),
            self.lineage.last_on(other),
        ]
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect();
        let commit = GitCommit {
            id: custom.map_or_else(|| self.next_id(), str::to_string),
            seq: 0,
            message: format!("merged branch {other} into {current}"),
            branch: current,
            parents,
            kind: CommitKind::Merge,
            commit_type: self.commit_type(stmt, &opts)?,
            custom_id: custom.is_some(),
            tags: opts.all("tag").map(str::to_string).collect(),
            merge_source: Some(other.to_string()),
            cherry_pick_source: None,
        };
        self.push_commit(commit);
        Ok(())
    }

    fn cherry_pick(&mut self, stmt: &Record<'_>) -> CanonResult<()> {
        let opts = Options::of(stmt);
        let Some(source_id) = opts.get("id") else {
            return Err(self.doc.invalid(stmt, "cherry-pick requires a source commit id"));
        };
        let Some(source) = self.commits.iter().find(|c| c.id == source_id) else {
            return Err(self
                .doc
                .invalid(stmt, format!("cherry-pick source commit {source_id} does not exist")));
        };
        if source.branch == self.lineage.current() {
            return Err(self
                .doc
                .invalid(stmt, "cherry-pick source commit is already on the current branch"));
        }
        let parent = opts.get("parent");
        if let Some(p) = parent {
            if !source.parents.iter().any(|sp| sp == p) {
                return Err(self.doc.invalid(
                    stmt,
                    format!("{p} is not an immediate parent of cherry-picked commit {source_id}"),
                ));
            }
        } else if source.kind == CommitKind::Merge {
            return Err(self.doc.invalid(
                stmt,
                "cherry-picking a merge commit requires an immediate parent",
            ));
        }

        let mut tags: Vec<String> = opts
            .all("tag")
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        if tags.is_empty() {
            let mut tag = format!("cherry-pick:{source_id}");
            if let Some(p) = parent {
                tag.push_str(&format!("|parent:{p}"));
            }
            tags.push(tag);
        }
        let message = format!("cherry-picked {} into {}", source.message, self.lineage.current());

        let parents = [self.lineage.parent_for_next(), Some(source_id)]
            .into_iter()
            .flatten()
            .map(str::to_string)
            .collect();
        let commit = GitCommit {
            id: self.next_id(),
            seq: 0,
            message,
            branch: self.lineage.current().to_string(),
            parents,
            kind: CommitKind::CherryPick,
            commit_type: CommitType::Normal,
            custom_id: false,
            tags,
            merge_source: None,
            cherry_pick_source: Some(source_id.to_string()),
        };
        self.push_commit(commit);
        Ok(())
    }
}

fn header_direction(doc: &Document<'_>) -> CanonResult<String> {
    let header = doc.header()?;
    let rest = header.non_empty_text("rest").unwrap_or_default();
    match rest.trim_end_matches(':').trim() {
        "" => Ok("LR".to_string()),
        dir @ ("LR" | "TB" | "BT") => Ok(dir.to_string()),
        other => Err(doc.invalid(header, format!("unknown gitGraph direction `{other}`"))),
    }
}

pub fn transform(doc: &Document<'_>, config: &Config) -> CanonResult<GitGraphModel> {
    let main = config
        .get_str("gitGraph.mainBranchName")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_MAIN_BRANCH)
        .to_string();
    let main_order = config.get_i64("gitGraph.mainBranchOrder");

    let mut acc = Accessibility::default();
    let mut builder = GitGraphBuilder {
        doc,
        lineage: BranchLineage::new(&main),
        commits: Vec::new(),
        orders: vec![(main.clone(), main_order)],
        warnings: Vec::new(),
    };

    for stmt in doc.statements() {
        if apply_accessibility(&mut acc, stmt) {
            continue;
        }
        match stmt.kind {
            "commit" => builder.commit(stmt)?,
            "branch" => builder.branch(stmt)?,
            "checkout" => builder.checkout(stmt)?,
            "merge" => builder.merge(stmt)?,
            "cherryPick" => builder.cherry_pick(stmt)?,
            _ => {}
        }
    }

    let branches = builder
        .lineage
        .branches()
        .map(|(name, info)| GitBranch {
            name: name.to_string(),
            index: info.order,
            order: builder
                .orders
                .iter()
                .find(|(n, _)| n == name)
                .and_then(|(_, o)| *o),
            parent: info.parent.clone(),
            created_after: info.created_after.clone(),
        })
        .collect();

    let model = GitGraphModel {
        direction: header_direction(doc)?,
        main_branch: main,
        commits: builder.commits,
        branches,
        warnings: builder.warnings,
        acc,
    };
    tracing::debug!(
        commits = model.commits.len(),
        branches = model.branches.len(),
        "gitGraph canonicalized"
    );
    Ok(model)
}

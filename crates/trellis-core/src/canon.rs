//! Traversal-scoped state shared by the notation transforms.
//!
//! Everything here lives for one canonicalization call; nothing is global.

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

use crate::cst::Record;
use crate::model::Accessibility;

pub type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// An entity that can be materialized from a bare id reference.
pub trait Entity {
    /// A new entity whose label defaults to `id`.
    fn implicit(id: &str) -> Self;
}

/// Insertion-ordered find-or-create registry keyed by entity id.
#[derive(Debug, Clone)]
pub struct EntityRegistry<T> {
    items: FxIndexMap<String, T>,
}

impl<T> Default for EntityRegistry<T> {
    fn default() -> Self {
        Self {
            items: FxIndexMap::default(),
        }
    }
}

impl<T> EntityRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.items.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.items.get_index_of(id)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.items.values()
    }

    /// Inserts `value` unless the id exists; returns whether it was inserted.
    pub fn insert_new(&mut self, id: &str, value: T) -> bool {
        if self.items.contains_key(id) {
            return false;
        }
        self.items.insert(id.to_string(), value);
        true
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items.into_values().collect()
    }
}

impl<T: Entity> EntityRegistry<T> {
    /// Returns the entity for `id`, appending an implicit one in first-seen order if needed.
    pub fn find_or_create(&mut self, id: &str) -> &mut T {
        if !self.items.contains_key(id) {
            tracing::trace!(id, "implicit entity");
        }
        self.items
            .entry(id.to_string())
            .or_insert_with(|| T::implicit(id))
    }
}

/// Overwrites `slot` only with a non-empty value.
pub fn merge_text(slot: &mut String, value: Option<&str>) {
    if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
        *slot = v.to_string();
    }
}

/// Overwrites `slot` only when a new value is present.
pub fn merge_opt<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

/// Appends values that are not already present, keeping first-seen order.
pub fn merge_unique(slot: &mut Vec<String>, values: impl IntoIterator<Item = impl Into<String>>) {
    for value in values {
        let value = value.into();
        if !slot.contains(&value) {
            slot.push(value);
        }
    }
}

/// Explicit stack of enclosing contexts (sections, namespaces, boundaries, composites).
#[derive(Debug, Clone)]
pub struct ContextStack<T> {
    frames: Vec<T>,
}

impl<T> Default for ContextStack<T> {
    fn default() -> Self {
        Self { frames: Vec::new() }
    }
}

impl<T> ContextStack<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: T) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<T> {
        self.frames.pop()
    }

    pub fn current(&self) -> Option<&T> {
        self.frames.last()
    }

    pub fn current_mut(&mut self) -> Option<&mut T> {
        self.frames.last_mut()
    }

    /// Replaces the innermost context (a `section` following another `section`).
    pub fn switch(&mut self, frame: T) -> Option<T> {
        let previous = self.frames.pop();
        self.frames.push(frame);
        previous
    }

    pub fn path(&self) -> &[T] {
        &self.frames
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Level and parent of one line after indentation reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierarchyNode {
    /// Indentation level; the same tree written with wider steps has larger levels.
    pub level: usize,
    /// Distance from the top of the tree, independent of the indentation step.
    pub depth: usize,
    pub parent: Option<usize>,
}

/// Rebuilds a tree from raw indentation widths.
///
/// Widths are made relative to the document-wide minimum; the level is half the relative width,
/// or a quarter of it when the relative width is odd. A node's parent is the last node seen at
/// the deepest populated level below its own.
pub fn rebuild_hierarchy(indents: &[usize]) -> Vec<HierarchyNode> {
    let Some(min_indent) = indents.iter().copied().min() else {
        return Vec::new();
    };

    let mut stack: Vec<Option<usize>> = Vec::new();
    let mut nodes = Vec::with_capacity(indents.len());
    for (idx, indent) in indents.iter().enumerate() {
        let relative = indent - min_indent;
        let level = if relative % 2 == 0 {
            relative / 2
        } else {
            relative / 4
        };

        let parent = stack
            .iter()
            .take(level)
            .rev()
            .find_map(|slot| *slot);

        stack.truncate(level + 1);
        if stack.len() <= level {
            stack.resize(level + 1, None);
        }
        stack[level] = Some(idx);

        let depth = parent
            .and_then(|p| nodes.get(p))
            .map_or(0, |n: &HierarchyNode| n.depth + 1);
        nodes.push(HierarchyNode { level, depth, parent });
    }
    nodes
}

/// One closed activation window, in message indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationWindow {
    pub participant: String,
    pub start: usize,
    pub end: usize,
}

/// Message counter plus per-participant activation stacks.
#[derive(Debug, Clone, Default)]
pub struct ActivationTracker {
    messages: usize,
    open: FxIndexMap<String, Vec<usize>>,
    closed: Vec<ActivationWindow>,
}

impl ActivationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the index for the next message.
    pub fn next_message(&mut self) -> usize {
        let idx = self.messages;
        self.messages += 1;
        idx
    }

    /// Index of the most recent message (0 before any message).
    pub fn current_index(&self) -> usize {
        self.messages.saturating_sub(1)
    }

    pub fn activate(&mut self, participant: &str) {
        let start = self.current_index();
        self.open
            .entry(participant.to_string())
            .or_default()
            .push(start);
    }

    /// Closes the latest open window; `None` when the participant has nothing open.
    pub fn deactivate(&mut self, participant: &str) -> Option<&ActivationWindow> {
        let start = self.open.get_mut(participant)?.pop()?;
        self.closed.push(ActivationWindow {
            participant: participant.to_string(),
            start,
            end: self.current_index(),
        });
        self.closed.last()
    }

    pub fn depth(&self, participant: &str) -> usize {
        self.open.get(participant).map_or(0, Vec::len)
    }

    /// Closes every window still open at the final message index.
    pub fn finish(mut self) -> Vec<ActivationWindow> {
        let end = self.current_index();
        for (participant, starts) in std::mem::take(&mut self.open) {
            for start in starts.into_iter().rev() {
                self.closed.push(ActivationWindow {
                    participant: participant.clone(),
                    start,
                    end,
                });
            }
        }
        self.closed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineageBranch {
    pub order: usize,
    pub parent: Option<String>,
    pub created_after: Option<String>,
}

/// Current branch, branch table and append-only commit log for branch-lineage notations.
#[derive(Debug, Clone)]
pub struct BranchLineage {
    current: String,
    branches: FxIndexMap<String, LineageBranch>,
    commits: Vec<(String, String)>,
}

impl BranchLineage {
    pub fn new(main: &str) -> Self {
        let mut branches = FxIndexMap::default();
        branches.insert(
            main.to_string(),
            LineageBranch {
                order: 0,
                parent: None,
                created_after: None,
            },
        );
        Self {
            current: main.to_string(),
            branches,
            commits: Vec::new(),
        }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn contains(&self, branch: &str) -> bool {
        self.branches.contains_key(branch)
    }

    pub fn branch(&self, name: &str) -> Option<&LineageBranch> {
        self.branches.get(name)
    }

    pub fn branches(&self) -> impl Iterator<Item = (&str, &LineageBranch)> {
        self.branches.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Records `name` branching off the current branch; returns `false` if it already existed.
    pub fn create_branch(&mut self, name: &str) -> bool {
        if self.branches.contains_key(name) {
            return false;
        }
        let info = LineageBranch {
            order: self.branches.len(),
            parent: Some(self.current.clone()),
            created_after: self.head().map(str::to_string),
        };
        self.branches.insert(name.to_string(), info);
        true
    }

    pub fn checkout(&mut self, name: &str) {
        self.current = name.to_string();
    }

    /// Most recent commit on the current branch, found by scanning the log backwards.
    pub fn parent_for_next(&self) -> Option<&str> {
        self.last_on(&self.current)
    }

    pub fn last_on(&self, branch: &str) -> Option<&str> {
        self.commits
            .iter()
            .rev()
            .find(|(_, b)| b == branch)
            .map(|(id, _)| id.as_str())
    }

    /// Id of the most recent commit on any branch.
    pub fn head(&self) -> Option<&str> {
        self.commits.last().map(|(id, _)| id.as_str())
    }

    pub fn record_commit(&mut self, id: &str) {
        self.commits.push((id.to_string(), self.current.clone()));
    }

    pub fn commit_count(&self) -> usize {
        self.commits.len()
    }
}

/// Applies `accTitle` / `accDescr` records; returns `false` for any other statement.
pub fn apply_accessibility(acc: &mut Accessibility, stmt: &Record<'_>) -> bool {
    match stmt.kind {
        "accTitle" => {
            merge_opt(&mut acc.title, stmt.non_empty_text("text").map(str::to_string));
            true
        }
        "accDescr" => {
            merge_opt(
                &mut acc.description,
                stmt.non_empty_text("text").map(str::to_string),
            );
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Node {
        id: String,
        label: String,
    }

    impl Entity for Node {
        fn implicit(id: &str) -> Self {
            Self {
                id: id.to_string(),
                label: id.to_string(),
            }
        }
    }

    fn parents(indents: &[usize]) -> Vec<Option<usize>> {
        rebuild_hierarchy(indents).iter().map(|n| n.parent).collect()
    }

    #[test]
    fn registry_keeps_first_seen_order_and_merges_non_empty() {
        let mut reg: EntityRegistry<Node> = EntityRegistry::new();
        merge_text(&mut reg.find_or_create("b").label, Some("Bee"));
        reg.find_or_create("a");
        merge_text(&mut reg.find_or_create("b").label, Some("  "));
        merge_text(&mut reg.find_or_create("b").label, None);

        let nodes = reg.into_vec();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].label, "Bee");
        assert_eq!(nodes[1].label, "a");
    }

    #[test]
    fn context_stack_switch_replaces_innermost() {
        let mut stack = ContextStack::new();
        stack.push("outer");
        stack.push("s1");
        assert_eq!(stack.switch("s2"), Some("s1"));
        assert_eq!(stack.path(), &["outer", "s2"]);
        stack.pop();
        assert_eq!(stack.current(), Some(&"outer"));
    }

    #[test]
    fn hierarchy_is_same_for_two_and_four_space_steps() {
        let two = parents(&[0, 2, 4, 2, 0]);
        let four = parents(&[0, 4, 8, 4, 0]);
        assert_eq!(two, vec![None, Some(0), Some(1), Some(0), None]);
        assert_eq!(two, four);
    }

    #[test]
    fn hierarchy_depth_ignores_indent_step() {
        let depths = |indents: &[usize]| -> Vec<usize> {
            rebuild_hierarchy(indents).iter().map(|n| n.depth).collect()
        };
        assert_eq!(depths(&[0, 4, 8, 4]), vec![0, 1, 2, 1]);
        assert_eq!(depths(&[0, 2, 4, 2]), depths(&[0, 4, 8, 4]));
        let levels: Vec<_> = rebuild_hierarchy(&[0, 4, 8]).iter().map(|n| n.level).collect();
        assert_eq!(levels, vec![0, 2, 4]);
    }

    #[test]
    fn hierarchy_is_relative_to_minimum_indent() {
        assert_eq!(parents(&[3, 5, 7, 5]), vec![None, Some(0), Some(1), Some(0)]);
        let levels: Vec<_> = rebuild_hierarchy(&[3, 5]).iter().map(|n| n.level).collect();
        assert_eq!(levels, vec![0, 1]);
    }

    #[test]
    fn hierarchy_odd_widths_fall_back_to_quarter_levels() {
        let nodes = rebuild_hierarchy(&[0, 5]);
        assert_eq!(nodes[1].level, 1);
        assert_eq!(nodes[1].parent, Some(0));
    }

    #[test]
    fn activation_windows_span_message_indices() {
        let mut t = ActivationTracker::new();
        t.next_message();
        t.activate("B");
        t.next_message();
        t.activate("B");
        t.next_message();
        assert_eq!(t.deactivate("B").map(|w| (w.start, w.end)), Some((1, 2)));
        assert!(t.deactivate("C").is_none());
        let windows = t.finish();
        assert_eq!(windows.len(), 2);
        assert_eq!((windows[1].start, windows[1].end), (0, 2));
    }

    #[test]
    fn lineage_parent_scans_back_on_current_branch() {
        let mut l = BranchLineage::new("main");
        l.record_commit("c1");
        assert!(l.create_branch("dev"));
        assert!(!l.create_branch("dev"));
        l.checkout("dev");
        assert_eq!(l.parent_for_next(), None);
        l.record_commit("c2");
        l.checkout("main");
        assert_eq!(l.parent_for_next(), Some("c1"));
        let dev = l.branch("dev").unwrap();
        assert_eq!(dev.parent.as_deref(), Some("main"));
        assert_eq!(dev.created_after.as_deref(), Some("c1"));
    }
}

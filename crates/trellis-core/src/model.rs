//! The output contract shared by every notation model.

use rustc_hash::FxHashSet;
use serde::Serialize;

/// `accTitle` / `accDescr` metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessibility {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One broken invariant reported by [`Model::violations`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Violation {
    DuplicateEntity { id: String },
    DanglingEndpoint { from: String, to: String, missing: String },
    UnknownGroup { member: String, group: String },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateEntity { id } => write!(f, "duplicate entity id `{id}`"),
            Self::DanglingEndpoint { from, to, missing } => {
                write!(f, "relation {from} -> {to} references unknown entity `{missing}`")
            }
            Self::UnknownGroup { member, group } => {
                write!(f, "`{member}` references unknown group `{group}`")
            }
        }
    }
}

/// Enumerable entities and relations plus the advisory validity predicate.
pub trait Model {
    /// Entity ids in first-seen order.
    fn entity_ids(&self) -> Vec<&str>;

    /// `(from, to)` for every relation, in emission order.
    fn relation_endpoints(&self) -> Vec<(&str, &str)>;

    /// `(member, group)` membership references.
    fn group_refs(&self) -> Vec<(&str, &str)> {
        Vec::new()
    }

    /// Declared group ids.
    fn group_ids(&self) -> Vec<&str> {
        Vec::new()
    }

    fn violations(&self) -> Vec<Violation> {
        default_violations(self)
    }

    fn is_valid(&self) -> bool {
        self.violations().is_empty()
    }
}

/// Unique ids, resolvable relation endpoints, resolvable group references.
pub fn default_violations<M: Model + ?Sized>(model: &M) -> Vec<Violation> {
    let mut out = Vec::new();

    let mut entities: FxHashSet<&str> = FxHashSet::default();
    for id in model.entity_ids() {
        if !entities.insert(id) {
            out.push(Violation::DuplicateEntity { id: id.to_string() });
        }
    }

    for (from, to) in model.relation_endpoints() {
        for end in [from, to] {
            if !entities.contains(end) {
                out.push(Violation::DanglingEndpoint {
                    from: from.to_string(),
                    to: to.to_string(),
                    missing: end.to_string(),
                });
            }
        }
    }

    let groups: FxHashSet<&str> = model.group_ids().into_iter().collect();
    for (member, group) in model.group_refs() {
        if !groups.contains(group) {
            out.push(Violation::UnknownGroup {
                member: member.to_string(),
                group: group.to_string(),
            });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Toy {
        ids: Vec<&'static str>,
        edges: Vec<(&'static str, &'static str)>,
        groups: Vec<&'static str>,
        members: Vec<(&'static str, &'static str)>,
    }

    impl Model for Toy {
        fn entity_ids(&self) -> Vec<&str> {
            self.ids.clone()
        }
        fn relation_endpoints(&self) -> Vec<(&str, &str)> {
            self.edges.clone()
        }
        fn group_refs(&self) -> Vec<(&str, &str)> {
            self.members.clone()
        }
        fn group_ids(&self) -> Vec<&str> {
            self.groups.clone()
        }
    }

    #[test]
    fn default_checks_cover_all_three_invariants() {
        let toy = Toy {
            ids: vec!["a", "b", "a"],
            edges: vec![("a", "c")],
            groups: vec!["g"],
            members: vec![("a", "g"), ("b", "h")],
        };
        let v = toy.violations();
        assert_eq!(
            v,
            vec![
                Violation::DuplicateEntity { id: "a".into() },
                Violation::DanglingEndpoint {
                    from: "a".into(),
                    to: "c".into(),
                    missing: "c".into()
                },
                Violation::UnknownGroup {
                    member: "b".into(),
                    group: "h".into()
                },
            ]
        );
        assert!(!toy.is_valid());
    }
}

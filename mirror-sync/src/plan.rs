//! Pure link planning.
//!
//! `plan_links(declared, current)` answers "which parent links must be added
//! and which removed so that `current` becomes `declared`". No I/O happens
//! here; [`crate::reconcile`] reads the remote state, calls this, then applies
//! the plan.

use std::collections::BTreeSet;

use mirror_core::types::RemoteId;

/// Link edits for one folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkPlan {
    /// Declared but not currently linked.
    pub to_add: BTreeSet<RemoteId>,
    /// Linked but no longer declared.
    pub to_remove: BTreeSet<RemoteId>,
}

impl LinkPlan {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// The link set that results from applying this plan to `current`.
    pub fn apply_to(&self, current: &BTreeSet<RemoteId>) -> BTreeSet<RemoteId> {
        current
            .iter()
            .filter(|id| !self.to_remove.contains(*id))
            .chain(self.to_add.iter())
            .cloned()
            .collect()
    }
}

/// Compute the minimal edits turning `current` into `declared`.
pub fn plan_links(declared: &BTreeSet<RemoteId>, current: &BTreeSet<RemoteId>) -> LinkPlan {
    LinkPlan {
        to_add: declared.difference(current).cloned().collect(),
        to_remove: current.difference(declared).cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::collection::btree_set;
    use proptest::prelude::*;

    fn ids(raw: &[&str]) -> BTreeSet<RemoteId> {
        raw.iter().map(|s| RemoteId::from(*s)).collect()
    }

    fn id_set() -> impl Strategy<Value = BTreeSet<RemoteId>> {
        btree_set("[a-f]{1,2}".prop_map(RemoteId::from), 0..12)
    }

    #[test]
    fn adds_missing_and_removes_orphans() {
        let plan = plan_links(&ids(&["a", "b"]), &ids(&["b", "c"]));
        assert_eq!(plan.to_add, ids(&["a"]));
        assert_eq!(plan.to_remove, ids(&["c"]));
    }

    #[test]
    fn matching_sets_plan_nothing() {
        assert!(plan_links(&ids(&["a"]), &ids(&["a"])).is_empty());
        assert!(plan_links(&BTreeSet::new(), &BTreeSet::new()).is_empty());
    }

    proptest! {
        #[test]
        fn applying_plan_yields_declared(declared in id_set(), current in id_set()) {
            let plan = plan_links(&declared, &current);
            prop_assert_eq!(plan.apply_to(&current), declared);
        }

        #[test]
        fn second_plan_is_empty(declared in id_set(), current in id_set()) {
            let after = plan_links(&declared, &current).apply_to(&current);
            prop_assert!(plan_links(&declared, &after).is_empty());
        }

        #[test]
        fn plan_is_minimal(declared in id_set(), current in id_set()) {
            let plan = plan_links(&declared, &current);
            prop_assert!(plan.to_add.is_disjoint(&current));
            prop_assert!(plan.to_remove.is_subset(&current));
            prop_assert!(plan.to_remove.is_disjoint(&declared));
        }
    }
}

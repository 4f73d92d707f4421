//! Reconciliation of group ↔ dataset parent links.
//!
//! Each pass reads the current remote state, diffs it against the declared
//! membership with [`plan_links`], then applies the edits. No remote graph is
//! cached between passes, so edits made out of band are picked up on the next
//! run. Running the same pass twice without intervening edits is a no-op.
//!
//! Two passes over the same record must never run concurrently: the remote
//! API offers no conditional writes on parent sets.

use std::collections::{BTreeMap, BTreeSet};

use mirror_core::types::{Dataset, DatasetName, Group, PayloadKind, RemoteId};
use mirror_core::RecordStore;

use crate::caps::Capabilities;
use crate::plan::{plan_links, LinkPlan};
use crate::SyncError;

/// What a group pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupReconcileReport {
    /// Datasets whose `groups` list gained this group.
    pub memberships_added: Vec<DatasetName>,
    /// Datasets whose `groups` list dropped this group.
    pub memberships_removed: Vec<DatasetName>,
    /// Declared members with no uploaded artifacts yet.
    pub unpublished: Vec<DatasetName>,
    /// `(kind, artifact)` links added to the group folders.
    pub linked: Vec<(PayloadKind, RemoteId)>,
    /// `(kind, artifact)` links removed from the group folders.
    pub unlinked: Vec<(PayloadKind, RemoteId)>,
}

impl GroupReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.memberships_added.is_empty()
            && self.memberships_removed.is_empty()
            && self.linked.is_empty()
            && self.unlinked.is_empty()
    }
}

/// Make the group's two payload folders hold exactly the artifacts of its
/// declared members.
///
/// 1. Every declared member gets the group appended to its `groups` list.
/// 2. Each payload folder's children are diffed against the members'
///    artifacts; missing links are added, orphans removed.
/// 3. Datasets that still list the group but are no longer declared are
///    severed via [`reconcile_dataset_against_group`].
///
/// A declared member without a record fails the pass with
/// [`SyncError::RecordInconsistency`].
pub fn reconcile_group_members(
    caps: &Capabilities<'_>,
    store: &RecordStore,
    group: &Group,
) -> Result<GroupReconcileReport, SyncError> {
    let folders = group_folders(group)?;
    let mut report = GroupReconcileReport::default();
    let mut declared: BTreeMap<PayloadKind, BTreeSet<RemoteId>> = BTreeMap::new();

    for name in &group.datasets {
        let mut dataset = store.load_dataset(name)?;
        if dataset.add_group(&group.name) {
            store.save_dataset(&dataset)?;
            report.memberships_added.push(dataset.name.clone());
        }

        let mut published = false;
        for kind in PayloadKind::all() {
            if let Some(id) = dataset.artifact_id(*kind) {
                declared.entry(*kind).or_default().insert(id.clone());
                published = true;
            }
        }
        if !published {
            report.unpublished.push(dataset.name.clone());
        }
    }

    for (kind, folder) in &folders {
        let current: BTreeSet<RemoteId> = caps
            .standard
            .list_children(folder)?
            .into_iter()
            .map(|child| child.id)
            .collect();
        let wanted = declared.remove(kind).unwrap_or_default();
        let plan = plan_links(&wanted, &current);
        apply_plan(caps, *kind, folder, &plan, &mut report)?;
    }

    for mut dataset in stale_members(store, group)? {
        if reconcile_dataset_against_group(caps, store, &mut dataset, group)? {
            report.memberships_removed.push(dataset.name.clone());
        }
    }

    if report.is_noop() {
        tracing::debug!("group '{}' already consistent", group.name);
    } else {
        tracing::info!(
            "group '{}': +{} / -{} links, +{} / -{} memberships",
            group.name,
            report.linked.len(),
            report.unlinked.len(),
            report.memberships_added.len(),
            report.memberships_removed.len(),
        );
    }
    Ok(report)
}

/// Sever `dataset` from `group` if the group no longer declares it.
///
/// Drops the group from `dataset.groups` and removes any parent link from the
/// dataset's artifacts into the group's payload folders. The dataset record is
/// persisted either way. Returns `true` if membership was severed.
pub fn reconcile_dataset_against_group(
    caps: &Capabilities<'_>,
    store: &RecordStore,
    dataset: &mut Dataset,
    group: &Group,
) -> Result<bool, SyncError> {
    let severed = !group.declares(&dataset.name);
    if severed {
        dataset.remove_group(&group.name);
        for kind in PayloadKind::all() {
            let (Some(artifact), Some(folder)) = (dataset.artifact_id(*kind), group.folder_id(*kind)) else {
                continue;
            };
            let parents = caps.standard.get_parents(artifact)?;
            if parents.contains(folder) {
                caps.ownership.remove_parent(artifact, folder)?;
                tracing::info!("unlinked {kind} artifact of '{}' from group '{}'", dataset.name, group.name);
            }
        }
    }

    store.save_dataset(dataset)?;
    Ok(severed)
}

fn group_folders(group: &Group) -> Result<Vec<(PayloadKind, RemoteId)>, SyncError> {
    PayloadKind::all()
        .iter()
        .map(|kind| {
            group.folder_id(*kind).cloned().map(|id| (*kind, id)).ok_or_else(|| {
                SyncError::PreconditionViolation(format!(
                    "group '{}' has no {kind} folder; initialize its folder skeleton first",
                    group.name
                ))
            })
        })
        .collect()
}

fn apply_plan(
    caps: &Capabilities<'_>,
    kind: PayloadKind,
    folder: &RemoteId,
    plan: &LinkPlan,
    report: &mut GroupReconcileReport,
) -> Result<(), SyncError> {
    for artifact in &plan.to_add {
        caps.ownership.add_parent(artifact, folder)?;
        tracing::info!("linked {kind} artifact {artifact} into {folder}");
        report.linked.push((kind, artifact.clone()));
    }
    for orphan in &plan.to_remove {
        caps.ownership.remove_parent(orphan, folder)?;
        tracing::info!("removed orphaned {kind} link {orphan} from {folder}");
        report.unlinked.push((kind, orphan.clone()));
    }
    Ok(())
}

/// Datasets that list `group` without being declared by it.
fn stale_members(store: &RecordStore, group: &Group) -> Result<Vec<Dataset>, SyncError> {
    Ok(store
        .list_datasets()?
        .into_iter()
        .filter(|d| d.in_group(&group.name) && !group.declares(&d.name))
        .collect())
}

//! Get-or-create for remote folders, and the group folder skeleton.
//!
//! The remote API has no atomic create-if-absent: two processes racing on the
//! same `(name, parent)` can both create a folder. Runs are expected to be
//! serialized; no retry or dedup is attempted here.

use mirror_core::types::{Group, PayloadKind, RemoteId};
use mirror_core::RecordStore;

use crate::caps::Capabilities;
use crate::SyncError;

/// Name of the per-category folder that holds group folders.
pub const GROUPS_FOLDER: &str = "groups";

/// Return the child of `parent` named exactly `name`, creating it if absent.
///
/// New folders are created by the ownership-capable identity and handed to
/// the administrative principal.
pub fn ensure_folder(caps: &Capabilities<'_>, name: &str, parent: &RemoteId) -> Result<RemoteId, SyncError> {
    if let Some(id) = caps.standard.find_child_by_name(name, parent)? {
        tracing::debug!("folder '{name}' exists: {id}");
        return Ok(id);
    }

    tracing::info!("creating remote folder '{name}' under {parent}");
    let id = caps.ownership.create_folder(name, parent)?;
    transfer_ownership(caps, &id)?;
    Ok(id)
}

/// Hand a freshly created node to the administrative principal.
pub(crate) fn transfer_ownership(caps: &Capabilities<'_>, id: &RemoteId) -> Result<(), SyncError> {
    if caps.owner.is_empty() {
        tracing::debug!("no owner configured; {id} keeps its creator");
        return Ok(());
    }
    caps.ownership.set_owner(id, caps.owner)?;
    Ok(())
}

/// Folder name of a group's payload sub-folder, e.g. `roads_gdb`.
pub fn group_payload_folder_name(group: &Group, kind: PayloadKind) -> String {
    format!("{}_{}", group.name, kind.suffix())
}

/// Ensure `<root>/<category>/groups/<group>/{<group>_gdb,<group>_shp}` and
/// record the resulting IDs on `group`.
///
/// Converges when called repeatedly. The record is persisted every call.
pub fn init_group_skeleton(
    caps: &Capabilities<'_>,
    store: &RecordStore,
    root: &RemoteId,
    group: &mut Group,
) -> Result<(), SyncError> {
    let category_id = ensure_folder(caps, &group.category, root)?;
    let groups_id = ensure_folder(caps, GROUPS_FOLDER, &category_id)?;
    let group_id = ensure_folder(caps, group.name.as_str(), &groups_id)?;
    let primary_id = ensure_folder(caps, &group_payload_folder_name(group, PayloadKind::Primary), &group_id)?;
    let shape_id = ensure_folder(caps, &group_payload_folder_name(group, PayloadKind::Shape), &group_id)?;

    if !group.parent_ids.contains(&group_id) {
        group.parent_ids.push(group_id);
    }
    if group.primary_folder_id.as_ref() != Some(&primary_id) {
        group.primary_folder_id = Some(primary_id);
    }
    if group.shape_folder_id.as_ref() != Some(&shape_id) {
        group.shape_folder_id = Some(shape_id);
    }

    store.save_group(group)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryHierarchy;
    use tempfile::TempDir;

    const OWNER: &str = "admin@example.org";

    fn root() -> RemoteId {
        RemoteId::from("root")
    }

    #[test]
    fn ensure_folder_is_get_or_create() {
        let remote = MemoryHierarchy::new().with_root("root", "root");
        let caps = Capabilities::single(&remote, OWNER);

        let first = ensure_folder(&caps, "water", &root()).expect("first");
        let second = ensure_folder(&caps, "water", &root()).expect("second");
        assert_eq!(first, second);
        assert_eq!(remote.count_named("water", &root()), 1);
        assert_eq!(remote.node(&first).expect("node").owner.as_deref(), Some(OWNER));
    }

    #[test]
    fn ensure_folder_without_owner_skips_transfer() {
        let remote = MemoryHierarchy::new().with_root("root", "root");
        let caps = Capabilities::single(&remote, "");
        let id = ensure_folder(&caps, "water", &root()).expect("ensure");
        assert!(remote.node(&id).expect("node").owner.is_none());
        assert_eq!(remote.write_count(), 1);
    }

    #[test]
    fn skeleton_converges_on_repeat() {
        let dir = TempDir::new().expect("tempdir");
        let store = RecordStore::open(dir.path());
        let remote = MemoryHierarchy::new().with_root("root", "root");
        let caps = Capabilities::single(&remote, OWNER);

        let mut group = Group::new("Roads", "transportation");
        init_group_skeleton(&caps, &store, &root(), &mut group).expect("init");
        let writes_after_first = remote.write_count();
        let snapshot = group.clone();

        init_group_skeleton(&caps, &store, &root(), &mut group).expect("again");
        assert_eq!(group, snapshot);
        assert_eq!(remote.write_count(), writes_after_first, "second init must not write");

        let primary = group.primary_folder_id.clone().expect("primary");
        assert_eq!(remote.node(&primary).expect("node").name, "Roads_gdb");
        assert_eq!(group.parent_ids.len(), 1);
        assert!(!group.needs_skeleton());
        assert_eq!(store.load_group(&group.name).expect("persisted"), group);
    }

    #[test]
    fn skeleton_replaces_stale_folder_ids() {
        let dir = TempDir::new().expect("tempdir");
        let store = RecordStore::open(dir.path());
        let remote = MemoryHierarchy::new().with_root("root", "root");
        let caps = Capabilities::single(&remote, OWNER);

        let mut group = Group::new("roads", "transportation");
        group.shape_folder_id = Some(RemoteId::from("deleted-long-ago"));
        init_group_skeleton(&caps, &store, &root(), &mut group).expect("init");

        let shape = group.shape_folder_id.expect("shape");
        assert!(remote.contains(&shape));
    }
}

//! JSON record store for datasets and groups.
//!
//! # Storage layout
//!
//! ```text
//! <root>/
//!   datasets/<normalized-name>.json   (mode 0600)
//!   groups/<normalized-name>.json     (mode 0600)
//! ```
//!
//! Records are keyed by [`normalize_name`](crate::types::normalize_name), so
//! `Trails` and `trails` address the same file. Saves are atomic: serialize →
//! `.json.tmp` sibling → `rename`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{io_err, RecordError};
use crate::types::{Dataset, DatasetName, Group, GroupName};

const DATASETS_DIR: &str = "datasets";
const GROUPS_DIR: &str = "groups";

/// Durable key-value store of [`Dataset`] and [`Group`] records.
#[derive(Debug, Clone)]
pub struct RecordStore {
    root: PathBuf,
}

impl RecordStore {
    /// Open a store rooted at `root`. Directories are created lazily on save.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // -----------------------------------------------------------------------
    // Paths
    // -----------------------------------------------------------------------

    /// `<root>/datasets/<key>.json`. Pure, no I/O.
    pub fn dataset_path(&self, name: &DatasetName) -> PathBuf {
        self.root.join(DATASETS_DIR).join(format!("{}.json", name.key()))
    }

    /// `<root>/groups/<key>.json`. Pure, no I/O.
    pub fn group_path(&self, name: &GroupName) -> PathBuf {
        self.root.join(GROUPS_DIR).join(format!("{}.json", name.key()))
    }

    // -----------------------------------------------------------------------
    // Datasets
    // -----------------------------------------------------------------------

    pub fn load_dataset(&self, name: &DatasetName) -> Result<Dataset, RecordError> {
        let path = self.dataset_path(name);
        load_record(&path, "dataset", name.as_str())
    }

    /// Fails with [`RecordError::InvalidName`] for names that are not a
    /// single path component.
    pub fn save_dataset(&self, dataset: &Dataset) -> Result<(), RecordError> {
        check_name("dataset", dataset.name.is_valid(), dataset.name.as_str())?;
        save_record(&self.dataset_path(&dataset.name), dataset)
    }

    pub fn delete_dataset(&self, name: &DatasetName) -> Result<(), RecordError> {
        let path = self.dataset_path(name);
        std::fs::remove_file(&path).map_err(|e| io_err(&path, e))
    }

    pub fn dataset_exists(&self, name: &DatasetName) -> bool {
        self.dataset_path(name).exists()
    }

    /// Create a dataset record with empty remote IDs on first encounter.
    ///
    /// Idempotent: an existing record is returned unchanged.
    pub fn register_dataset(&self, name: DatasetName, category: &str) -> Result<Dataset, RecordError> {
        if self.dataset_exists(&name) {
            return self.load_dataset(&name);
        }
        let dataset = Dataset::new(name, category);
        self.save_dataset(&dataset)?;
        Ok(dataset)
    }

    /// All dataset records, sorted by normalized name.
    pub fn list_datasets(&self) -> Result<Vec<Dataset>, RecordError> {
        list_records(&self.root.join(DATASETS_DIR))
    }

    // -----------------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------------

    pub fn load_group(&self, name: &GroupName) -> Result<Group, RecordError> {
        let path = self.group_path(name);
        load_record(&path, "group", name.as_str())
    }

    pub fn save_group(&self, group: &Group) -> Result<(), RecordError> {
        check_name("group", group.name.is_valid(), group.name.as_str())?;
        save_record(&self.group_path(&group.name), group)
    }

    pub fn group_exists(&self, name: &GroupName) -> bool {
        self.group_path(name).exists()
    }

    /// Create a group record on first encounter, or add `members` to the
    /// declared membership of an existing one.
    pub fn register_group(
        &self,
        name: GroupName,
        category: &str,
        members: impl IntoIterator<Item = DatasetName>,
    ) -> Result<Group, RecordError> {
        let mut group = if self.group_exists(&name) {
            self.load_group(&name)?
        } else {
            Group::new(name, category)
        };
        group.datasets.extend(members);
        self.save_group(&group)?;
        Ok(group)
    }

    /// All group records, sorted by normalized name.
    pub fn list_groups(&self) -> Result<Vec<Group>, RecordError> {
        list_records(&self.root.join(GROUPS_DIR))
    }

    /// Drop `dataset` from the declared membership of `group` and persist.
    ///
    /// Returns `false` if the group did not declare it.
    pub fn remove_dataset_from_group(
        &self,
        group: &GroupName,
        dataset: &DatasetName,
    ) -> Result<bool, RecordError> {
        let mut record = self.load_group(group)?;
        if !record.datasets.remove(dataset) {
            return Ok(false);
        }
        self.save_group(&record)?;
        Ok(true)
    }

    /// Groups that declare at least one of `datasets`.
    pub fn groups_containing(&self, datasets: &BTreeSet<DatasetName>) -> Result<Vec<Group>, RecordError> {
        Ok(self
            .list_groups()?
            .into_iter()
            .filter(|g| g.datasets.iter().any(|d| datasets.contains(d)))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn check_name(kind: &'static str, valid: bool, name: &str) -> Result<(), RecordError> {
    if valid {
        return Ok(());
    }
    Err(RecordError::InvalidName {
        kind,
        name: name.to_string(),
    })
}

fn load_record<T: DeserializeOwned>(path: &Path, kind: &'static str, name: &str) -> Result<T, RecordError> {
    if !path.exists() {
        return Err(RecordError::NotFound {
            kind,
            name: name.to_string(),
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_json::from_str(&contents).map_err(|e| RecordError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

fn save_record<T: Serialize>(path: &Path, record: &T) -> Result<(), RecordError> {
    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("invalid record path")));
    };
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        set_dir_permissions(dir)?;
    }

    let json = serde_json::to_string_pretty(record)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

fn list_records<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>, RecordError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .map_err(|e| io_err(dir, e))?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
        .collect();
    entries.sort_by_key(|e| e.file_name());

    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        let path = entry.path();
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        let record = serde_json::from_str(&contents).map_err(|e| RecordError::Parse {
            path: path.clone(),
            source: e,
        })?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), RecordError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700)).map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), RecordError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), RecordError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), RecordError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RemoteId;
    use tempfile::TempDir;

    fn store() -> (TempDir, RecordStore) {
        let dir = TempDir::new().expect("tempdir");
        let store = RecordStore::open(dir.path());
        (dir, store)
    }

    #[test]
    fn dataset_path_uses_normalized_key() {
        let (_dir, store) = store();
        let path = store.dataset_path(&DatasetName::from("SGID.Water.Lakes"));
        assert!(path.ends_with("datasets/sgid.water.lakes.json"));
    }

    #[test]
    fn save_and_load_dataset_roundtrip() {
        let (_dir, store) = store();
        let mut ds = Dataset::new("Lakes", "water");
        ds.primary_file_id = Some(RemoteId::from("file-1"));
        store.save_dataset(&ds).expect("save");

        let loaded = store.load_dataset(&DatasetName::from("LAKES")).expect("load");
        assert_eq!(loaded, ds);
        assert_eq!(loaded.name.as_str(), "Lakes");
    }

    #[test]
    fn save_cleans_up_tmp() {
        let (_dir, store) = store();
        store.save_dataset(&Dataset::new("lakes", "water")).expect("save");
        let tmp = store.dataset_path(&DatasetName::from("lakes")).with_extension("json.tmp");
        assert!(!tmp.exists(), ".tmp must be gone after successful save");
    }

    #[test]
    fn missing_record_is_not_found() {
        let (_dir, store) = store();
        let err = store.load_group(&GroupName::from("nope")).unwrap_err();
        assert!(matches!(err, RecordError::NotFound { kind: "group", .. }));
    }

    #[test]
    fn register_dataset_is_idempotent() {
        let (_dir, store) = store();
        let mut first = store.register_dataset(DatasetName::from("lakes"), "water").expect("register");
        first.groups.push(GroupName::from("hydro"));
        store.save_dataset(&first).expect("save");

        let again = store.register_dataset(DatasetName::from("Lakes"), "other").expect("register");
        assert_eq!(again.category, "water");
        assert_eq!(again.groups, vec![GroupName::from("hydro")]);
    }

    #[test]
    fn register_group_merges_members() {
        let (_dir, store) = store();
        store
            .register_group(GroupName::from("hydro"), "water", [DatasetName::from("lakes")])
            .expect("register");
        let group = store
            .register_group(GroupName::from("Hydro"), "water", [DatasetName::from("rivers")])
            .expect("register");
        assert_eq!(group.datasets.len(), 2);
    }

    #[test]
    fn remove_dataset_from_group_persists() {
        let (_dir, store) = store();
        store
            .register_group(
                GroupName::from("hydro"),
                "water",
                [DatasetName::from("lakes"), DatasetName::from("rivers")],
            )
            .expect("register");

        assert!(store
            .remove_dataset_from_group(&GroupName::from("hydro"), &DatasetName::from("LAKES"))
            .expect("remove"));
        assert!(!store
            .remove_dataset_from_group(&GroupName::from("hydro"), &DatasetName::from("lakes"))
            .expect("remove twice"));

        let group = store.load_group(&GroupName::from("hydro")).expect("load");
        assert_eq!(group.datasets.len(), 1);
    }

    #[test]
    fn list_is_sorted_and_empty_when_missing() {
        let (_dir, store) = store();
        assert!(store.list_datasets().expect("list").is_empty());

        store.save_dataset(&Dataset::new("rivers", "water")).expect("save");
        store.save_dataset(&Dataset::new("Lakes", "water")).expect("save");
        let names: Vec<String> = store
            .list_datasets()
            .expect("list")
            .into_iter()
            .map(|d| d.name.key())
            .collect();
        assert_eq!(names, vec!["lakes", "rivers"]);
    }

    #[test]
    fn groups_containing_matches_any_member() {
        let (_dir, store) = store();
        store
            .register_group(GroupName::from("hydro"), "water", [DatasetName::from("lakes")])
            .expect("register");
        store
            .register_group(GroupName::from("roads"), "transportation", [DatasetName::from("highways")])
            .expect("register");

        let changed: BTreeSet<DatasetName> = [DatasetName::from("LAKES")].into_iter().collect();
        let groups = store.groups_containing(&changed).expect("query");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, GroupName::from("hydro"));
    }

    #[test]
    fn delete_dataset_removes_file() {
        let (_dir, store) = store();
        store.save_dataset(&Dataset::new("lakes", "water")).expect("save");
        store.delete_dataset(&DatasetName::from("lakes")).expect("delete");
        assert!(!store.dataset_exists(&DatasetName::from("lakes")));
    }
}

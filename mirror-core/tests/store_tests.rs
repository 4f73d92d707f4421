//! Record store error-message, atomic-write-safety, and layout integration tests.
//! Storage: <root>/datasets/<key>.json and <root>/groups/<key>.json

use assert_fs::prelude::*;
use mirror_core::{
    types::{Dataset, DatasetName, Group, GroupName, RemoteId},
    RecordError, RecordStore,
};
use predicates::prelude::predicate;
use rstest::rstest;
use std::fs;

fn lakes() -> DatasetName { DatasetName::from("SGID.Water.Lakes") }
fn hydro() -> GroupName { GroupName::from("Hydrography") }

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn load_missing_dataset_names_kind_and_path() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let store = RecordStore::open(root.path());
    let err = store.load_dataset(&lakes()).unwrap_err();
    assert!(matches!(err, RecordError::NotFound { .. }), "got: {err}");
    let msg = err.to_string();
    assert!(msg.contains("dataset"), "got: {msg}");
    assert!(msg.contains("sgid.water.lakes.json"), "got: {msg}");
}

#[test]
fn load_corrupt_json_returns_parse_error_with_path() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("groups/hydrography.json")
        .write_str("{ \"name\": [unclosed")
        .expect("write");

    let store = RecordStore::open(root.path());
    let err = store.load_group(&hydro()).unwrap_err();
    assert!(matches!(err, RecordError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("hydrography.json"));
}

#[test]
fn list_fails_loudly_on_corrupt_record() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("datasets/broken.json").write_str("[]").expect("write");

    let store = RecordStore::open(root.path());
    assert!(matches!(store.list_datasets(), Err(RecordError::Parse { .. })));
}

// ---------------------------------------------------------------------------
// 2. Atomic write safety
// ---------------------------------------------------------------------------

#[test]
fn interrupted_save_leaves_original_intact() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let store = RecordStore::open(root.path());
    store.save_dataset(&Dataset::new(lakes(), "water")).expect("save");

    let path = store.dataset_path(&lakes());
    let original = fs::read(&path).expect("read original");

    // Simulate crash: .tmp written but process died before rename
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, b"CRASH - INCOMPLETE WRITE").expect("write crash tmp");

    assert_eq!(fs::read(&path).expect("read after crash"), original);
    assert!(store.load_dataset(&lakes()).is_ok());
    // Listing ignores the orphaned .tmp sibling.
    assert_eq!(store.list_datasets().expect("list").len(), 1);
}

#[test]
fn saved_record_has_private_permissions() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let store = RecordStore::open(root.path());
    store.save_group(&Group::new(hydro(), "water")).expect("save");

    root.child("groups/hydrography.json").assert(predicate::path::exists());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(store.group_path(&hydro()))
            .expect("meta")
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o600, "expected 0600, got {mode:o}");
    }
}

// ---------------------------------------------------------------------------
// 3. Record shape
// ---------------------------------------------------------------------------

#[rstest]
#[case("SGID.Water.Lakes")]
#[case("sgid.water.lakes")]
#[case("  SGID.WATER.LAKES ")]
fn any_spelling_addresses_the_same_record(#[case] spelling: &str) {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let store = RecordStore::open(root.path());
    let mut ds = Dataset::new(lakes(), "water");
    ds.shape_file_id = Some(RemoteId::from("shape-1"));
    store.save_dataset(&ds).expect("save");

    let loaded = store.load_dataset(&DatasetName::from(spelling)).expect("load");
    assert_eq!(loaded.shape_file_id, Some(RemoteId::from("shape-1")));
}

#[test]
fn unset_ids_are_omitted_as_null_and_reload() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let store = RecordStore::open(root.path());
    let mut group = Group::new(hydro(), "water");
    group.datasets.insert(lakes());
    store.save_group(&group).expect("save");

    let raw = fs::read_to_string(store.group_path(&hydro())).expect("read");
    assert!(raw.contains("\"primary_folder_id\": null"), "got: {raw}");
    assert_eq!(store.load_group(&hydro()).expect("load"), group);
}

#[test]
fn legacy_record_with_empty_ids_loads() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("groups/hydrography.json")
        .write_str(
            r#"{"name":"Hydrography","category":"water","datasets":["Lakes"],
                "parent_ids":[],"primary_folder_id":"","shape_folder_id":""}"#,
        )
        .expect("write");

    let group = RecordStore::open(root.path()).load_group(&hydro()).expect("load");
    assert!(group.needs_skeleton());
    assert!(group.declares(&DatasetName::from("lakes")));
}

// ---------------------------------------------------------------------------
// 4. Name validation
// ---------------------------------------------------------------------------

#[rstest]
#[case("")]
#[case("   ")]
#[case(".")]
#[case("..")]
#[case("a/b")]
#[case("a\\b")]
fn unusable_names_are_rejected_before_touching_disk(#[case] name: &str) {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let store = RecordStore::open(root.path());

    let err = store
        .register_dataset(DatasetName::from(name), "water")
        .expect_err("dataset name rejected");
    assert!(matches!(err, RecordError::InvalidName { kind: "dataset", .. }), "{err}");

    let err = store
        .register_group(GroupName::from(name), "water", [lakes()])
        .expect_err("group name rejected");
    assert!(matches!(err, RecordError::InvalidName { kind: "group", .. }), "{err}");

    root.child("datasets").assert(predicate::path::missing());
    root.child("groups").assert(predicate::path::missing());
}

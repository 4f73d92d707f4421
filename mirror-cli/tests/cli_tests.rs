use std::fs;
use std::path::Path;
use assert_cmd::Command;

use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn mirror_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("catalog-mirror"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env_remove("CATALOG_MIRROR_TOKEN")
        .env_remove("CATALOG_MIRROR_OWNER_TOKEN")
        .current_dir(home);
    cmd
}

fn register_lakes(home: &Path) {
    mirror_cmd(home)
        .args(["register", "dataset", "Lakes", "--category", "water"])
        .assert()
        .success()
        .stdout(contains("dataset 'Lakes' registered"));
}

#[test]
fn register_then_status_lists_records() {
    let home = TempDir::new().expect("home");
    register_lakes(home.path());
    mirror_cmd(home.path())
        .args(["register", "group", "Hydro", "-c", "water", "-m", "lakes", "-m", "Rivers"])
        .assert()
        .success()
        .stdout(contains("2 member(s)"))
        .stdout(contains("'Rivers' has no dataset record"));

    mirror_cmd(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(contains("1 datasets | 1 groups"))
        .stdout(contains("Lakes"))
        .stdout(contains("Hydro"));

    let output = mirror_cmd(home.path())
        .args(["status", "--json"])
        .output()
        .expect("status --json");
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(json["datasets"][0]["name"], "Lakes");
    assert_eq!(json["datasets"][0]["category"], "water");
    assert_eq!(json["groups"][0]["datasets"].as_array().map(Vec::len), Some(2));
}

#[test]
fn records_land_under_home() {
    let home = TempDir::new().expect("home");
    register_lakes(home.path());
    assert!(home
        .path()
        .join(".catalog-mirror/records/datasets/lakes.json")
        .is_file());
}

#[test]
fn register_rejects_path_like_names() {
    let home = TempDir::new().expect("home");
    mirror_cmd(home.path())
        .args(["register", "dataset", "..", "--category", "water"])
        .assert()
        .failure()
        .stderr(contains("invalid dataset name '..'"));
    assert!(!home.path().join(".catalog-mirror/records/datasets").exists());
}

#[test]
fn status_on_empty_store() {
    let home = TempDir::new().expect("home");
    mirror_cmd(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(contains("No records registered."));
}

#[test]
fn declined_delete_keeps_record() {
    let home = TempDir::new().expect("home");
    register_lakes(home.path());

    mirror_cmd(home.path())
        .args(["delete", "lakes"])
        .write_stdin("no\n")
        .assert()
        .success()
        .stdout(contains("Deleting water.Lakes"))
        .stdout(contains("Quitting without delete"));

    assert!(home
        .path()
        .join(".catalog-mirror/records/datasets/lakes.json")
        .is_file());
}

#[test]
fn delete_of_unknown_dataset_fails() {
    let home = TempDir::new().expect("home");
    mirror_cmd(home.path())
        .args(["delete", "nothing", "--yes"])
        .assert()
        .failure()
        .stderr(contains("no record for dataset 'nothing'"));
}

#[test]
fn sync_without_root_folder_reports_config() {
    let home = TempDir::new().expect("home");
    let workspace = TempDir::new().expect("workspace");
    register_lakes(home.path());

    mirror_cmd(home.path())
        .args(["dataset", "Lakes", "--workspace"])
        .arg(workspace.path())
        .assert()
        .failure()
        .stderr(contains("root_folder_id is not configured"));
}

#[test]
fn sync_without_token_names_the_variable() {
    let home = TempDir::new().expect("home");
    let workspace = TempDir::new().expect("workspace");
    let config_dir = home.path().join(".catalog-mirror");
    fs::create_dir_all(&config_dir).expect("mkdir");
    fs::write(config_dir.join("config.yaml"), "root_folder_id: root-123\n").expect("config");

    mirror_cmd(home.path())
        .args(["group", "Hydro", "--workspace"])
        .arg(workspace.path())
        .assert()
        .failure()
        .stderr(contains("CATALOG_MIRROR_TOKEN"));
    assert!(home.path().join("package_temp").is_dir());
}

#[test]
fn dataset_requires_names_or_list() {
    let home = TempDir::new().expect("home");
    mirror_cmd(home.path())
        .arg("dataset")
        .assert()
        .failure()
        .stderr(contains("required").or(contains("NAMES")));
}

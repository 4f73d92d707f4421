//! Shared pipeline entrypoint used by the CLI.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use mirror_core::types::{DatasetName, GroupName};
use mirror_detector::{detect_changes, ChangeWindow};

use crate::error::io_err;
use crate::mirror::{Mirror, RunSummary, UpdateOptions};
use crate::SyncError;

/// Scope for a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncScope {
    /// Datasets the change table reports, optionally limited to a category.
    ChangedDatasets { category: Option<String> },
    /// An explicit dataset list.
    Datasets(Vec<DatasetName>),
    /// Groups declaring any changed dataset.
    ChangedGroups,
    /// An explicit group list.
    Groups(Vec<GroupName>),
}

impl SyncScope {
    fn needs_changes(&self) -> bool {
        matches!(self, SyncScope::ChangedDatasets { .. } | SyncScope::ChangedGroups)
    }
}

/// Where the change-driven scopes read their input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSource {
    pub table: PathBuf,
    pub today: NaiveDate,
    pub window: ChangeWindow,
}

impl ChangeSource {
    fn changed(&self) -> Result<BTreeSet<DatasetName>, SyncError> {
        Ok(detect_changes(&self.table, self.today, self.window)?)
    }
}

/// Run the pipeline for a scope.
///
/// Per-item failures land in [`RunSummary::failures`]; only problems that
/// prevent the run from starting (an unreadable change table) are returned
/// as `Err`.
pub fn run(
    mirror: &Mirror<'_>,
    scope: SyncScope,
    changes: &ChangeSource,
    output_dir: &Path,
    options: UpdateOptions,
) -> Result<RunSummary, SyncError> {
    let changed = if scope.needs_changes() {
        let changed = changes.changed()?;
        tracing::info!("{} changed table(s) in {}", changed.len(), changes.window);
        changed
    } else {
        BTreeSet::new()
    };

    let summary = match scope {
        SyncScope::ChangedDatasets { category } => {
            mirror.run_changed(&changed, category.as_deref(), output_dir, options)
        }
        SyncScope::Datasets(names) => mirror.run_datasets(names, output_dir, options),
        SyncScope::ChangedGroups => mirror.run_changed_groups(&changed, output_dir, options),
        SyncScope::Groups(names) => mirror.run_groups(names, output_dir, options),
    };
    Ok(summary)
}

#[derive(Debug, Deserialize)]
struct DatasetList {
    datasets: Vec<DatasetName>,
}

#[derive(Debug, Deserialize)]
struct GroupList {
    groups: Vec<GroupName>,
}

/// Read `{"datasets": [...]}`.
pub fn read_dataset_list(path: &Path) -> Result<Vec<DatasetName>, SyncError> {
    let list: DatasetList = read_list(path)?;
    Ok(list.datasets)
}

/// Read `{"groups": [...]}`.
pub fn read_group_list(path: &Path) -> Result<Vec<GroupName>, SyncError> {
    let list: GroupList = read_list(path)?;
    Ok(list.groups)
}

fn read_list<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, SyncError> {
    let text = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_json::from_str(&text)
        .map_err(|e| SyncError::PreconditionViolation(format!("invalid list file {}: {e}", path.display())))
}

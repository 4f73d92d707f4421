//! Ports to the external collaborators: the remote hierarchy and the audit log.
//!
//! A node in the remote hierarchy may have several parents. Implementations
//! take `&self`; any connection state lives behind interior handles.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Local};

use crate::error::RemoteError;
use crate::types::RemoteId;

/// Mime type of folders in the remote hierarchy.
pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

/// Mime type used for archive artifacts.
pub const ARCHIVE_MIME: &str = "application/gzip";

/// Mime type used for the hash artifact.
pub const TEXT_MIME: &str = "text/plain";

/// One child of a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEntry {
    pub name: String,
    pub id: RemoteId,
}

/// Operations over a remote tree of folders and files addressed by opaque IDs.
pub trait RemoteHierarchy {
    fn create_folder(&self, name: &str, parent: &RemoteId) -> Result<RemoteId, RemoteError>;

    fn create_file(
        &self,
        name: &str,
        parents: &[RemoteId],
        local_path: &Path,
        mime_type: &str,
    ) -> Result<RemoteId, RemoteError>;

    fn update_file(&self, id: &RemoteId, local_path: &Path, mime_type: &str) -> Result<(), RemoteError>;

    fn list_children(&self, parent: &RemoteId) -> Result<Vec<ChildEntry>, RemoteError>;

    /// Exact, case-sensitive match on the child's name.
    fn find_child_by_name(&self, name: &str, parent: &RemoteId) -> Result<Option<RemoteId>, RemoteError>;

    fn get_parents(&self, id: &RemoteId) -> Result<BTreeSet<RemoteId>, RemoteError>;

    fn add_parent(&self, id: &RemoteId, parent: &RemoteId) -> Result<(), RemoteError>;

    fn remove_parent(&self, id: &RemoteId, parent: &RemoteId) -> Result<(), RemoteError>;

    fn set_owner(&self, id: &RemoteId, principal: &str) -> Result<(), RemoteError>;

    fn delete(&self, id: &RemoteId) -> Result<(), RemoteError>;
}

/// One row of the processing log: label, date, time, duration in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRow {
    pub label: String,
    pub at: DateTime<Local>,
    pub duration_secs: f64,
}

impl AuditRow {
    pub fn new(label: impl Into<String>, at: DateTime<Local>, duration_secs: f64) -> Self {
        Self {
            label: label.into(),
            at,
            duration_secs,
        }
    }

    /// Cell values in sheet column order.
    pub fn cells(&self) -> Vec<String> {
        vec![
            self.label.clone(),
            self.at.format("%m/%d/%Y").to_string(),
            self.at.format("%H:%M:%S%.6f").to_string(),
            format!("{:.3}", self.duration_secs),
        ]
    }
}

/// Append-only row log of per-dataset outcomes.
pub trait AuditLog {
    fn append_row(&self, sheet_id: &str, tab: &str, row: &AuditRow) -> Result<(), RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn audit_row_cells_use_sheet_formats() {
        let at = Local.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).single().expect("time");
        let row = AuditRow::new("water.lakes", at, 1.25);
        assert_eq!(
            row.cells(),
            vec!["water.lakes", "03/04/2026", "05:06:07.000000", "1.250"]
        );
    }
}

//! Change detection for `mirror-detector`.
//!
//! The source system maintains a change-detection table: one row per source
//! table with the calendar date it was last modified. [`changed_datasets`]
//! selects the rows whose date falls inside a trailing window ending before
//! `today` (by default: yesterday only).

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Days, NaiveDate};
use mirror_core::types::DatasetName;
use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Trailing window of calendar days, always ending the day before `today`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeWindow {
    /// Only the previous calendar day.
    #[default]
    Yesterday,
    /// The `n` days before today.
    TrailingDays(u32),
}

impl ChangeWindow {
    /// Inclusive `(first, last)` dates covered relative to `today`.
    ///
    /// Windows reaching past the earliest representable date are clamped.
    pub fn bounds(self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let days = match self {
            ChangeWindow::Yesterday => 1,
            ChangeWindow::TrailingDays(n) => n.max(1),
        };
        let last = today.checked_sub_days(Days::new(1)).unwrap_or(NaiveDate::MIN);
        let first = today
            .checked_sub_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MIN);
        (first, last)
    }

    pub fn contains(self, today: NaiveDate, date: NaiveDate) -> bool {
        let (first, last) = self.bounds(today);
        date >= first && date <= last
    }
}

impl std::fmt::Display for ChangeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeWindow::Yesterday => write!(f, "yesterday"),
            ChangeWindow::TrailingDays(n) => write!(f, "the last {} day(s)", n.max(&1)),
        }
    }
}

/// One row of the change-detection table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChangeEntry {
    pub table_name: String,
    pub last_modified: NaiveDate,
}

/// Errors from change detection.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("I/O error reading change table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse change table {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Load the change-detection table from a JSON array of
/// `{ "table_name": .., "last_modified": "YYYY-MM-DD" }` objects.
pub fn load_table(path: &Path) -> Result<Vec<ChangeEntry>, DetectError> {
    let contents = fs::read_to_string(path).map_err(|e| DetectError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&contents).map_err(|e| DetectError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Dataset names whose backing table changed inside `window`.
pub fn changed_datasets(
    table: &[ChangeEntry],
    today: NaiveDate,
    window: ChangeWindow,
) -> BTreeSet<DatasetName> {
    table
        .iter()
        .filter(|entry| window.contains(today, entry.last_modified))
        .map(|entry| DatasetName::from(entry.table_name.trim()))
        .collect()
}

/// Convenience: [`load_table`] followed by [`changed_datasets`].
pub fn detect_changes(
    path: &Path,
    today: NaiveDate,
    window: ChangeWindow,
) -> Result<BTreeSet<DatasetName>, DetectError> {
    let table = load_table(path)?;
    Ok(changed_datasets(&table, today, window))
}

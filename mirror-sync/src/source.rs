//! Source data access: reachability probe and local export.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use mirror_core::types::{normalize_name, DatasetName};

use crate::error::{io_err, SyncError};

/// Directories produced by exporting one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedPayload {
    /// Full-fidelity copy, packaged as the primary artifact.
    pub primary_dir: PathBuf,
    /// Interchange copy, packaged as the shape artifact.
    pub shape_dir: PathBuf,
}

/// Where source datasets live and how they are copied out.
pub trait SourceCatalog {
    /// `true` if the dataset exists and can be read.
    fn probe(&self, name: &DatasetName) -> bool;

    /// Copy the dataset into `output_dir`, named after `output_name`.
    fn export(&self, name: &DatasetName, output_dir: &Path, output_name: &str) -> Result<ExportedPayload, SyncError>;
}

/// Datasets stored as entries of a workspace directory.
///
/// `<workspace>/<name>` may be a directory or a single file. Lookup tries the
/// exact name first, then any entry whose normalized name matches.
#[derive(Debug, Clone)]
pub struct WorkspaceCatalog {
    root: PathBuf,
}

impl WorkspaceCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve the on-disk location of `name`, if any. Names that would
    /// resolve outside the workspace never match.
    pub fn locate(&self, name: &DatasetName) -> Option<PathBuf> {
        if !name.is_valid() {
            return None;
        }
        let exact = self.root.join(name.as_str().trim());
        if exact.exists() {
            return Some(exact);
        }
        let key = name.key();
        fs::read_dir(&self.root)
            .ok()?
            .filter_map(|e| e.ok())
            .find(|e| normalize_name(&e.file_name().to_string_lossy()) == key)
            .map(|e| e.path())
    }
}

impl SourceCatalog for WorkspaceCatalog {
    fn probe(&self, name: &DatasetName) -> bool {
        let Some(path) = self.locate(name) else {
            return false;
        };
        if path.is_dir() {
            return fs::read_dir(&path)
                .map(|mut entries| matches!(entries.next(), Some(Ok(_))))
                .unwrap_or(false);
        }
        fs::File::open(&path).is_ok() && fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false)
    }

    fn export(&self, name: &DatasetName, output_dir: &Path, output_name: &str) -> Result<ExportedPayload, SyncError> {
        let source = self.locate(name).ok_or_else(|| SyncError::SourceUnavailable {
            name: name.to_string(),
        })?;

        let primary_dir = output_dir.join(format!("{output_name}.gdb"));
        let shape_dir = output_dir.join(output_name);
        copy_into(&source, &primary_dir)?;
        copy_into(&source, &shape_dir)?;

        Ok(ExportedPayload { primary_dir, shape_dir })
    }
}

/// Replace `dest` with a copy of `source` (a file lands inside `dest`).
fn copy_into(source: &Path, dest: &Path) -> Result<(), SyncError> {
    if dest.exists() {
        fs::remove_dir_all(dest).map_err(|e| io_err(dest, e))?;
    }
    fs::create_dir_all(dest).map_err(|e| io_err(dest, e))?;

    if source.is_file() {
        let file_name = source.file_name().unwrap_or(source.as_os_str());
        let target = dest.join(file_name);
        fs::copy(source, &target).map_err(|e| io_err(&target, e))?;
        return Ok(());
    }

    for entry in WalkDir::new(source).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|e| io_err(source, e.into()))?;
        let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| io_err(&target, e))?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target).map_err(|e| io_err(&target, e))?;
        }
    }
    Ok(())
}

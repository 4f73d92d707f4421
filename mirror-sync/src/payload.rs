//! Local payload production: export, archive packaging, hash manifest.
//!
//! For a dataset exported as `<name>`, the output directory ends up with:
//!
//! ```text
//! <out>/<name>_gdb.tar.gz   primary artifact
//! <out>/<name>_shp.tar.gz   shape artifact
//! <out>/<name>_hash.txt     "<sha256>  <relative path>" per exported file
//! ```
//!
//! The payload digest is the SHA-256 of the hash manifest, so it only moves
//! when exported content changes.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use mirror_core::types::{Dataset, PayloadKind};

use crate::error::{io_err, SyncError};
use crate::source::SourceCatalog;

/// The three local files uploaded for a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadFiles {
    pub primary: PathBuf,
    pub shape: PathBuf,
    pub hash: PathBuf,
}

impl PayloadFiles {
    /// Expected locations for `output_name` inside `output_dir`. Pure.
    pub fn locate(output_dir: &Path, output_name: &str) -> Self {
        Self {
            primary: output_dir.join(archive_name(output_name, PayloadKind::Primary)),
            shape: output_dir.join(archive_name(output_name, PayloadKind::Shape)),
            hash: output_dir.join(format!("{output_name}_hash.txt")),
        }
    }

    pub fn archive(&self, kind: PayloadKind) -> &Path {
        match kind {
            PayloadKind::Primary => &self.primary,
            PayloadKind::Shape => &self.shape,
        }
    }

    /// Files that do not exist on disk.
    pub fn missing(&self) -> Vec<&Path> {
        [&self.primary, &self.shape, &self.hash]
            .into_iter()
            .filter(|p| !p.exists())
            .map(PathBuf::as_path)
            .collect()
    }
}

/// A packaged payload ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedPayload {
    pub files: PayloadFiles,
    pub digest: String,
}

/// `<name>_gdb.tar.gz` / `<name>_shp.tar.gz`.
pub fn archive_name(output_name: &str, kind: PayloadKind) -> String {
    format!("{output_name}_{}.tar.gz", kind.suffix())
}

/// File-system friendly name for a dataset's local outputs.
pub fn output_name(dataset: &Dataset) -> String {
    dataset
        .name
        .as_str()
        .trim()
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

/// Export `dataset` from `source`, package both forms and write the manifest.
pub fn prepare(source: &dyn SourceCatalog, dataset: &Dataset, output_dir: &Path) -> Result<PreparedPayload, SyncError> {
    if !dataset.name.is_valid() {
        return Err(SyncError::PreconditionViolation(format!(
            "dataset name '{}' is not a single path component",
            dataset.name
        )));
    }
    fs::create_dir_all(output_dir).map_err(|e| io_err(output_dir, e))?;
    let name = output_name(dataset);
    let files = PayloadFiles::locate(output_dir, &name);

    tracing::info!("exporting '{}'", dataset.name);
    let exported = source.export(&dataset.name, output_dir, &name)?;

    tracing::info!("packaging '{}'", dataset.name);
    package_dir(&exported.primary_dir, &files.primary)?;
    package_dir(&exported.shape_dir, &files.shape)?;

    let manifest = hash_manifest(output_dir, &[&exported.primary_dir, &exported.shape_dir])?;
    fs::write(&files.hash, &manifest).map_err(|e| io_err(&files.hash, e))?;

    Ok(PreparedPayload {
        files,
        digest: digest_hex(manifest.as_bytes()),
    })
}

/// Digest of an existing hash manifest, for uploads of previously packaged payloads.
pub fn manifest_digest(files: &PayloadFiles) -> Result<String, SyncError> {
    let bytes = fs::read(&files.hash).map_err(|e| io_err(&files.hash, e))?;
    Ok(digest_hex(&bytes))
}

/// Gzip-compressed tarball of `dir`. Entries are named relative to the
/// directory's parent, so the archive unpacks into a folder named like `dir`.
/// `*.lock` files are skipped. Returns the number of files archived.
pub fn package_dir(dir: &Path, archive: &Path) -> Result<usize, SyncError> {
    let base = dir.parent().unwrap_or(dir);
    let file = File::create(archive).map_err(|e| io_err(archive, e))?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    let mut count = 0;
    for path in archived_files(dir)? {
        let relative = path.strip_prefix(base).unwrap_or(&path);
        builder
            .append_path_with_name(&path, relative)
            .map_err(|source| SyncError::Archive { path: path.clone(), source })?;
        count += 1;
    }

    let archive_err = |source| SyncError::Archive {
        path: archive.to_path_buf(),
        source,
    };
    let encoder = builder.into_inner().map_err(archive_err)?;
    encoder.finish().map_err(archive_err)?.flush().map_err(archive_err)?;
    tracing::debug!("packaged {count} file(s) into {}", archive.display());
    Ok(count)
}

/// One `"<sha256>  <path>"` line per archived file under `dirs`, paths
/// relative to `base`, sorted.
pub fn hash_manifest(base: &Path, dirs: &[&Path]) -> Result<String, SyncError> {
    let mut lines = Vec::new();
    for dir in dirs {
        for path in archived_files(dir)? {
            let relative = path.strip_prefix(base).unwrap_or(&path);
            let relative = relative.to_string_lossy().replace('\\', "/");
            lines.push(format!("{}  {relative}", hash_file(&path)?));
        }
    }
    lines.sort_by(|a, b| a[66..].cmp(&b[66..]));
    let mut manifest = lines.join("\n");
    manifest.push('\n');
    Ok(manifest)
}

fn archived_files(dir: &Path) -> Result<Vec<PathBuf>, SyncError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| io_err(dir, e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().is_some_and(|ext| ext == "lock") {
            continue;
        }
        files.push(entry.into_path());
    }
    Ok(files)
}

fn hash_file(path: &Path) -> Result<String, SyncError> {
    let mut file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf).map_err(|e| io_err(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn digest_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

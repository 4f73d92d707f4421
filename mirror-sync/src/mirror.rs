//! Sync orchestration: single-dataset update, upload-only, delete, and the
//! batch drivers that fan out over datasets and groups.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{Local, Utc};

use mirror_core::remote::{AuditLog, AuditRow, ARCHIVE_MIME, TEXT_MIME};
use mirror_core::types::{Dataset, DatasetName, Group, GroupName, PayloadKind, RemoteId};
use mirror_core::{RecordError, RecordStore, RemoteError};

use crate::caps::Capabilities;
use crate::folders::{ensure_folder, init_group_skeleton, transfer_ownership};
use crate::payload::{self, PayloadFiles};
use crate::reconcile::{reconcile_dataset_against_group, reconcile_group_members};
use crate::source::SourceCatalog;
use crate::SyncError;

/// Fixed remote locations and audit destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorSettings {
    /// Folder holding one sub-folder per category.
    pub root_folder_id: RemoteId,
    /// Folder receiving hash manifests. `None` skips the hash upload.
    pub hash_folder_id: Option<RemoteId>,
    pub audit_sheet_id: String,
    pub audit_tab: String,
}

/// Flags modifying a dataset update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Push packaged files to the remote hierarchy.
    pub upload: bool,
    /// Upload even when the payload digest is unchanged.
    pub force: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            upload: true,
            force: false,
        }
    }
}

/// How a dataset update ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetStatus {
    /// Source data was unreachable; nothing was touched.
    Skipped,
    /// Packaged locally, upload disabled.
    Packaged,
    Uploaded,
    /// Packaged, but the digest matched the last upload.
    Unchanged,
}

impl std::fmt::Display for DatasetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DatasetStatus::Skipped => "skipped",
            DatasetStatus::Packaged => "packaged",
            DatasetStatus::Uploaded => "uploaded",
            DatasetStatus::Unchanged => "unchanged",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetOutcome {
    pub name: DatasetName,
    pub status: DatasetStatus,
    /// The dataset's group list after the update; empty when skipped.
    pub groups: Vec<GroupName>,
    pub duration: Duration,
}

/// A batch item that failed without stopping the batch.
#[derive(Debug)]
pub struct ItemFailure {
    pub item: String,
    pub error: SyncError,
}

/// Aggregate result of a batch driver.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub datasets: Vec<DatasetOutcome>,
    /// Union of groups reported by every processed dataset.
    pub groups_touched: BTreeSet<GroupName>,
    pub failures: Vec<ItemFailure>,
}

impl RunSummary {
    fn record(&mut self, outcome: DatasetOutcome) {
        self.groups_touched.extend(outcome.groups.iter().cloned());
        self.datasets.push(outcome);
    }

    fn fail(&mut self, item: impl Into<String>, error: SyncError) {
        let item = item.into();
        tracing::warn!("{item}: {error}");
        self.failures.push(ItemFailure { item, error });
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn count(&self, status: DatasetStatus) -> usize {
        self.datasets.iter().filter(|o| o.status == status).count()
    }
}

/// The orchestrator. Borrowed collaborators are injected at construction.
pub struct Mirror<'a> {
    store: &'a RecordStore,
    caps: Capabilities<'a>,
    source: &'a dyn SourceCatalog,
    audit: &'a dyn AuditLog,
    settings: MirrorSettings,
}

impl<'a> Mirror<'a> {
    pub fn new(
        store: &'a RecordStore,
        caps: Capabilities<'a>,
        source: &'a dyn SourceCatalog,
        audit: &'a dyn AuditLog,
        settings: MirrorSettings,
    ) -> Self {
        Self {
            store,
            caps,
            source,
            audit,
            settings,
        }
    }

    pub fn store(&self) -> &RecordStore {
        self.store
    }

    pub fn settings(&self) -> &MirrorSettings {
        &self.settings
    }

    // -----------------------------------------------------------------------
    // Single dataset
    // -----------------------------------------------------------------------

    /// Re-publish one dataset.
    ///
    /// An unreachable source is not an error: one zero-duration audit row is
    /// written and the outcome is [`DatasetStatus::Skipped`] with no groups.
    pub fn update_dataset(
        &self,
        name: &DatasetName,
        output_dir: &Path,
        options: UpdateOptions,
    ) -> Result<DatasetOutcome, SyncError> {
        let started = Instant::now();
        let mut dataset = self.store.load_dataset(name)?;

        if !self.source.probe(&dataset.name) {
            tracing::warn!("source for '{}' is missing or unreadable; skipping", dataset.name);
            self.audit_row(&dataset, 0.0)?;
            return Ok(DatasetOutcome {
                name: dataset.name,
                status: DatasetStatus::Skipped,
                groups: vec![],
                duration: Duration::ZERO,
            });
        }

        self.sever_stale_groups(&mut dataset)?;

        let category_id = ensure_folder(&self.caps, &dataset.category, &self.settings.root_folder_id)?;
        let name_id = ensure_folder(&self.caps, dataset.name.as_str(), &category_id)?;
        dataset.add_folder(&name_id);
        dataset.add_folder(&category_id);

        let prepared = payload::prepare(self.source, &dataset, output_dir)?;
        let unchanged = dataset.payload_digest.as_deref() == Some(prepared.digest.as_str()) && self.fully_published(&dataset);

        let status = if !options.upload {
            DatasetStatus::Packaged
        } else if unchanged && !options.force {
            tracing::info!("'{}' unchanged since last upload", dataset.name);
            DatasetStatus::Unchanged
        } else {
            self.upload_files(&mut dataset, &prepared.files)?;
            dataset.payload_digest = Some(prepared.digest);
            dataset.last_synced = Some(Utc::now());
            DatasetStatus::Uploaded
        };

        self.store.save_dataset(&dataset)?;
        let duration = started.elapsed();
        self.audit_row(&dataset, duration.as_secs_f64())?;

        Ok(DatasetOutcome {
            name: dataset.name,
            status,
            groups: dataset.groups,
            duration,
        })
    }

    /// Upload a payload packaged by an earlier run without re-exporting.
    pub fn upload_only(&self, name: &DatasetName, output_dir: &Path) -> Result<Dataset, SyncError> {
        let mut dataset = self.store.load_dataset(name)?;
        let files = PayloadFiles::locate(output_dir, &payload::output_name(&dataset));

        let missing = files.missing();
        if !missing.is_empty() {
            let listed: Vec<String> = missing.iter().map(|p| p.display().to_string()).collect();
            return Err(SyncError::PreconditionViolation(format!(
                "payload files for '{}' do not exist: {}",
                dataset.name,
                listed.join(", ")
            )));
        }
        if dataset.name_folder().is_none() {
            return Err(SyncError::PreconditionViolation(format!(
                "'{}' has no remote folder; run a full update first",
                dataset.name
            )));
        }

        self.upload_files(&mut dataset, &files)?;
        dataset.payload_digest = Some(payload::manifest_digest(&files)?);
        dataset.last_synced = Some(Utc::now());
        self.store.save_dataset(&dataset)?;
        Ok(dataset)
    }

    /// Permanently remove a dataset's remote files, name folder, group
    /// memberships and record. `confirmed` must be `true`.
    pub fn delete_dataset(&self, name: &DatasetName, confirmed: bool) -> Result<Vec<GroupName>, SyncError> {
        if !confirmed {
            return Err(SyncError::PreconditionViolation(format!(
                "deleting '{name}' requires confirmation"
            )));
        }
        let dataset = self.store.load_dataset(name)?;

        let files = [
            &dataset.primary_file_id,
            &dataset.shape_file_id,
            &dataset.hash_file_id,
        ];
        for id in files.into_iter().flatten().chain(dataset.name_folder()) {
            self.delete_remote(id)?;
        }

        let mut touched: BTreeSet<GroupName> = dataset.groups.iter().cloned().collect();
        let declared_in = self
            .store
            .groups_containing(&BTreeSet::from([dataset.name.clone()]))?;
        touched.extend(declared_in.into_iter().map(|g| g.name));

        let mut removed_from = vec![];
        for group in touched {
            match self.store.remove_dataset_from_group(&group, &dataset.name) {
                Ok(true) => {
                    tracing::info!("removed '{}' from group '{group}'", dataset.name);
                    removed_from.push(group);
                }
                Ok(false) => {}
                Err(RecordError::NotFound { .. }) => {
                    tracing::warn!("group '{group}' listed by '{}' has no record", dataset.name);
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.store.delete_dataset(&dataset.name)?;
        tracing::info!("deleted dataset '{}'", dataset.name);
        Ok(removed_from)
    }

    // -----------------------------------------------------------------------
    // Batch drivers
    // -----------------------------------------------------------------------

    /// Update each named dataset; failures are collected, not propagated.
    pub fn run_datasets<I>(&self, names: I, output_dir: &Path, options: UpdateOptions) -> RunSummary
    where
        I: IntoIterator<Item = DatasetName>,
    {
        let mut summary = RunSummary::default();
        self.update_into(&mut summary, names, output_dir, options);
        summary
    }

    /// Update datasets reported as changed, optionally limited to one
    /// category. Changed names with no record are ignored.
    pub fn run_changed(
        &self,
        changed: &BTreeSet<DatasetName>,
        category: Option<&str>,
        output_dir: &Path,
        options: UpdateOptions,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut selected = vec![];
        for name in changed {
            match self.store.load_dataset(name) {
                Ok(ds) if category.map_or(true, |c| ds.category.eq_ignore_ascii_case(c)) => selected.push(ds.name),
                Ok(_) => {}
                Err(RecordError::NotFound { .. }) => tracing::debug!("changed table '{name}' is not mirrored"),
                Err(e) => summary.fail(name.to_string(), e.into()),
            }
        }
        self.update_into(&mut summary, selected, output_dir, options);
        summary
    }

    /// Reconcile each named group, then update every reachable member once.
    pub fn run_groups<I>(&self, names: I, output_dir: &Path, options: UpdateOptions) -> RunSummary
    where
        I: IntoIterator<Item = GroupName>,
    {
        let mut summary = RunSummary::default();
        let mut groups = vec![];
        for name in names {
            match self.store.load_group(&name) {
                Ok(group) => groups.push(group),
                Err(e) => summary.fail(format!("group {name}"), e.into()),
            }
        }
        self.groups_into(&mut summary, groups, output_dir, options);
        summary
    }

    /// Groups declaring at least one changed dataset, run as [`Self::run_groups`].
    pub fn run_changed_groups(
        &self,
        changed: &BTreeSet<DatasetName>,
        output_dir: &Path,
        options: UpdateOptions,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        match self.store.groups_containing(changed) {
            Ok(groups) => self.groups_into(&mut summary, groups, output_dir, options),
            Err(e) => summary.fail("groups", e.into()),
        }
        summary
    }

    fn groups_into(&self, summary: &mut RunSummary, groups: Vec<Group>, output_dir: &Path, options: UpdateOptions) {
        let mut members: BTreeSet<DatasetName> = BTreeSet::new();
        for mut group in groups {
            let name = group.name.clone();
            match self.prepare_group(&mut group) {
                Ok(()) => {
                    for dataset in &group.datasets {
                        if self.source.probe(dataset) {
                            members.insert(dataset.clone());
                        } else {
                            tracing::warn!("group '{name}': dataset '{dataset}' does not exist in the workspace");
                        }
                    }
                }
                Err(e) => summary.fail(format!("group {name}"), e),
            }
        }
        self.update_into(summary, members, output_dir, options);
    }

    fn prepare_group(&self, group: &mut Group) -> Result<(), SyncError> {
        if group.needs_skeleton() {
            init_group_skeleton(&self.caps, self.store, &self.settings.root_folder_id, group)?;
        }
        reconcile_group_members(&self.caps, self.store, group)?;
        Ok(())
    }

    fn update_into<I>(&self, summary: &mut RunSummary, names: I, output_dir: &Path, options: UpdateOptions)
    where
        I: IntoIterator<Item = DatasetName>,
    {
        for name in names {
            tracing::info!("starting dataset '{name}'");
            match self.update_dataset(&name, output_dir, options) {
                Ok(outcome) => summary.record(outcome),
                Err(e) => summary.fail(name.to_string(), e),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn sever_stale_groups(&self, dataset: &mut Dataset) -> Result<(), SyncError> {
        for group_name in dataset.groups.clone() {
            match self.store.load_group(&group_name) {
                Ok(group) => {
                    reconcile_dataset_against_group(&self.caps, self.store, dataset, &group)?;
                }
                Err(RecordError::NotFound { .. }) => {
                    tracing::warn!("'{}' lists unknown group '{group_name}'; dropping it", dataset.name);
                    dataset.remove_group(&group_name);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn fully_published(&self, dataset: &Dataset) -> bool {
        let hash_ok = self.settings.hash_folder_id.is_none() || dataset.hash_file_id.is_some();
        dataset.primary_file_id.is_some() && dataset.shape_file_id.is_some() && hash_ok
    }

    /// Upload every artifact. A created file's ID is in the store before
    /// anything else is attempted.
    fn upload_files(&self, dataset: &mut Dataset, files: &PayloadFiles) -> Result<(), SyncError> {
        let parents: Vec<RemoteId> = dataset.name_folder().cloned().into_iter().collect();
        for kind in PayloadKind::all() {
            let existing = dataset.artifact_id(*kind).cloned();
            let placed = self.put_file(existing.as_ref(), files.archive(*kind), &parents, ARCHIVE_MIME)?;
            match kind {
                PayloadKind::Primary => dataset.primary_file_id = Some(placed.id().clone()),
                PayloadKind::Shape => dataset.shape_file_id = Some(placed.id().clone()),
            }
            self.settle(dataset, &placed)?;
        }
        if let Some(hash_folder) = &self.settings.hash_folder_id {
            let existing = dataset.hash_file_id.clone();
            let placed = self.put_file(
                existing.as_ref(),
                &files.hash,
                std::slice::from_ref(hash_folder),
                TEXT_MIME,
            )?;
            dataset.hash_file_id = Some(placed.id().clone());
            self.settle(dataset, &placed)?;
        }
        tracing::info!("uploaded payload for '{}'", dataset.name);
        Ok(())
    }

    /// Update `existing` in place, or create a new file through the
    /// administrative principal.
    fn put_file(
        &self,
        existing: Option<&RemoteId>,
        path: &Path,
        parents: &[RemoteId],
        mime: &str,
    ) -> Result<Placed, SyncError> {
        if let Some(id) = existing {
            self.caps.standard.update_file(id, path, mime)?;
            return Ok(Placed::Updated(id.clone()));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let id = self.caps.ownership.create_file(&name, parents, path, mime)?;
        Ok(Placed::Created(id))
    }

    /// Persist a freshly created file ID, then hand the file to the owner.
    fn settle(&self, dataset: &Dataset, placed: &Placed) -> Result<(), SyncError> {
        if let Placed::Created(id) = placed {
            self.store.save_dataset(dataset)?;
            transfer_ownership(&self.caps, id)?;
        }
        Ok(())
    }

    fn delete_remote(&self, id: &RemoteId) -> Result<(), SyncError> {
        match self.caps.ownership.delete(id) {
            Ok(()) => Ok(()),
            Err(RemoteError::NotFound { .. }) => {
                tracing::debug!("{id} already gone");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn audit_row(&self, dataset: &Dataset, duration_secs: f64) -> Result<(), SyncError> {
        if self.settings.audit_sheet_id.is_empty() {
            return Ok(());
        }
        let row = AuditRow::new(dataset.label(), Local::now(), duration_secs);
        self.audit
            .append_row(&self.settings.audit_sheet_id, &self.settings.audit_tab, &row)?;
        Ok(())
    }
}

/// Whether `put_file` reused an existing file or created one.
enum Placed {
    Updated(RemoteId),
    Created(RemoteId),
}

impl Placed {
    fn id(&self) -> &RemoteId {
        match self {
            Placed::Updated(id) | Placed::Created(id) => id,
        }
    }
}

//! # mirror-sync
//!
//! Reconciliation engine and sync orchestrator.
//!
//! - [`plan`]: pure link diff, [`plan_links`]
//! - [`folders`]: get-or-create folders, group folder skeleton
//! - [`reconcile`]: group ↔ dataset link reconciliation
//! - [`payload`] / [`source`]: local export and packaging
//! - [`mirror`]: [`Mirror`], per-dataset update and the batch drivers
//! - [`pipeline`]: scope-based entrypoint used by the CLI
//! - [`memory`]: in-memory remote hierarchy and audit log
//!
//! All remote edits go through a [`Capabilities`] value supplied by the
//! caller; nothing here holds a global client.

pub mod caps;
pub mod error;
pub mod folders;
pub mod memory;
pub mod mirror;
pub mod payload;
pub mod pipeline;
pub mod plan;
pub mod reconcile;
pub mod source;

pub use caps::Capabilities;
pub use error::SyncError;
pub use folders::{ensure_folder, init_group_skeleton};
pub use mirror::{
    DatasetOutcome, DatasetStatus, ItemFailure, Mirror, MirrorSettings, RunSummary, UpdateOptions,
};
pub use pipeline::{run, ChangeSource, SyncScope};
pub use plan::{plan_links, LinkPlan};
pub use reconcile::{reconcile_dataset_against_group, reconcile_group_members, GroupReconcileReport};
pub use source::{SourceCatalog, WorkspaceCatalog};

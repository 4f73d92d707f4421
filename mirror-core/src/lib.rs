//! Catalog mirror core library: domain types, record store, config, ports.
//!
//! - [`types`]: case-insensitive names, remote IDs, `Dataset`, `Group`
//! - [`store`]: JSON record store
//! - [`config`]: `config.yaml` load / save
//! - [`remote`]: remote hierarchy and audit log ports
//! - [`error`]: [`RecordError`], [`RemoteError`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod remote;
pub mod store;
pub mod types;

pub use config::MirrorConfig;
pub use error::{ConfigError, RecordError, RemoteError};
pub use remote::{AuditLog, AuditRow, ChildEntry, RemoteHierarchy};
pub use store::RecordStore;
pub use types::{
    is_valid_name, normalize_name, Dataset, DatasetName, Group, GroupName, PayloadKind, RemoteId,
};

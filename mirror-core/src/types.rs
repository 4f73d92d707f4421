//! Domain types for the catalog mirror.
//!
//! Names compare case-insensitively. Every comparison, ordering, hash and
//! store key goes through [`normalize_name`]; the declared spelling is kept
//! for display and for the folder names created remotely.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Canonical form of a dataset or group name.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// `true` if `name` is safe as a single path component: non-empty after
/// trimming, not `.` or `..`, and free of separators and NUL.
pub fn is_valid_name(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

macro_rules! case_insensitive_name {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Normalized key used for comparison and record file names.
            pub fn key(&self) -> String {
                normalize_name(&self.0)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// See [`is_valid_name`].
            pub fn is_valid(&self) -> bool {
                is_valid_name(&self.0)
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.key() == other.key()
            }
        }

        impl Eq for $name {}

        impl Hash for $name {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.key().hash(state);
            }
        }

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $name {
            fn cmp(&self, other: &Self) -> Ordering {
                self.key().cmp(&other.key())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

case_insensitive_name!(
    /// Name of a source dataset; the record key.
    DatasetName
);

case_insensitive_name!(
    /// Name of a group ("package") of datasets.
    GroupName
);

/// Opaque identifier of a node in the remote hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(pub String);

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RemoteId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RemoteId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Records written by older tooling use `""` for "not yet created".
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<RemoteId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()).map(RemoteId))
}

// ---------------------------------------------------------------------------
// Payload kinds
// ---------------------------------------------------------------------------

/// The two artifact kinds that are linked into group folders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PayloadKind {
    Primary,
    Shape,
}

impl PayloadKind {
    pub fn all() -> &'static [PayloadKind] {
        &[PayloadKind::Primary, PayloadKind::Shape]
    }

    /// Suffix used for archive file names and group sub-folders.
    pub fn suffix(self) -> &'static str {
        match self {
            PayloadKind::Primary => "gdb",
            PayloadKind::Shape => "shp",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadKind::Primary => write!(f, "primary"),
            PayloadKind::Shape => write!(f, "shape"),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One source dataset and the remote artifacts mirroring it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: DatasetName,
    pub category: String,
    /// Remote folders created for this dataset: the name folder first, then
    /// its category folder. Artifacts live in the name folder only.
    #[serde(default)]
    pub remote_folder_ids: Vec<RemoteId>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub primary_file_id: Option<RemoteId>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub shape_file_id: Option<RemoteId>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub hash_file_id: Option<RemoteId>,
    /// Declared group membership, in declaration order, no duplicates.
    #[serde(default)]
    pub groups: Vec<GroupName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced: Option<DateTime<Utc>>,
}

impl Dataset {
    pub fn new(name: impl Into<DatasetName>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            remote_folder_ids: vec![],
            primary_file_id: None,
            shape_file_id: None,
            hash_file_id: None,
            groups: vec![],
            payload_digest: None,
            last_synced: None,
        }
    }

    /// `<category>.<name>`, the label written to the audit log.
    pub fn label(&self) -> String {
        format!("{}.{}", self.category, self.name)
    }

    pub fn artifact_id(&self, kind: PayloadKind) -> Option<&RemoteId> {
        match kind {
            PayloadKind::Primary => self.primary_file_id.as_ref(),
            PayloadKind::Shape => self.shape_file_id.as_ref(),
        }
    }

    pub fn in_group(&self, group: &GroupName) -> bool {
        self.groups.contains(group)
    }

    /// Append `group` unless already present. Returns `true` if added.
    pub fn add_group(&mut self, group: &GroupName) -> bool {
        if self.in_group(group) {
            return false;
        }
        self.groups.push(group.clone());
        true
    }

    /// Remove every spelling of `group`. Returns `true` if anything changed.
    pub fn remove_group(&mut self, group: &GroupName) -> bool {
        let before = self.groups.len();
        self.groups.retain(|g| g != group);
        self.groups.len() != before
    }

    /// The per-dataset folder holding the artifacts.
    pub fn name_folder(&self) -> Option<&RemoteId> {
        self.remote_folder_ids.first()
    }

    /// Append `id` to the folder list unless already present.
    pub fn add_folder(&mut self, id: &RemoteId) -> bool {
        if self.remote_folder_ids.contains(id) {
            return false;
        }
        self.remote_folder_ids.push(id.clone());
        true
    }
}

/// A named collection of datasets with its own mirror folders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: GroupName,
    pub category: String,
    /// Declared membership.
    #[serde(default)]
    pub datasets: BTreeSet<DatasetName>,
    #[serde(default)]
    pub parent_ids: Vec<RemoteId>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub primary_folder_id: Option<RemoteId>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub shape_folder_id: Option<RemoteId>,
}

impl Group {
    pub fn new(name: impl Into<GroupName>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            datasets: BTreeSet::new(),
            parent_ids: vec![],
            primary_folder_id: None,
            shape_folder_id: None,
        }
    }

    pub fn declares(&self, dataset: &DatasetName) -> bool {
        self.datasets.contains(dataset)
    }

    pub fn folder_id(&self, kind: PayloadKind) -> Option<&RemoteId> {
        match kind {
            PayloadKind::Primary => self.primary_folder_id.as_ref(),
            PayloadKind::Shape => self.shape_folder_id.as_ref(),
        }
    }

    /// `true` when the remote folder skeleton has never been initialized.
    pub fn needs_skeleton(&self) -> bool {
        self.parent_ids.is_empty() || self.primary_folder_id.is_none() || self.shape_folder_id.is_none()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

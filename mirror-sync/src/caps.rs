//! Remote capabilities handed to the engine at construction.

use mirror_core::remote::RemoteHierarchy;

/// The two remote identities the engine works with.
///
/// `standard` is used for reads and in-place file updates. `ownership` is the
/// identity able to create nodes, edit parent links, delete, and transfer
/// ownership to `owner`. Both may be the same client.
#[derive(Clone, Copy)]
pub struct Capabilities<'a> {
    pub standard: &'a dyn RemoteHierarchy,
    pub ownership: &'a dyn RemoteHierarchy,
    /// Administrative principal that owns created nodes. Empty disables
    /// ownership transfer.
    pub owner: &'a str,
}

impl<'a> Capabilities<'a> {
    pub fn new(standard: &'a dyn RemoteHierarchy, ownership: &'a dyn RemoteHierarchy, owner: &'a str) -> Self {
        Self {
            standard,
            ownership,
            owner,
        }
    }

    /// One client holding both capabilities.
    pub fn single(client: &'a dyn RemoteHierarchy, owner: &'a str) -> Self {
        Self::new(client, client, owner)
    }
}

impl std::fmt::Debug for Capabilities<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities").field("owner", &self.owner).finish_non_exhaustive()
    }
}

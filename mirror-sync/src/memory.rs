//! In-memory implementations of the remote ports.
//!
//! [`MemoryHierarchy`] models a multi-parent tree with the same semantics the
//! HTTP client exposes, and records every mutating call. It backs the engine
//! tests and offline dry runs. Single-threaded: state lives in a `RefCell`.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use mirror_core::remote::{AuditLog, AuditRow, ChildEntry, RemoteHierarchy, FOLDER_MIME};
use mirror_core::{RemoteError, RemoteId};

/// A node in the in-memory tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryNode {
    pub name: String,
    pub mime_type: String,
    pub parents: BTreeSet<RemoteId>,
    pub owner: Option<String>,
    pub content: Vec<u8>,
}

impl MemoryNode {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME
    }
}

#[derive(Debug, Default)]
struct State {
    nodes: BTreeMap<RemoteId, MemoryNode>,
    next_id: u64,
    writes: Vec<String>,
    fail_next: Option<&'static str>,
}

impl State {
    fn allocate(&mut self) -> RemoteId {
        self.next_id += 1;
        RemoteId(format!("mem-{:04}", self.next_id))
    }

    fn node_mut(&mut self, id: &RemoteId) -> Result<&mut MemoryNode, RemoteError> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| RemoteError::NotFound { id: id.0.clone() })
    }

    fn check(&mut self, op: &'static str) -> Result<(), RemoteError> {
        if self.fail_next == Some(op) {
            self.fail_next = None;
            return Err(RemoteError::Status {
                code: 500,
                message: format!("injected failure in {op}"),
            });
        }
        Ok(())
    }

    fn record(&mut self, entry: String) {
        self.writes.push(entry);
    }
}

/// In-memory remote hierarchy.
#[derive(Debug, Default)]
pub struct MemoryHierarchy {
    state: RefCell<State>,
}

impl MemoryHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a parentless folder (e.g. the configured root) with a fixed ID.
    pub fn with_root(self, id: &str, name: &str) -> Self {
        self.state.borrow_mut().nodes.insert(
            RemoteId::from(id),
            MemoryNode {
                name: name.to_string(),
                mime_type: FOLDER_MIME.to_string(),
                parents: BTreeSet::new(),
                owner: None,
                content: vec![],
            },
        );
        self
    }

    pub fn node(&self, id: &RemoteId) -> Option<MemoryNode> {
        self.state.borrow().nodes.get(id).cloned()
    }

    pub fn contains(&self, id: &RemoteId) -> bool {
        self.state.borrow().nodes.contains_key(id)
    }

    /// IDs of every node that lists `parent` among its parents.
    pub fn child_ids(&self, parent: &RemoteId) -> BTreeSet<RemoteId> {
        self.state
            .borrow()
            .nodes
            .iter()
            .filter(|(_, n)| n.parents.contains(parent))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Number of nodes whose name equals `name` under `parent`.
    pub fn count_named(&self, name: &str, parent: &RemoteId) -> usize {
        self.state
            .borrow()
            .nodes
            .values()
            .filter(|n| n.name == name && n.parents.contains(parent))
            .count()
    }

    /// Human-readable log of mutating calls, in order.
    pub fn writes(&self) -> Vec<String> {
        self.state.borrow().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.state.borrow().writes.len()
    }

    /// Make the next call of `op` (a trait method name) fail with a 500.
    pub fn fail_next(&self, op: &'static str) {
        self.state.borrow_mut().fail_next = Some(op);
    }

    /// Attach `id` to `parent` out of band, without recording a write.
    pub fn link_out_of_band(&self, id: &RemoteId, parent: &RemoteId) {
        if let Some(node) = self.state.borrow_mut().nodes.get_mut(id) {
            node.parents.insert(parent.clone());
        }
    }

    fn insert(&self, name: &str, parents: &[RemoteId], mime_type: &str, content: Vec<u8>) -> RemoteId {
        let mut state = self.state.borrow_mut();
        let id = state.allocate();
        state.nodes.insert(
            id.clone(),
            MemoryNode {
                name: name.to_string(),
                mime_type: mime_type.to_string(),
                parents: parents.iter().cloned().collect(),
                owner: None,
                content,
            },
        );
        id
    }
}

fn read_upload(path: &Path) -> Result<Vec<u8>, RemoteError> {
    std::fs::read(path).map_err(|e| RemoteError::Upload {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

impl RemoteHierarchy for MemoryHierarchy {
    fn create_folder(&self, name: &str, parent: &RemoteId) -> Result<RemoteId, RemoteError> {
        {
            let mut state = self.state.borrow_mut();
            state.check("create_folder")?;
            state.node_mut(parent)?;
        }
        let id = self.insert(name, std::slice::from_ref(parent), FOLDER_MIME, vec![]);
        self.state
            .borrow_mut()
            .record(format!("create_folder {name} in {parent} -> {id}"));
        Ok(id)
    }

    fn create_file(
        &self,
        name: &str,
        parents: &[RemoteId],
        local_path: &Path,
        mime_type: &str,
    ) -> Result<RemoteId, RemoteError> {
        self.state.borrow_mut().check("create_file")?;
        let content = read_upload(local_path)?;
        let id = self.insert(name, parents, mime_type, content);
        self.state
            .borrow_mut()
            .record(format!("create_file {name} -> {id}"));
        Ok(id)
    }

    fn update_file(&self, id: &RemoteId, local_path: &Path, mime_type: &str) -> Result<(), RemoteError> {
        let content = read_upload(local_path)?;
        let mut state = self.state.borrow_mut();
        state.check("update_file")?;
        let node = state.node_mut(id)?;
        node.content = content;
        node.mime_type = mime_type.to_string();
        state.record(format!("update_file {id}"));
        Ok(())
    }

    fn list_children(&self, parent: &RemoteId) -> Result<Vec<ChildEntry>, RemoteError> {
        let mut state = self.state.borrow_mut();
        state.check("list_children")?;
        Ok(state
            .nodes
            .iter()
            .filter(|(_, n)| n.parents.contains(parent))
            .map(|(id, n)| ChildEntry {
                name: n.name.clone(),
                id: id.clone(),
            })
            .collect())
    }

    fn find_child_by_name(&self, name: &str, parent: &RemoteId) -> Result<Option<RemoteId>, RemoteError> {
        let mut state = self.state.borrow_mut();
        state.check("find_child_by_name")?;
        Ok(state
            .nodes
            .iter()
            .find(|(_, n)| n.name == name && n.parents.contains(parent))
            .map(|(id, _)| id.clone()))
    }

    fn get_parents(&self, id: &RemoteId) -> Result<BTreeSet<RemoteId>, RemoteError> {
        let mut state = self.state.borrow_mut();
        state.check("get_parents")?;
        Ok(state.node_mut(id)?.parents.clone())
    }

    fn add_parent(&self, id: &RemoteId, parent: &RemoteId) -> Result<(), RemoteError> {
        let mut state = self.state.borrow_mut();
        state.check("add_parent")?;
        state.node_mut(parent)?;
        state.node_mut(id)?.parents.insert(parent.clone());
        state.record(format!("add_parent {id} -> {parent}"));
        Ok(())
    }

    fn remove_parent(&self, id: &RemoteId, parent: &RemoteId) -> Result<(), RemoteError> {
        let mut state = self.state.borrow_mut();
        state.check("remove_parent")?;
        state.node_mut(id)?.parents.remove(parent);
        state.record(format!("remove_parent {id} -/> {parent}"));
        Ok(())
    }

    fn set_owner(&self, id: &RemoteId, principal: &str) -> Result<(), RemoteError> {
        let mut state = self.state.borrow_mut();
        state.check("set_owner")?;
        state.node_mut(id)?.owner = Some(principal.to_string());
        state.record(format!("set_owner {id} = {principal}"));
        Ok(())
    }

    fn delete(&self, id: &RemoteId) -> Result<(), RemoteError> {
        let mut state = self.state.borrow_mut();
        state.check("delete")?;
        if state.nodes.remove(id).is_none() {
            return Err(RemoteError::NotFound { id: id.0.clone() });
        }
        for node in state.nodes.values_mut() {
            node.parents.remove(id);
        }
        state.record(format!("delete {id}"));
        Ok(())
    }
}

/// One appended audit row with its destination.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedRow {
    pub sheet_id: String,
    pub tab: String,
    pub row: AuditRow,
}

/// In-memory audit log.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    rows: RefCell<Vec<LoggedRow>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<LoggedRow> {
        self.rows.borrow().clone()
    }
}

impl AuditLog for MemoryAuditLog {
    fn append_row(&self, sheet_id: &str, tab: &str, row: &AuditRow) -> Result<(), RemoteError> {
        self.rows.borrow_mut().push(LoggedRow {
            sheet_id: sheet_id.to_string(),
            tab: tab.to_string(),
            row: row.clone(),
        });
        Ok(())
    }
}

//! Flat view store: branch id → visible-id sequence.
//!
//! The value under a key means one of two things, and the key's mere
//! presence distinguishes them:
//!
//! - for the **root**, the entry is always present and is the single
//!   authoritative visible sequence for the whole tree;
//! - for any **other** branch, an entry exists only while the branch is
//!   *disconnected* (collapsed or pending), holding its cached flattened
//!   block for fast reconnection. A connected branch's rows live inside
//!   its closest expanded ancestor's entry, not under its own key.
//!
//! Every read and write of a flattened projection goes through this type
//! so the connected-vs-disconnected invariant is enforced in one place.
//!
//! Writes to the root key raise a dirty flag instead of invoking
//! callbacks directly; the engine drains the flag once its interior
//! borrow is released and notifies observers then, keeping delivery
//! synchronous with the commit without re-entrancy hazards.

use std::collections::HashMap;

use crate::node::NodeId;

#[derive(Debug)]
pub(crate) struct FlatViewMap {
    views: HashMap<NodeId, Vec<NodeId>>,
    root: NodeId,
    root_dirty: bool,
}

impl FlatViewMap {
    pub(crate) fn new(root: NodeId) -> Self {
        let mut views = HashMap::new();
        views.insert(root, Vec::new());
        Self {
            views,
            root,
            root_dirty: false,
        }
    }

    pub(crate) fn get(&self, branch: NodeId) -> Option<&[NodeId]> {
        self.views.get(&branch).map(Vec::as_slice)
    }

    pub(crate) fn has(&self, branch: NodeId) -> bool {
        self.views.contains_key(&branch)
    }

    pub(crate) fn set(&mut self, branch: NodeId, view: Vec<NodeId>) {
        if branch == self.root {
            self.root_dirty = true;
        }
        self.views.insert(branch, view);
    }

    pub(crate) fn delete(&mut self, branch: NodeId) -> Option<Vec<NodeId>> {
        self.views.remove(&branch)
    }

    /// Drain the root-changed flag. Returns `true` at most once per
    /// change burst.
    pub(crate) fn take_root_dirty(&mut self) -> bool {
        std::mem::take(&mut self.root_dirty)
    }
}

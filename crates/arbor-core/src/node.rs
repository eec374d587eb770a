//! Node identity and ownership model.
//!
//! A tree is an arena of [`Node`]s addressed by [`NodeId`]. A branch owns
//! its listed children; a node carries a non-owning id back-reference to
//! its parent, used only for depth and ancestry walks. This keeps the
//! structure cycle-free without reference counting tricks.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Identifier of a node within one [`Tree`](crate::Tree) instance.
///
/// Ids are assigned at node creation from a per-tree monotonically
/// increasing counter and are never reused, even after removal. Two
/// distinct `Tree` instances hand out overlapping ids; an id is only
/// meaningful against the tree that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Raw integer value, e.g. for storage in a fixed-width buffer.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-tree id allocator. Cloning shares the counter.
#[derive(Debug, Clone)]
pub(crate) struct IdGen(Rc<Cell<u32>>);

impl IdGen {
    pub(crate) fn new() -> Self {
        Self(Rc::new(Cell::new(0)))
    }

    pub(crate) fn next(&self) -> NodeId {
        let id = self.0.get();
        self.0.set(id + 1);
        NodeId(id)
    }
}

/// The variant tag of a node: a childless leaf, or a branch that can
/// load and own children.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Terminal node; never has children.
    Leaf,
    /// Interior node.
    Branch {
        /// Loaded child ids in display order. `None` until the first
        /// load; once set, always a complete snapshot of the children as
        /// of the last load or mutation, never partially populated.
        children: Option<Vec<NodeId>>,
        /// The *intended* expansion flag.
        ///
        /// Set to `true` the instant an expand request is accepted,
        /// before children have loaded or been spliced into the visible
        /// projection. While a load is in flight the branch is not yet
        /// truly expanded even though this reads `true`; use
        /// [`Tree::is_truly_expanded`](crate::Tree::is_truly_expanded)
        /// for the real-time status.
        expanded: bool,
    },
}

/// A single node: identity, parent back-reference, caller payload, and
/// the leaf/branch tag. No behavior beyond field access; all structural
/// logic lives in the [`Tree`](crate::Tree) engine.
#[derive(Debug, Clone)]
pub struct Node<D> {
    pub(crate) id: NodeId,
    pub(crate) parent: Option<NodeId>,
    pub(crate) data: D,
    pub(crate) kind: NodeKind,
}

impl<D> Node<D> {
    pub(crate) fn leaf(id: NodeId, parent: Option<NodeId>, data: D) -> Self {
        Self {
            id,
            parent,
            data,
            kind: NodeKind::Leaf,
        }
    }

    pub(crate) fn branch(id: NodeId, parent: Option<NodeId>, data: D, expanded: bool) -> Self {
        Self {
            id,
            parent,
            data,
            kind: NodeKind::Branch {
                children: None,
                expanded,
            },
        }
    }

    /// This node's id.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Owning parent branch, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Caller-supplied payload.
    #[must_use]
    pub fn data(&self) -> &D {
        &self.data
    }

    /// The leaf/branch tag.
    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Whether this node is a branch.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        matches!(self.kind, NodeKind::Branch { .. })
    }

    /// Whether this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf)
    }

    /// Loaded child ids, if this is a branch whose children have loaded.
    #[must_use]
    pub fn children(&self) -> Option<&[NodeId]> {
        match &self.kind {
            NodeKind::Branch { children, .. } => children.as_deref(),
            NodeKind::Leaf => None,
        }
    }

    /// The intended expansion flag; always `false` for a leaf.
    #[must_use]
    pub fn is_expanded(&self) -> bool {
        matches!(self.kind, NodeKind::Branch { expanded: true, .. })
    }

    pub(crate) fn set_expanded(&mut self, value: bool) {
        if let NodeKind::Branch { expanded, .. } = &mut self.kind {
            *expanded = value;
        }
    }

    pub(crate) fn set_children(&mut self, new_children: Vec<NodeId>) {
        if let NodeKind::Branch { children, .. } = &mut self.kind {
            *children = Some(new_children);
        }
    }
}

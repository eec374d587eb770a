//! The external child-source contract and the node factory.
//!
//! A [`TreeSource`] supplies the children of a branch on demand —
//! filesystem listing, archive directory, object-storage prefix, etc.
//! It must construct nodes only through the [`NodeFactory`] handed to it,
//! which allocates ids from the owning tree's counter and binds the
//! parent reference, preserving id uniqueness across the tree's lifetime.

use async_trait::async_trait;

use crate::node::{IdGen, Node, NodeId};

/// Boxed error returned by a child source. The engine wraps it into
/// [`TreeError::LoadFailed`](crate::TreeError::LoadFailed) with the
/// failing branch attached.
pub type SourceError = Box<dyn std::error::Error>;

/// Supplies the ordered children of a branch, synchronously or not.
///
/// `parent` is the payload of the branch being loaded, or `None` when the
/// top level (root's children) is requested. The returned ids must come
/// from the given factory, in the desired display order; returning an id
/// the factory did not create is a programming defect and panics at
/// commit time.
#[async_trait(?Send)]
pub trait TreeSource<D> {
    /// Produce the ordered children of `parent`.
    async fn load(
        &self,
        parent: Option<&D>,
        factory: &mut NodeFactory<D>,
    ) -> Result<Vec<NodeId>, SourceError>;
}

/// Constructs nodes on behalf of a [`TreeSource`] during one load.
///
/// Created nodes are staged inside the factory; the engine registers them
/// in the tree's lookup only when their flattened position is committed.
/// Ids consumed by nodes that never commit (a failed load, a reverted
/// amend) are burned, never reused.
pub struct NodeFactory<D> {
    ids: IdGen,
    parent: NodeId,
    staged: Vec<Node<D>>,
}

impl<D> NodeFactory<D> {
    pub(crate) fn new(ids: IdGen, parent: NodeId) -> Self {
        Self {
            ids,
            parent,
            staged: Vec::new(),
        }
    }

    /// Create a branch child. `expanded` pre-sets the intent flag so the
    /// branch auto-expands as soon as the load commits, supporting
    /// persisted or initial expansion state.
    pub fn create_branch(&mut self, data: D, expanded: bool) -> NodeId {
        let id = self.ids.next();
        self.staged
            .push(Node::branch(id, Some(self.parent), data, expanded));
        id
    }

    /// Create a leaf child.
    pub fn create_leaf(&mut self, data: D) -> NodeId {
        let id = self.ids.next();
        self.staged.push(Node::leaf(id, Some(self.parent), data));
        id
    }

    pub(crate) fn into_staged(self) -> Vec<Node<D>> {
        self.staged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_assigns_sequential_ids_and_parent() {
        let ids = IdGen::new();
        let root = ids.next();
        let mut factory = NodeFactory::new(ids, root);

        let a = factory.create_branch("a", false);
        let b = factory.create_leaf("b");
        assert!(a < b);

        let staged = factory.into_staged();
        assert_eq!(staged.len(), 2);
        assert_eq!(staged[0].id(), a);
        assert!(staged[0].is_branch());
        assert!(!staged[0].is_expanded());
        assert_eq!(staged[0].parent(), Some(root));
        assert_eq!(staged[1].id(), b);
        assert!(staged[1].is_leaf());
    }

    #[test]
    fn expanded_flag_carries_through() {
        let ids = IdGen::new();
        let root = ids.next();
        let mut factory = NodeFactory::new(ids, root);
        factory.create_branch((), true);
        assert!(factory.into_staged()[0].is_expanded());
    }
}

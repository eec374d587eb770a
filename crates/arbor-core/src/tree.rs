//! The tree engine: lazy loading, expansion, collapse, and structural
//! mutation over an incrementally maintained flat projection.
//!
//! A [`Tree`] owns the node registry, the [flat view store](crate::flat_view)
//! and the per-branch load de-duplication map. Expanding a branch splices
//! its cached flattened block into its closest expanded ancestor's view;
//! collapsing carves the block back out and parks it under the branch's
//! own id, so a later re-expand restores the exact prior nested state
//! without reloading anything.
//!
//! # Concurrency model
//!
//! Single-threaded cooperative scheduling. The only suspension point is
//! awaiting the external [`TreeSource`]; every flat-view and registry
//! mutation happens synchronously between suspension points. The pending
//! map acts as a per-branch mutex substitute: a second load request on a
//! branch with an in-flight load attaches to the same shared future.
//! Expansion re-checks its intent flag after every suspension, so a
//! collapse issued while an expand is awaiting its load always wins.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture, Shared, try_join_all};

use crate::error::{Result, TreeError};
use crate::flat_view::FlatViewMap;
use crate::node::{IdGen, Node, NodeId, NodeKind};
use crate::source::{NodeFactory, TreeSource};
use crate::splice::{Spliced, splice};

type SharedLoad = Shared<LocalBoxFuture<'static, Result<()>>>;

/// Options for [`Tree::expand_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpandOptions {
    /// Also reconnect every collapsed ancestor up to the root, so the
    /// branch's rows become part of the root-level visible sequence even
    /// if parents were collapsed.
    pub ensure_visible: bool,
    /// After connecting, expand every child branch the same way
    /// (parallel fan-out; each sub-expand is independently idempotent).
    pub recursive: bool,
}

impl ExpandOptions {
    /// Default options: no visibility lift, not recursive.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ensure_visible: false,
            recursive: false,
        }
    }

    /// Set whether collapsed ancestors are lifted to the root.
    #[must_use]
    pub const fn with_ensure_visible(mut self, ensure_visible: bool) -> Self {
        self.ensure_visible = ensure_visible;
        self
    }

    /// Set whether child branches are expanded recursively.
    #[must_use]
    pub const fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }
}

/// Handle for removing a visible-change observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Immutable snapshot of one node, for rendering collaborators mapping
/// visible positions to data.
#[derive(Debug, Clone)]
pub struct NodeInfo<D> {
    /// The node's id.
    pub id: NodeId,
    /// Owning parent, or `None` for the root.
    pub parent: Option<NodeId>,
    /// Derived depth: 0 for the root, else parent depth + 1.
    pub depth: usize,
    /// Whether the node is a branch.
    pub is_branch: bool,
    /// The intended expansion flag (always `false` for leaves).
    pub expanded: bool,
    /// Clone of the caller payload.
    pub data: D,
}

struct TreeState<D> {
    nodes: HashMap<NodeId, Node<D>>,
    views: FlatViewMap,
    pending: HashMap<NodeId, SharedLoad>,
    observers: Vec<(SubscriptionId, Rc<dyn Fn()>)>,
    next_subscription: u64,
    root: NodeId,
}

/// A lazily-loaded tree presented as one contiguous sequence of visible
/// node ids.
///
/// `Tree` is a cheap-clone handle; clones share the same state, which is
/// how concurrent operations (an expand racing a collapse, de-duplicated
/// loads) observe each other. All methods take `&self`.
///
/// See the [crate docs](crate) for a usage example.
pub struct Tree<D> {
    inner: Rc<RefCell<TreeState<D>>>,
    source: Rc<dyn TreeSource<D>>,
    ids: IdGen,
    root: NodeId,
}

impl<D> Clone for Tree<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            source: Rc::clone(&self.source),
            ids: self.ids.clone(),
            root: self.root,
        }
    }
}

impl<D: Clone + 'static> Tree<D> {
    /// Create a tree over the given child source.
    ///
    /// The root branch is created immediately (id 0, always expanded)
    /// but nothing is loaded yet; the first
    /// [`ensure_loaded`](Self::ensure_loaded) or [`expand`](Self::expand)
    /// on the root performs the initial load.
    pub fn new(source: impl TreeSource<D> + 'static, root_data: D) -> Self {
        Self::with_source(Rc::new(source), root_data)
    }

    /// Like [`new`](Self::new), for an already shared source.
    pub fn with_source(source: Rc<dyn TreeSource<D>>, root_data: D) -> Self {
        let ids = IdGen::new();
        let root = ids.next();
        let mut nodes = HashMap::new();
        nodes.insert(root, Node::branch(root, None, root_data, true));

        let inner = Rc::new(RefCell::new(TreeState {
            nodes,
            views: FlatViewMap::new(root),
            pending: HashMap::new(),
            observers: Vec::new(),
            next_subscription: 0,
            root,
        }));

        Self {
            inner,
            source,
            ids,
            root,
        }
    }

    /// Id of the root branch.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Snapshot of the currently visible node ids, in pre-order.
    ///
    /// This is the root's flat view entry — the single authoritative
    /// visible sequence for the whole tree. Subscribers are expected to
    /// re-read it after each change notification rather than receive a
    /// diff.
    #[must_use]
    pub fn visible_nodes(&self) -> Vec<NodeId> {
        self.inner
            .borrow()
            .views
            .get(self.root)
            .map(<[NodeId]>::to_vec)
            .unwrap_or_default()
    }

    /// Ensure the children of `branch` are loaded and ready.
    ///
    /// Idempotent: resolves immediately if already loaded, and attaches
    /// to the in-flight load if one is outstanding (the source is never
    /// invoked twice for the same branch concurrently). "Loaded" does
    /// not mean expanded; it only means the contents are ready.
    pub async fn ensure_loaded(&self, branch: NodeId) -> Result<()> {
        let needs_load = {
            let st = self.inner.borrow();
            let node = st
                .nodes
                .get(&branch)
                .ok_or(TreeError::UnknownNode(branch))?;
            match node.kind() {
                NodeKind::Branch { children, .. } => children.is_none(),
                NodeKind::Leaf => return Err(TreeError::NotABranch(branch)),
            }
        };

        if needs_load {
            self.load_children(branch).await
        } else {
            Ok(())
        }
    }

    /// Expand `branch` with default [`ExpandOptions`].
    pub async fn expand(&self, branch: NodeId) -> Result<()> {
        self.expand_inner(branch, ExpandOptions::default()).await
    }

    /// Expand `branch`.
    ///
    /// The intent flag is set immediately, before the children finish
    /// loading; a concurrent [`collapse`](Self::collapse) issued while
    /// the load is in flight flips it back and the expansion never
    /// reaches the flat view.
    pub async fn expand_with(&self, branch: NodeId, options: ExpandOptions) -> Result<()> {
        self.expand_inner(branch, options).await
    }

    /// Collapse `branch`: its descendants' rows are carved out of
    /// whichever flat view currently holds them and cached under the
    /// branch's own id. The branch's own row stays visible.
    ///
    /// No-op unless the intent flag is currently set. Collapsing under
    /// an already collapsed ancestor produces no visible change, but the
    /// flag is recorded and takes effect once the ancestor re-expands.
    /// The root cannot be collapsed.
    pub fn collapse(&self, branch: NodeId) -> Result<()> {
        {
            let mut st = self.inner.borrow_mut();
            let node = st
                .nodes
                .get(&branch)
                .ok_or(TreeError::UnknownNode(branch))?;
            if node.is_leaf() {
                return Err(TreeError::NotABranch(branch));
            }
            if branch != self.root && node.is_expanded() {
                st.disconnect(branch);
                // disconnect skips a branch that already holds its own
                // store key (an expand still settling eager children);
                // the collapse intent must stick regardless
                if let Some(node) = st.nodes.get_mut(&branch) {
                    node.set_expanded(false);
                }
            }
        }
        self.notify_visible_change();
        Ok(())
    }

    /// Transactionally mutate the children of `branch`.
    ///
    /// The mutator receives a draft of the current child sequence plus
    /// insert/sort/revert operations; see [`Amend`]. If any operation
    /// was applied and not reverted by the time the mutator returns, the
    /// draft becomes the branch's child sequence through the same
    /// consistency procedure as a fresh load (previously expanded
    /// children are disconnected and reconnected around the
    /// replacement). Otherwise nothing changes.
    ///
    /// The mutator must not call back into this tree.
    ///
    /// # Panics
    ///
    /// Panics if the draft drops a previously live child; partial
    /// replacement would corrupt the flat view and is treated as a
    /// programming defect. (The `Amend` API itself cannot express a
    /// removal, so this only fires on internal misuse.)
    pub fn amend<F>(&self, branch: NodeId, mutator: F) -> Result<()>
    where
        F: FnOnce(&mut Amend<'_, D>),
    {
        let (draft, staged, modified) = {
            let st = self.inner.borrow();
            let node = st
                .nodes
                .get(&branch)
                .ok_or(TreeError::UnknownNode(branch))?;
            if node.is_leaf() {
                return Err(TreeError::NotABranch(branch));
            }
            let original = node
                .children()
                .ok_or(TreeError::NotLoaded(branch))?
                .to_vec();

            let mut ctx = Amend {
                arena: &st.nodes,
                ids: self.ids.clone(),
                branch,
                draft: original.clone(),
                original,
                staged: Vec::new(),
                modified: false,
            };
            mutator(&mut ctx);
            (ctx.draft, ctx.staged, ctx.modified)
        };

        if modified {
            self.inner.borrow_mut().install_children(branch, draft, staged);
            self.notify_visible_change();
        }
        Ok(())
    }

    /// Remove `node` and, if it is a branch, its whole subtree.
    ///
    /// Every descendant is deregistered from the id lookup and purged
    /// from every flat view, connected or cached; the node is then
    /// dropped from its parent's child sequence. The root cannot be
    /// removed.
    pub fn remove_node(&self, node: NodeId) -> Result<()> {
        {
            let mut st = self.inner.borrow_mut();
            let target = st.nodes.get(&node).ok_or(TreeError::UnknownNode(node))?;
            let Some(parent) = target.parent() else {
                return Err(TreeError::Unsupported("removing the root branch"));
            };

            // Pre-order sweep of the subtree, while the topology is intact.
            let mut subtree = vec![node];
            let mut i = 0;
            while i < subtree.len() {
                if let Some(children) = st.nodes.get(&subtree[i]).and_then(Node::children) {
                    subtree.extend_from_slice(children);
                }
                i += 1;
            }

            // Carve the node's contiguous range (own row + visible
            // descendants) out of whichever view holds it.
            let shadow = st.closest_disconnected_ancestor(node).unwrap_or(st.root);
            let view = st
                .views
                .get(shadow)
                .unwrap_or_else(|| panic!("no flat view for shadow parent {shadow}"))
                .to_vec();
            let (start, end) = st.projection_range(&view, node);
            let Spliced { seq, .. } = splice(&view, start, end - start, &[]);
            st.views.set(shadow, seq);

            #[cfg(feature = "tracing")]
            tracing::trace!(node = %node, descendants = subtree.len() - 1, "removed subtree");

            for &id in &subtree {
                st.views.delete(id);
                st.pending.remove(&id);
                st.nodes.remove(&id);
            }

            if let Some(parent_node) = st.nodes.get_mut(&parent) {
                if let NodeKind::Branch {
                    children: Some(list),
                    ..
                } = &mut parent_node.kind
                {
                    list.retain(|&child| child != node);
                }
            }
        }
        self.notify_visible_change();
        Ok(())
    }

    /// Move `node` under a new parent branch.
    ///
    /// Reserved: cross-parent moves require disconnect-then-reinsert
    /// through the child-set replacement procedure and are not
    /// implemented. Always returns [`TreeError::Unsupported`] rather
    /// than pretending to succeed.
    pub fn move_node(&self, _node: NodeId, _to: NodeId) -> Result<()> {
        Err(TreeError::Unsupported("move_node"))
    }

    /// Real-time expansion status: the branch's children are loaded, the
    /// intent flag is set, and the branch is connected (its id is not a
    /// standalone flat-view key).
    ///
    /// Unlike the intent flag this only reads `true` once the expansion
    /// has actually reached the flat view. The root reports whether its
    /// children are loaded, since it is always expanded and its entry is
    /// always present.
    #[must_use]
    pub fn is_truly_expanded(&self, branch: NodeId) -> bool {
        let st = self.inner.borrow();
        let Some(node) = st.nodes.get(&branch) else {
            return false;
        };
        match node.kind() {
            NodeKind::Branch { children, expanded } => {
                if branch == self.root {
                    children.is_some()
                } else {
                    children.is_some() && *expanded && !st.views.has(branch)
                }
            }
            NodeKind::Leaf => false,
        }
    }

    /// Whether no ancestor between `node` and the root is disconnected
    /// (collapsed, or expanding but not yet spliced in). A truly-expanded
    /// branch can still be invisible when a collapsed ancestor hides it.
    #[must_use]
    pub fn is_visible(&self, node: NodeId) -> bool {
        let st = self.inner.borrow();
        st.nodes.contains_key(&node) && st.closest_disconnected_ancestor(node).is_none()
    }

    /// The intended expansion flag (`false` for leaves and unknown ids).
    #[must_use]
    pub fn is_expanded(&self, branch: NodeId) -> bool {
        self.inner
            .borrow()
            .nodes
            .get(&branch)
            .is_some_and(Node::is_expanded)
    }

    /// Whether `id` resolves to a live node in this tree.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.inner.borrow().nodes.contains_key(&id)
    }

    /// Whether `id` is a branch.
    #[must_use]
    pub fn is_branch(&self, id: NodeId) -> bool {
        self.inner.borrow().nodes.get(&id).is_some_and(Node::is_branch)
    }

    /// Whether `id` is a leaf.
    #[must_use]
    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.inner.borrow().nodes.get(&id).is_some_and(Node::is_leaf)
    }

    /// Owning parent of `node`, or `None` for the root or unknown ids.
    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.borrow().nodes.get(&node).and_then(Node::parent)
    }

    /// Derived depth of `node`: 0 for the root, else parent depth + 1.
    #[must_use]
    pub fn depth(&self, node: NodeId) -> Option<usize> {
        let st = self.inner.borrow();
        let mut current = st.nodes.get(&node)?;
        let mut depth = 0;
        while let Some(parent) = current.parent() {
            depth += 1;
            current = st.nodes.get(&parent)?;
        }
        Some(depth)
    }

    /// Loaded child ids of `branch`, or `None` for leaves, unknown ids,
    /// and branches that have never loaded.
    #[must_use]
    pub fn children(&self, branch: NodeId) -> Option<Vec<NodeId>> {
        self.inner
            .borrow()
            .nodes
            .get(&branch)
            .and_then(|node| node.children().map(<[NodeId]>::to_vec))
    }

    /// Clone of the node's payload.
    #[must_use]
    pub fn data(&self, node: NodeId) -> Option<D> {
        self.inner
            .borrow()
            .nodes
            .get(&node)
            .map(|n| n.data().clone())
    }

    /// Run `f` against the node without cloning its payload.
    ///
    /// `f` must not call back into this tree.
    pub fn with_node<R>(&self, node: NodeId, f: impl FnOnce(&Node<D>) -> R) -> Option<R> {
        self.inner.borrow().nodes.get(&node).map(f)
    }

    /// Snapshot of one node for rendering: id, parent, derived depth,
    /// variant, expansion intent, and a payload clone.
    #[must_use]
    pub fn info(&self, node: NodeId) -> Option<NodeInfo<D>> {
        let depth = self.depth(node)?;
        let st = self.inner.borrow();
        let n = st.nodes.get(&node)?;
        Some(NodeInfo {
            id: n.id(),
            parent: n.parent(),
            depth,
            is_branch: n.is_branch(),
            expanded: n.is_expanded(),
            data: n.data().clone(),
        })
    }

    /// Materialize an id sequence (typically a slice of
    /// [`visible_nodes`](Self::visible_nodes)) into node snapshots,
    /// skipping ids that no longer resolve.
    #[must_use]
    pub fn materialize(&self, ids: &[NodeId]) -> Vec<NodeInfo<D>> {
        ids.iter().filter_map(|&id| self.info(id)).collect()
    }

    /// Subscribe to visible-sequence changes.
    ///
    /// The callback fires synchronously after a commit that changed the
    /// root's flat view entry, at most once per operation. It receives
    /// no arguments; re-read [`visible_nodes`](Self::visible_nodes).
    /// Callbacks should be cheap and non-blocking; they may freely read
    /// the tree.
    pub fn on_visible_change(&self, callback: impl Fn() + 'static) -> SubscriptionId {
        let mut st = self.inner.borrow_mut();
        let id = SubscriptionId(st.next_subscription);
        st.next_subscription += 1;
        st.observers.push((id, Rc::new(callback)));
        id
    }

    /// Remove a previously registered observer. Returns `false` if the
    /// subscription was already gone.
    pub fn unsubscribe(&self, subscription: SubscriptionId) -> bool {
        let mut st = self.inner.borrow_mut();
        let before = st.observers.len();
        st.observers.retain(|(id, _)| *id != subscription);
        st.observers.len() != before
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn expand_inner(
        &self,
        branch: NodeId,
        options: ExpandOptions,
    ) -> LocalBoxFuture<'static, Result<()>> {
        let this = self.clone();
        async move {
            {
                let st = this.inner.borrow();
                let node = st
                    .nodes
                    .get(&branch)
                    .ok_or(TreeError::UnknownNode(branch))?;
                if node.is_leaf() {
                    return Err(TreeError::NotABranch(branch));
                }
            }

            let visibility_satisfied = !options.ensure_visible || this.is_visible(branch);
            if !options.recursive && this.is_truly_expanded(branch) && visibility_satisfied {
                return Ok(());
            }

            // Optimistic intent, set before the load suspension.
            if let Some(node) = this.inner.borrow_mut().nodes.get_mut(&branch) {
                node.set_expanded(true);
            }

            match this.ensure_loaded(branch).await {
                Ok(()) => {}
                // The branch was removed while the load was in flight;
                // like a concurrent collapse, the removal wins.
                Err(TreeError::UnknownNode(id)) if id == branch => return Ok(()),
                Err(err) => return Err(err),
            }

            // Re-check after the suspension point: a collapse (or a
            // removal) issued while the load was in flight wins.
            let still_expanded = {
                let st = this.inner.borrow();
                st.nodes.get(&branch).is_some_and(Node::is_expanded)
            };
            if !still_expanded {
                return Ok(());
            }

            this.inner.borrow_mut().connect(branch, options.ensure_visible);
            this.notify_visible_change();

            if options.recursive {
                let child_branches: Vec<NodeId> = {
                    let st = this.inner.borrow();
                    st.nodes
                        .get(&branch)
                        .and_then(Node::children)
                        .map(|children| {
                            children
                                .iter()
                                .copied()
                                .filter(|id| st.nodes.get(id).is_some_and(Node::is_branch))
                                .collect()
                        })
                        .unwrap_or_default()
                };
                try_join_all(
                    child_branches
                        .into_iter()
                        .map(|child| this.expand_inner(child, options)),
                )
                .await?;
            }

            Ok(())
        }
        .boxed_local()
    }

    async fn load_children(&self, branch: NodeId) -> Result<()> {
        let load = {
            let mut st = self.inner.borrow_mut();
            match st.pending.get(&branch) {
                Some(load) => load.clone(),
                None => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(branch = %branch, "loading children");
                    let this = self.clone();
                    let load: SharedLoad =
                        async move { this.run_load(branch).await }.boxed_local().shared();
                    st.pending.insert(branch, load.clone());
                    load
                }
            }
        };
        load.await
    }

    async fn run_load(self, branch: NodeId) -> Result<()> {
        let result = self.run_load_inner(branch).await;
        self.inner.borrow_mut().pending.remove(&branch);
        self.notify_visible_change();

        #[cfg(feature = "tracing")]
        if let Err(err) = &result {
            tracing::debug!(branch = %branch, %err, "child load failed");
        }
        result
    }

    async fn run_load_inner(&self, branch: NodeId) -> Result<()> {
        let parent_data = {
            let st = self.inner.borrow();
            let node = st
                .nodes
                .get(&branch)
                .ok_or(TreeError::UnknownNode(branch))?;
            if branch == self.root {
                None
            } else {
                Some(node.data().clone())
            }
        };

        let mut factory = NodeFactory::new(self.ids.clone(), branch);
        let loaded = self.source.load(parent_data.as_ref(), &mut factory).await;
        let children = loaded.map_err(|err| TreeError::LoadFailed {
            branch,
            reason: err.to_string(),
        })?;
        let staged = factory.into_staged();

        let eager: Vec<NodeId> = {
            let mut st = self.inner.borrow_mut();
            // The branch may have been removed while the load was in
            // flight; abandon the commit rather than resurrect it.
            if !st.nodes.contains_key(&branch) {
                return Err(TreeError::UnknownNode(branch));
            }
            st.install_children(branch, children, staged);

            st.nodes[&branch]
                .children()
                .map(|installed| {
                    installed
                        .iter()
                        .copied()
                        .filter(|id| st.nodes.get(id).is_some_and(Node::is_expanded))
                        .collect()
                })
                .unwrap_or_default()
        };

        // Children that arrived with the intent flag already set expand
        // themselves eagerly, supporting persisted initial state.
        try_join_all(
            eager
                .into_iter()
                .map(|child| self.expand_inner(child, ExpandOptions::default())),
        )
        .await?;
        Ok(())
    }

    fn notify_visible_change(&self) {
        let callbacks: Vec<Rc<dyn Fn()>> = {
            let mut st = self.inner.borrow_mut();
            if !st.views.take_root_dirty() {
                return;
            }
            st.observers.iter().map(|(_, cb)| Rc::clone(cb)).collect()
        };
        // Delivered outside the borrow so subscribers can re-read the
        // tree immediately.
        for callback in &callbacks {
            callback();
        }
    }
}

impl<D> TreeState<D> {
    /// First disconnected strict ancestor of `node`, if any.
    ///
    /// An ancestor hides its descendants while its rows live under its
    /// own store key: either it is intentionally collapsed, or it is
    /// loaded with the intent flag set but not yet spliced into its own
    /// ancestor's view (an expand whose eager child expansions are still
    /// running). The root's entry is the authoritative view itself, so
    /// the root is never returned.
    fn closest_disconnected_ancestor(&self, node: NodeId) -> Option<NodeId> {
        let mut parent = self.nodes.get(&node).and_then(Node::parent);
        while let Some(id) = parent {
            let node = &self.nodes[&id];
            if id != self.root
                && node.is_branch()
                && (!node.is_expanded() || self.views.has(id))
            {
                return Some(id);
            }
            parent = node.parent();
        }
        None
    }

    /// Contiguous range `start..end` of `node`'s own row plus all its
    /// visible descendants inside `view`.
    ///
    /// Walks upward while the current node is the last child of its
    /// parent; because flattening is pre-order, a subtree's only possible
    /// right boundary is the next sibling of the first non-last ancestor
    /// (or the end of the view when the walk reaches the root).
    ///
    /// # Panics
    ///
    /// Panics if `node` is absent from `view` or the topology is
    /// inconsistent with it; both indicate a corrupted flat view.
    fn projection_range(&self, view: &[NodeId], node: NodeId) -> (usize, usize) {
        let start = view
            .iter()
            .position(|&id| id == node)
            .unwrap_or_else(|| panic!("node {node} missing from its flat view"));

        let mut current = node;
        let next_sibling = loop {
            let Some(parent) = self.nodes[&current].parent() else {
                break None;
            };
            let siblings = self.nodes[&parent].children().unwrap_or_else(|| {
                panic!("parent {parent} of {current} has no loaded children")
            });
            let pos = siblings
                .iter()
                .position(|&child| child == current)
                .unwrap_or_else(|| {
                    panic!("node {current} missing from child list of {parent}")
                });
            if pos + 1 < siblings.len() {
                break Some(siblings[pos + 1]);
            }
            current = parent;
        };

        let end = next_sibling
            .and_then(|sibling| view.iter().position(|&id| id == sibling))
            .unwrap_or(view.len());
        (start, end)
    }

    /// Carve a branch's descendant block out of whichever view holds it
    /// and park the block under the branch's own id. Clears the intent
    /// flag. No-op for the root or an already disconnected branch.
    fn disconnect(&mut self, branch: NodeId) {
        if branch == self.root || self.views.has(branch) {
            return;
        }

        let shadow = self.closest_disconnected_ancestor(branch).unwrap_or(self.root);
        let view = self
            .views
            .get(shadow)
            .unwrap_or_else(|| panic!("no flat view for shadow parent {shadow}"))
            .to_vec();
        let (start, end) = self.projection_range(&view, branch);
        // The branch's own row stays; only its descendants move out.
        let Spliced { seq, deleted } = splice(&view, start + 1, end - start - 1, &[]);

        #[cfg(feature = "tracing")]
        tracing::trace!(branch = %branch, cached = deleted.len(), "disconnected branch");

        if let Some(node) = self.nodes.get_mut(&branch) {
            node.set_expanded(false);
        }
        self.views.set(shadow, seq);
        self.views.set(branch, deleted);
    }

    /// Splice a disconnected branch's cached block back into its closest
    /// expanded ancestor's view, right after the branch's own row, and
    /// drop the standalone key. Sets the intent flag. With
    /// `lift_to_root`, every disconnected ancestor is reconnected the
    /// same way up to the root.
    fn connect(&mut self, branch: NodeId, lift_to_root: bool) {
        let shadow = self.closest_disconnected_ancestor(branch).unwrap_or(self.root);

        if branch != self.root && self.views.has(branch) {
            let own = self
                .views
                .delete(branch)
                .unwrap_or_else(|| panic!("no cached view for {branch}"));
            let view = self
                .views
                .get(shadow)
                .unwrap_or_else(|| panic!("no flat view for shadow parent {shadow}"))
                .to_vec();
            let at = view
                .iter()
                .position(|&id| id == branch)
                .unwrap_or_else(|| panic!("branch {branch} missing from view of {shadow}"))
                + 1;
            let Spliced { seq, .. } = splice(&view, at, 0, &own);

            #[cfg(feature = "tracing")]
            tracing::trace!(branch = %branch, rows = own.len(), "connected branch");

            if let Some(node) = self.nodes.get_mut(&branch) {
                node.set_expanded(true);
            }
            self.views.set(shadow, seq);
        }

        if lift_to_root && shadow != self.root {
            self.connect(shadow, lift_to_root);
        }
    }

    /// Child-set replacement, shared by initial load and amend commit.
    ///
    /// Disconnects the branch (if it was loaded and expanded) and every
    /// previously expanded child, installs the new sequence, registers
    /// staged nodes, rebuilds the branch's one-level flat view, then
    /// reconnects the queued branches in reverse discovery order so
    /// deeper blocks are restored innermost-first.
    ///
    /// # Panics
    ///
    /// Panics if a previously existing child is absent from
    /// `new_children`, or if `new_children` contains an id that neither
    /// exists nor was staged. Both are programming defects that would
    /// silently corrupt the flat view.
    fn install_children(&mut self, branch: NodeId, new_children: Vec<NodeId>, staged: Vec<Node<D>>) {
        let mut restore: Vec<NodeId> = Vec::new();

        let prior = match &self.nodes[&branch].kind {
            NodeKind::Branch { children, expanded } => {
                children.clone().map(|old| (old, *expanded))
            }
            NodeKind::Leaf => panic!("install_children on leaf {branch}"),
        };

        if let Some((old_children, expanded)) = prior {
            if expanded {
                self.disconnect(branch);
                restore.push(branch);
            }
            for &child in &old_children {
                assert!(
                    new_children.contains(&child),
                    "child {child} missing from replacement set for branch {branch}; \
                     partial replacement would corrupt the flat view"
                );
                if self.nodes.get(&child).is_some_and(Node::is_expanded) {
                    self.disconnect(child);
                    restore.push(child);
                }
            }
        }

        for node in staged {
            self.nodes.insert(node.id(), node);
        }
        for &child in &new_children {
            assert!(
                self.nodes.contains_key(&child),
                "child {child} of branch {branch} was not created by this tree's factory"
            );
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(branch = %branch, children = new_children.len(), "installed child set");

        if let Some(node) = self.nodes.get_mut(&branch) {
            node.set_children(new_children.clone());
        }
        self.views.set(branch, new_children);

        for &queued in restore.iter().rev() {
            self.connect(queued, false);
        }
    }
}

/// Transactional draft handed to the [`Tree::amend`] mutator.
///
/// Operations accumulate against a draft copy of the branch's child
/// sequence; nothing touches the tree until the mutator returns with at
/// least one unreverted operation.
pub struct Amend<'a, D> {
    arena: &'a HashMap<NodeId, Node<D>>,
    ids: IdGen,
    branch: NodeId,
    original: Vec<NodeId>,
    draft: Vec<NodeId>,
    staged: Vec<Node<D>>,
    modified: bool,
}

impl<D> Amend<'_, D> {
    /// Live view of the draft child sequence; updates after every
    /// operation.
    #[must_use]
    pub fn draft(&self) -> &[NodeId] {
        &self.draft
    }

    /// Create and insert a new leaf at `index` (appended when `None` or
    /// out of range). Returns the new node's id.
    pub fn insert_leaf(&mut self, data: D, index: Option<usize>) -> NodeId {
        let id = self.ids.next();
        self.staged.push(Node::leaf(id, Some(self.branch), data));
        self.insert_at(id, index);
        id
    }

    /// Create and insert a new, initially collapsed branch at `index`
    /// (appended when `None` or out of range). Returns the new node's id.
    pub fn insert_branch(&mut self, data: D, index: Option<usize>) -> NodeId {
        let id = self.ids.next();
        self.staged
            .push(Node::branch(id, Some(self.branch), data, false));
        self.insert_at(id, index);
        id
    }

    /// Sort the draft with a caller-supplied comparator. Ordering policy
    /// belongs entirely to the caller; the engine imposes none.
    pub fn sort_by<F>(&mut self, mut compare: F)
    where
        F: FnMut(&Node<D>, &Node<D>) -> Ordering,
    {
        let mut draft = std::mem::take(&mut self.draft);
        draft.sort_by(|&a, &b| compare(self.node(a), self.node(b)));
        self.draft = draft;
        self.modified = true;
    }

    /// Reset the draft to the original child sequence and discard every
    /// prior operation in this call, including created nodes (their ids
    /// are burned).
    pub fn revert_changes(&mut self) {
        self.draft = self.original.clone();
        self.staged.clear();
        self.modified = false;
    }

    fn insert_at(&mut self, id: NodeId, index: Option<usize>) {
        let at = index.unwrap_or(self.draft.len()).min(self.draft.len());
        self.draft.insert(at, id);
        self.modified = true;
    }

    fn node(&self, id: NodeId) -> &Node<D> {
        self.staged
            .iter()
            .find(|n| n.id() == id)
            .or_else(|| self.arena.get(&id))
            .unwrap_or_else(|| panic!("draft id {id} resolves to no node"))
    }
}

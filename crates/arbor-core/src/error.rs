//! Error type for tree operations.

use std::fmt;

use crate::node::NodeId;

/// Errors surfaced by the tree engine.
///
/// All variants are recoverable from the caller's point of view; internal
/// invariant violations (a child-set replacement dropping a live child, a
/// flat view out of sync with the topology) are programming defects and
/// panic instead of returning one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// The id does not resolve to a live node in this tree.
    UnknownNode(NodeId),
    /// The operation requires a branch but the target is a leaf.
    NotABranch(NodeId),
    /// The operation requires loaded children but the branch has never
    /// been loaded.
    NotLoaded(NodeId),
    /// The external child source failed. Every caller awaiting the same
    /// pending load receives this; the branch stays unloaded so a later
    /// `ensure_loaded` retries.
    LoadFailed {
        /// The branch whose children were being loaded.
        branch: NodeId,
        /// Message from the source's error.
        reason: String,
    },
    /// The operation is declared but intentionally not supported.
    Unsupported(&'static str),
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNode(id) => write!(f, "unknown node {id}"),
            Self::NotABranch(id) => write!(f, "node {id} is not a branch"),
            Self::NotLoaded(id) => write!(f, "branch {id} has not been loaded"),
            Self::LoadFailed { branch, reason } => {
                write!(f, "loading children of branch {branch} failed: {reason}")
            }
            Self::Unsupported(op) => write!(f, "unsupported operation: {op}"),
        }
    }
}

impl std::error::Error for TreeError {}

/// Standard result type for tree APIs.
pub type Result<T> = std::result::Result<T, TreeError>;

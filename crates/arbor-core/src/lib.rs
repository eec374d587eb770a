#![forbid(unsafe_code)]

//! Lazy tree flattening for windowed renderers.
//!
//! `arbor-core` maintains a tree whose branches load their children on
//! demand from an async [`TreeSource`], and projects the expanded parts
//! into one contiguous pre-order sequence of node ids. Renderers read a
//! slice of that sequence and [`materialize`](Tree::materialize) it; they
//! never walk the tree.
//!
//! Collapsing a branch parks its flattened descendant block under the
//! branch's own id, so re-expanding restores the exact prior nested
//! state without touching the source again. Loads are de-duplicated per
//! branch, and a collapse issued while an expand's load is in flight
//! always wins.
//!
//! The engine is single-threaded: handles are `Rc`-shared clones, and
//! the only suspension points are source loads.
//!
//! ```
//! use arbor_core::{NodeFactory, NodeId, SourceError, Tree, TreeSource, async_trait};
//!
//! struct Listing;
//!
//! #[async_trait(?Send)]
//! impl TreeSource<String> for Listing {
//!     async fn load(
//!         &self,
//!         parent: Option<&String>,
//!         factory: &mut NodeFactory<String>,
//!     ) -> Result<Vec<NodeId>, SourceError> {
//!         Ok(match parent.map(String::as_str) {
//!             None => vec![
//!                 factory.create_branch("src".to_string(), false),
//!                 factory.create_leaf("Cargo.toml".to_string()),
//!             ],
//!             Some("src") => vec![factory.create_leaf("main.rs".to_string())],
//!             Some(_) => Vec::new(),
//!         })
//!     }
//! }
//!
//! futures::executor::block_on(async {
//!     let tree = Tree::new(Listing, "/".to_string());
//!     tree.expand(tree.root()).await?;
//!
//!     let src = tree.visible_nodes()[0];
//!     tree.expand(src).await?;
//!
//!     let names: Vec<String> = tree
//!         .materialize(&tree.visible_nodes())
//!         .into_iter()
//!         .map(|info| info.data)
//!         .collect();
//!     assert_eq!(names, ["src", "main.rs", "Cargo.toml"]);
//!     Ok::<_, arbor_core::TreeError>(())
//! })
//! .unwrap();
//! ```

pub mod error;
mod flat_view;
pub mod node;
pub mod source;
pub mod splice;
pub mod tree;

pub use error::{Result, TreeError};
pub use node::{Node, NodeId, NodeKind};
pub use source::{NodeFactory, SourceError, TreeSource};
pub use splice::{Spliced, splice};
pub use tree::{Amend, ExpandOptions, NodeInfo, SubscriptionId, Tree};

// Sources implement an async trait; re-exported so downstream crates
// don't need to pin the exact attribute version themselves.
pub use async_trait::async_trait;

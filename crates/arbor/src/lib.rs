#![forbid(unsafe_code)]

//! Arbor public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users. It
//! re-exports the common types from the engine crate and offers a
//! lightweight prelude for day-to-day usage.

// --- Engine re-exports -----------------------------------------------------

pub use arbor_core::{
    Amend, ExpandOptions, Node, NodeFactory, NodeId, NodeInfo, NodeKind, Result, SourceError,
    Spliced, SubscriptionId, Tree, TreeError, TreeSource, async_trait, splice,
};

// --- Prelude ---------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        ExpandOptions, NodeFactory, NodeId, NodeInfo, Result, Tree, TreeError, TreeSource,
        async_trait,
    };

    pub use crate::core;
}

pub use arbor_core as core;

//! Fixed-width id-sequence splicing.
//!
//! Flat views are plain `NodeId` sequences; every incremental update —
//! connecting a cached subtree block, carving one out on collapse,
//! removing a subtree — is a single splice. The splice here allocates
//! exactly two output vectors (result and deleted slice) per call and
//! clamps out-of-range inputs instead of panicking, so an insert of any
//! length is safe.
//!
//! # Invariants
//!
//! 1. `spliced.len() == seq.len() - deleted.len() + insert.len()`.
//! 2. `deleted` is exactly `seq[start..start + delete_count]` (clamped).
//! 3. Elements outside the spliced window keep their relative order.

use crate::node::NodeId;

/// Result of a [`splice`]: the new sequence and the removed sub-range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spliced {
    /// The sequence after deletion and insertion.
    pub seq: Vec<NodeId>,
    /// The deleted sub-range, in original order.
    pub deleted: Vec<NodeId>,
}

/// Delete `delete_count` elements of `seq` starting at `start`, inserting
/// `insert` in their place.
///
/// `start` and `delete_count` are clamped to the sequence bounds, so the
/// call never panics. When `delete_count == insert.len()` this is a
/// replace; when `delete_count == 0` a pure insert.
#[must_use]
pub fn splice(seq: &[NodeId], start: usize, delete_count: usize, insert: &[NodeId]) -> Spliced {
    let start = start.min(seq.len());
    let delete_count = delete_count.min(seq.len() - start);

    let mut out = Vec::with_capacity(seq.len() - delete_count + insert.len());
    out.extend_from_slice(&seq[..start]);
    out.extend_from_slice(insert);
    out.extend_from_slice(&seq[start + delete_count..]);

    Spliced {
        seq: out,
        deleted: seq[start..start + delete_count].to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(values: &[u32]) -> Vec<NodeId> {
        values.iter().map(|&v| NodeId(v)).collect()
    }

    #[test]
    fn delete_middle() {
        let out = splice(&ids(&[1, 2, 3, 4, 5]), 1, 2, &[]);
        assert_eq!(out.seq, ids(&[1, 4, 5]));
        assert_eq!(out.deleted, ids(&[2, 3]));
    }

    #[test]
    fn insert_without_delete() {
        let out = splice(&ids(&[1, 4]), 1, 0, &ids(&[2, 3]));
        assert_eq!(out.seq, ids(&[1, 2, 3, 4]));
        assert!(out.deleted.is_empty());
    }

    #[test]
    fn replace_range() {
        let out = splice(&ids(&[1, 2, 3]), 0, 3, &ids(&[9]));
        assert_eq!(out.seq, ids(&[9]));
        assert_eq!(out.deleted, ids(&[1, 2, 3]));
    }

    #[test]
    fn clamps_start_and_delete_count() {
        let out = splice(&ids(&[1, 2]), 10, 10, &ids(&[3]));
        assert_eq!(out.seq, ids(&[1, 2, 3]));
        assert!(out.deleted.is_empty());

        let out = splice(&ids(&[1, 2]), 1, 10, &[]);
        assert_eq!(out.seq, ids(&[1]));
        assert_eq!(out.deleted, ids(&[2]));
    }

    #[test]
    fn empty_sequence() {
        let out = splice(&[], 0, 0, &ids(&[1]));
        assert_eq!(out.seq, ids(&[1]));
        assert!(out.deleted.is_empty());
    }

    #[test]
    fn large_insert_does_not_panic() {
        let insert: Vec<NodeId> = (0..200_000).map(NodeId).collect();
        let out = splice(&ids(&[1, 2]), 1, 0, &insert);
        assert_eq!(out.seq.len(), 200_002);
        assert_eq!(out.seq[0], NodeId(1));
        assert_eq!(out.seq[200_001], NodeId(2));
    }

    proptest! {
        #[test]
        fn matches_vec_model(
            seq in proptest::collection::vec(0u32..1000, 0..64),
            insert in proptest::collection::vec(0u32..1000, 0..16),
            start in 0usize..80,
            delete_count in 0usize..80,
        ) {
            let seq = ids(&seq);
            let insert = ids(&insert);
            let out = splice(&seq, start, delete_count, &insert);

            let start_c = start.min(seq.len());
            let delete_c = delete_count.min(seq.len() - start_c);

            let mut model = seq.clone();
            let deleted: Vec<NodeId> =
                model.splice(start_c..start_c + delete_c, insert.iter().copied()).collect();

            prop_assert_eq!(out.seq, model);
            prop_assert_eq!(out.deleted, deleted);
        }
    }
}

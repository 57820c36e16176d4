//! Error types for spatial-tree.

use thiserror::Error;

/// Errors raised while building or querying a spatial structure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpatialError {
    /// An index referenced an element past the end of its array.
    #[error("{kind} index {index} out of range (len {len})")]
    IndexOutOfRange {
        /// What kind of element was referenced (e.g. "vertex", "plane").
        kind: &'static str,
        /// The offending index.
        index: usize,
        /// Length of the array that was indexed.
        len: usize,
    },

    /// The tree has no nodes to query.
    #[error("tree is empty")]
    EmptyTree,

    /// Node links reach the same node twice, so descents might never end.
    #[error("node {node} is reachable more than once")]
    MalformedTree {
        /// First node found on a second path.
        node: usize,
    },

    /// A cluster's visibility row could not be decoded or has the wrong size.
    #[error("invalid PVS for cluster {cluster}: {reason}")]
    InvalidPvs {
        /// Cluster whose row is invalid.
        cluster: usize,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// A face's lightmap extends past the end of the lightmap data.
    #[error("lightmap of face {face} at offset {offset} runs past the lightmap data (len {len})")]
    LightmapOutOfRange {
        /// Face index.
        face: usize,
        /// Byte offset of the face's lightmap.
        offset: usize,
        /// Length of the lightmap data.
        len: usize,
    },
}

impl SpatialError {
    /// Shorthand for building an [`SpatialError::IndexOutOfRange`].
    pub fn out_of_range(kind: &'static str, index: usize, len: usize) -> Self {
        Self::IndexOutOfRange { kind, index, len }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, SpatialError>;

/// Checks `index < len`, returning it unchanged on success.
pub(crate) fn check_index(kind: &'static str, index: usize, len: usize) -> Result<usize> {
    if index < len {
        Ok(index)
    } else {
        Err(SpatialError::out_of_range(kind, index, len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_index_bounds() {
        assert_eq!(check_index("leaf", 2, 3), Ok(2));
        assert_eq!(
            check_index("leaf", 3, 3),
            Err(SpatialError::IndexOutOfRange {
                kind: "leaf",
                index: 3,
                len: 3
            })
        );
    }

    #[test]
    fn display_messages() {
        let err = SpatialError::out_of_range("vertex", 9, 4);
        assert_eq!(err.to_string(), "vertex index 9 out of range (len 4)");
        assert_eq!(SpatialError::EmptyTree.to_string(), "tree is empty");
    }
}

//! kDOP tree node implementation.

use crate::BoundingBox;

/// Triangle made of three indices into the tree's vertex array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriangleIndices(pub [u32; 3]);

impl TriangleIndices {
    /// Creates a triangle from its three vertex indices.
    #[inline]
    pub fn new(a: u32, b: u32, c: u32) -> Self {
        Self([a, b, c])
    }
}

impl From<[u32; 3]> for TriangleIndices {
    fn from(indices: [u32; 3]) -> Self {
        Self(indices)
    }
}

/// What a node holds besides its bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KdopNodeKind {
    /// Terminal node owning a non-empty list of triangle indices.
    Leaf { triangles: Vec<u32> },
    /// Node whose two children sit at `first_child` and `first_child + 1`
    /// in the tree's node arena.
    Internal { first_child: usize },
}

/// A node of the kDOP tree.
///
/// The bounding box covers every vertex of every triangle below the node.
#[derive(Debug, Clone, PartialEq)]
pub struct KdopNode {
    bounds: BoundingBox,
    kind: KdopNodeKind,
}

impl KdopNode {
    pub(crate) fn new(bounds: BoundingBox, kind: KdopNodeKind) -> Self {
        Self { bounds, kind }
    }

    /// Returns the bounding box of the node.
    #[inline]
    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    /// Returns the node contents.
    #[inline]
    pub fn kind(&self) -> &KdopNodeKind {
        &self.kind
    }

    /// Checks if this node is a leaf.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, KdopNodeKind::Leaf { .. })
    }

    /// Returns the triangles of a leaf, or an empty slice for internal nodes.
    #[inline]
    pub fn triangles(&self) -> &[u32] {
        match &self.kind {
            KdopNodeKind::Leaf { triangles } => triangles,
            KdopNodeKind::Internal { .. } => &[],
        }
    }

    /// Returns the arena indices of both children of an internal node.
    #[inline]
    pub fn children(&self) -> Option<[usize; 2]> {
        match self.kind {
            KdopNodeKind::Internal { first_child } => Some([first_child, first_child + 1]),
            KdopNodeKind::Leaf { .. } => None,
        }
    }
}

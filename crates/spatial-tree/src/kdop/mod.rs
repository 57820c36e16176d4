//! k-DOP tree (k = 6) for ray checks against static triangle meshes.
//!
//! With six fixed orientations a k-DOP is an axis-aligned box, so this is an
//! AABB hierarchy. The tree is built once from a triangle soup and is
//! immutable afterwards.
//!
//! # Example
//!
//! ```ignore
//! use spatial_tree::{KdopTree, Ray3, TriangleIndices};
//! use nalgebra::{Point3, Vector3};
//!
//! let tree = KdopTree::build(&triangles, &vertices)?;
//! let blocked = tree.line_check(&Ray3::segment(eye, target));
//! ```
//!
//! # Architecture
//!
//! - [`KdopTree`]: owns the node arena and its copy of the mesh
//! - [`KdopNode`]: a box plus either leaf triangles or the index of its two children
//! - [`SplitSelector`]: strategy trait for choosing the split axis and value

mod node;
mod selector;
mod tree;

pub use node::{KdopNode, KdopNodeKind, TriangleIndices};
pub use selector::{Axis, Split, SplitSelector, VarianceSplit};
pub use tree::{KdopConfig, KdopStats, KdopTree};

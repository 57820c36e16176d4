//! BSP world with PVS visibility, for rendering static levels.
//!
//! The level is split by planes down to convex leaves. Leaves are grouped
//! into clusters, and each cluster stores the set of clusters that may be
//! seen from it (its PVS). Rendering locates the camera's leaf, keeps the
//! leaves whose cluster is in the PVS and whose box touches the view frustum,
//! and emits their faces.
//!
//! # Example
//!
//! ```ignore
//! use spatial_tree::{Bsp, View};
//!
//! let mut bsp = Bsp::from_data(importer_output)?;
//! bsp.init(&mut atlas)?;
//!
//! // Every frame
//! let view = View { position: eye, projection, view: camera_matrix };
//! let stats = bsp.render(&view, &atlas, &mut renderer);
//! ```
//!
//! # Architecture
//!
//! - [`Bsp`]: owns the level arrays and the per-frame traversal state
//! - [`BspData`]: importer output, validated by [`Bsp::from_data`]
//! - [`View`] and [`RenderStats`]: input and output of a render call

#[cfg(test)]
pub(crate) mod fixtures;
mod render;
mod tree;
mod types;

pub use render::{RenderStats, View};
pub use tree::Bsp;
pub use types::{
    BspData, BspFace, BspLeaf, BspNode, Child, Cluster, ClusterId, Edge, FaceEdge, SurfaceFlags,
    TextureInfo,
};

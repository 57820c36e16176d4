//! Static spatial queries for level geometry.
//!
//! - [`KdopTree`]: AABB hierarchy over a triangle soup, for line checks
//! - [`Bsp`]: plane-partitioned level with PVS culling, for rendering

mod aabb;
pub mod bsp;
mod draw;
mod error;
mod frustum;
pub mod kdop;
mod lightmap;
mod plane;
mod pvs;
mod ray;

pub use aabb::BoundingBox;
pub use bsp::{
    Bsp, BspData, BspFace, BspLeaf, BspNode, Child, Cluster, ClusterId, Edge, FaceEdge,
    RenderStats, SurfaceFlags, TextureInfo, View,
};
pub use draw::{DrawSink, Primitive, TextureHandle, TextureStage};
pub use error::{Result, SpatialError};
pub use frustum::{Frustum, FrustumSide};
pub use kdop::{
    Axis, KdopConfig, KdopNode, KdopNodeKind, KdopStats, KdopTree, Split, SplitSelector,
    TriangleIndices, VarianceSplit,
};
pub use lightmap::{
    AtlasSlot, LIGHTMAP_BYTES_PER_LUXEL, LightmapAtlas, LightmapConfig, LightmapImage,
};
pub use plane::Plane3D;
pub use pvs::{Bitset, decompress_pvs};
pub use ray::{BOX_EPSILON, Ray3, TRIANGLE_EPSILON};

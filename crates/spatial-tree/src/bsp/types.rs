//! Level data consumed by the BSP world.

use bitflags::bitflags;
use nalgebra::{Point3, Vector2, Vector3};

use crate::{AtlasSlot, BoundingBox, Bitset, Plane3D, TextureHandle};

/// Reference from a node to one of its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Child {
    /// Index into the node array.
    Node(u32),
    /// Index into the leaf array.
    Leaf(u32),
}

impl Child {
    /// Decodes the on-disk form: non-negative values are nodes, negative
    /// values are the bitwise complement of a leaf index.
    #[inline]
    pub fn from_raw(raw: i32) -> Self {
        if raw >= 0 {
            Self::Node(raw as u32)
        } else {
            Self::Leaf(!raw as u32)
        }
    }
}

/// Visibility cluster of a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClusterId(pub u16);

impl ClusterId {
    /// Leaves outside every cluster (solid space, void).
    pub const NOT_VISIBLE: Self = Self(0xFFFF);

    /// Returns `false` for [`ClusterId::NOT_VISIBLE`].
    #[inline]
    pub fn is_visible(self) -> bool {
        self != Self::NOT_VISIBLE
    }

    /// Returns the cluster's row index, or `None` for [`ClusterId::NOT_VISIBLE`].
    #[inline]
    pub fn index(self) -> Option<usize> {
        self.is_visible().then_some(usize::from(self.0))
    }
}

/// One entry of the face edge table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceEdge {
    /// Index into the edge array.
    pub edge: u32,
    /// Walk the edge from its second point to its first.
    pub reversed: bool,
}

impl FaceEdge {
    /// Decodes the on-disk signed form, negative meaning reversed.
    #[inline]
    pub fn from_raw(raw: i32) -> Self {
        Self {
            edge: raw.unsigned_abs(),
            reversed: raw < 0,
        }
    }
}

/// A segment between two vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub points: [u32; 2],
}

impl Edge {
    /// Vertex index a face walking this edge starts at.
    #[inline]
    pub fn start(&self, reversed: bool) -> u32 {
        self.points[usize::from(reversed)]
    }
}

bitflags! {
    /// Surface properties of a texture info.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct SurfaceFlags: u32 {
        /// Emits light.
        const LIGHT   = 0x01;
        /// Slippery.
        const SLICK   = 0x02;
        /// Not drawn; stands for the sky box.
        const SKY     = 0x04;
        /// Turbulent liquid surface.
        const WARP    = 0x08;
        /// 33% opaque.
        const TRANS33 = 0x10;
        /// 66% opaque.
        const TRANS66 = 0x20;
        /// Texture scrolls.
        const FLOWING = 0x40;
        /// Never drawn.
        const NODRAW  = 0x80;
    }
}

impl SurfaceFlags {
    /// Surfaces that never receive a lightmap.
    pub const UNLIT: Self = Self::SKY
        .union(Self::TRANS33)
        .union(Self::TRANS66)
        .union(Self::WARP);
}

/// How a texture is mapped onto the faces using it.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureInfo {
    pub axis_u: Vector3<f32>,
    pub offset_u: f32,
    pub axis_v: Vector3<f32>,
    pub offset_v: f32,
    pub flags: SurfaceFlags,
    pub value: u32,
    pub texture: TextureHandle,
    /// Texture size in texels, used to normalize texture coordinates.
    pub width: u32,
    pub height: u32,
    /// Next frame of an animated texture, if any.
    pub next: Option<u32>,
}

impl TextureInfo {
    /// Projects a point onto the texture axes, in texels.
    #[inline]
    pub fn project(&self, point: Point3<f32>) -> Vector2<f32> {
        Vector2::new(
            point.coords.dot(&self.axis_u) + self.offset_u,
            point.coords.dot(&self.axis_v) + self.offset_v,
        )
    }
}

/// An interior node of the BSP tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BspNode {
    pub plane: u32,
    pub front: Child,
    pub back: Child,
}

/// A convex region at the bottom of the BSP tree.
#[derive(Debug, Clone, PartialEq)]
pub struct BspLeaf {
    pub cluster: ClusterId,
    pub bounds: BoundingBox,
    /// First entry of the leaf-face table referenced by this leaf.
    pub first_face: u32,
    pub face_count: u32,
}

/// A convex polygon of level geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct BspFace {
    pub plane: u32,
    /// The face looks along the negated plane normal.
    pub plane_side: bool,
    pub first_edge: u32,
    pub edge_count: u32,
    pub texture_info: u32,
    /// Byte offset of the face's lightmap in the lightmap data, if it has one.
    pub lightmap_offset: Option<u32>,
    /// Set by [`crate::Bsp::init`] once the lightmap is in the atlas.
    pub lightmap: Option<AtlasSlot>,
    /// Texture-space minimum, snapped down to the luxel grid.
    pub texture_min: Vector2<i32>,
    /// Texture-space size, snapped out to the luxel grid.
    pub extent: Vector2<i32>,
}

impl BspFace {
    /// Creates a face with no lightmap placement computed yet.
    pub fn new(
        plane: u32,
        plane_side: bool,
        first_edge: u32,
        edge_count: u32,
        texture_info: u32,
        lightmap_offset: Option<u32>,
    ) -> Self {
        Self {
            plane,
            plane_side,
            first_edge,
            edge_count,
            texture_info,
            lightmap_offset,
            lightmap: None,
            texture_min: Vector2::zeros(),
            extent: Vector2::zeros(),
        }
    }
}

/// Visibility data of one cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    /// Bit `j` set: cluster `j` may be visible from this one.
    pub pvs: Bitset,
    /// Offset of the potentially hearable set in the source data; not decoded.
    pub phs: u32,
}

/// Everything an importer extracts from a level file.
#[derive(Debug, Clone, Default)]
pub struct BspData {
    pub vertices: Vec<Point3<f32>>,
    pub edges: Vec<Edge>,
    pub face_edges: Vec<FaceEdge>,
    pub planes: Vec<Plane3D>,
    pub nodes: Vec<BspNode>,
    pub leaves: Vec<BspLeaf>,
    /// Face indices referenced by leaves.
    pub leaf_faces: Vec<u32>,
    pub faces: Vec<BspFace>,
    pub clusters: Vec<Cluster>,
    pub texture_info: Vec<TextureInfo>,
    /// Raw RGB8 lightmaps, addressed by [`BspFace::lightmap_offset`].
    pub lightmap_data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_decoding() {
        assert_eq!(Child::from_raw(0), Child::Node(0));
        assert_eq!(Child::from_raw(12), Child::Node(12));
        assert_eq!(Child::from_raw(-1), Child::Leaf(0));
        assert_eq!(Child::from_raw(-8), Child::Leaf(7));
        assert_eq!(Child::from_raw(i32::MIN), Child::Leaf(i32::MAX as u32));
    }

    #[test]
    fn face_edge_decoding() {
        assert_eq!(
            FaceEdge::from_raw(5),
            FaceEdge {
                edge: 5,
                reversed: false
            }
        );
        assert_eq!(
            FaceEdge::from_raw(-5),
            FaceEdge {
                edge: 5,
                reversed: true
            }
        );
        let edge = Edge { points: [3, 9] };
        assert_eq!(edge.start(false), 3);
        assert_eq!(edge.start(true), 9);
    }

    #[test]
    fn cluster_sentinel() {
        assert!(!ClusterId::NOT_VISIBLE.is_visible());
        assert_eq!(ClusterId::NOT_VISIBLE.index(), None);
        assert_eq!(ClusterId(4).index(), Some(4));
    }

    #[test]
    fn unlit_flags() {
        assert!(SurfaceFlags::UNLIT.contains(SurfaceFlags::SKY));
        assert!(SurfaceFlags::UNLIT.contains(SurfaceFlags::WARP));
        assert!(!SurfaceFlags::UNLIT.intersects(SurfaceFlags::LIGHT | SurfaceFlags::FLOWING));
    }

    #[test]
    fn texture_projection() {
        let info = TextureInfo {
            axis_u: Vector3::x(),
            offset_u: 8.0,
            axis_v: Vector3::z(),
            offset_v: -4.0,
            flags: SurfaceFlags::empty(),
            value: 0,
            texture: TextureHandle(1),
            width: 64,
            height: 64,
            next: None,
        };
        assert_eq!(info.project(Point3::new(2.0, 7.0, 3.0)), Vector2::new(10.0, -1.0));
    }
}

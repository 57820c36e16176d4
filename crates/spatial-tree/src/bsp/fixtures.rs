//! Test doubles and a tiny two-room level.

use nalgebra::{Matrix4, Point3, Vector2, Vector3};

use crate::{
    AtlasSlot, Bitset, BoundingBox, DrawSink, LightmapAtlas, LightmapImage, Plane3D, Primitive,
    TextureHandle, TextureStage,
};

use super::render::View;
use super::types::{
    BspData, BspFace, BspLeaf, BspNode, Child, Cluster, ClusterId, Edge, FaceEdge, SurfaceFlags,
    TextureInfo,
};

/// One recorded [`DrawSink`] call.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Begin(Primitive),
    End,
    Normal(Vector3<f32>),
    Uv(TextureStage, Vector2<f32>),
    Vertex(Point3<f32>),
    Bind(TextureStage, TextureHandle),
    Unbind(TextureStage),
}

#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    pub calls: Vec<Call>,
}

impl DrawSink for RecordingSink {
    fn begin(&mut self, primitive: Primitive) {
        self.calls.push(Call::Begin(primitive));
    }

    fn end(&mut self) {
        self.calls.push(Call::End);
    }

    fn normal(&mut self, normal: Vector3<f32>) {
        self.calls.push(Call::Normal(normal));
    }

    fn uv(&mut self, stage: TextureStage, uv: Vector2<f32>) {
        self.calls.push(Call::Uv(stage, uv));
    }

    fn vertex(&mut self, position: Point3<f32>) {
        self.calls.push(Call::Vertex(position));
    }

    fn bind_texture(&mut self, stage: TextureStage, texture: TextureHandle) {
        self.calls.push(Call::Bind(stage, texture));
    }

    fn unbind_texture(&mut self, stage: TextureStage) {
        self.calls.push(Call::Unbind(stage));
    }
}

/// Puts every image on page 0 at luxel (1, 2) until `capacity` is reached.
#[derive(Debug)]
pub(crate) struct RecordingAtlas {
    pub first_texture: TextureHandle,
    pub page_size: u32,
    pub capacity: usize,
    pub began: bool,
    pub ended: bool,
    pub inserted: Vec<LightmapImage>,
}

impl RecordingAtlas {
    pub fn new(first_texture: TextureHandle, page_size: u32) -> Self {
        Self {
            first_texture,
            page_size,
            capacity: usize::MAX,
            began: false,
            ended: false,
            inserted: Vec::new(),
        }
    }
}

impl LightmapAtlas for RecordingAtlas {
    fn begin_packing(&mut self) {
        self.began = true;
    }

    fn insert_image(&mut self, image: &LightmapImage) -> Option<AtlasSlot> {
        if self.inserted.len() >= self.capacity {
            return None;
        }
        self.inserted.push(image.clone());
        Some(AtlasSlot {
            page: 0,
            offset_u: 1,
            offset_v: 2,
        })
    }

    fn end_packing(&mut self) {
        self.ended = true;
    }

    fn texture(&self, page: u32) -> TextureHandle {
        TextureHandle(self.first_texture.0 + page)
    }

    fn page_size(&self) -> u32 {
        self.page_size
    }
}

/// Square perspective view from `eye` towards `target`, y up.
pub(crate) fn view_from(eye: Point3<f32>, target: Point3<f32>) -> View {
    View {
        position: eye,
        projection: Matrix4::new_perspective(1.0, 1.5, 0.1, 1000.0),
        view: Matrix4::look_at_rh(&eye, &target, &Vector3::y()),
    }
}

fn texture_info(
    texture: u32,
    axis_u: Vector3<f32>,
    axis_v: Vector3<f32>,
    size: u32,
) -> TextureInfo {
    TextureInfo {
        axis_u,
        offset_u: 0.0,
        axis_v,
        offset_v: 0.0,
        flags: SurfaceFlags::empty(),
        value: 0,
        texture: TextureHandle(texture),
        width: size,
        height: size,
        next: None,
    }
}

/// Appends the edges of a vertex loop, returning the first face edge.
fn push_loop(data: &mut BspData, corners: &[u32], reversed: bool) -> u32 {
    let first = data.face_edges.len() as u32;
    for (i, &start) in corners.iter().enumerate() {
        let end = corners[(i + 1) % corners.len()];
        let points = if reversed { [end, start] } else { [start, end] };
        data.face_edges.push(FaceEdge {
            edge: data.edges.len() as u32,
            reversed,
        });
        data.edges.push(Edge { points });
    }
    first
}

fn room_bounds(min_x: f32) -> BoundingBox {
    BoundingBox::new(
        Point3::new(min_x, -5.0, -5.0),
        Point3::new(min_x + 10.0, 5.0, 5.0),
    )
}

/// Two 10-unit rooms side by side along x, then a solid block.
///
/// ```text
///   leaf 0 (cluster 0) | leaf 1 (cluster 1) | leaf 2 (solid)
///  x: -10            0                   10                 20
/// ```
///
/// Faces:
/// - 0: west floor, lit
/// - 1: east floor, lit, stored with reversed edges
/// - 2: wall at x = 0 facing west, shared by both rooms, no lightmap
/// - 3: east ceiling, sky
/// - 4: no edges
///
/// Cluster 1 sees cluster 0 but not the other way round.
pub(crate) fn two_rooms() -> BspData {
    let mut data = BspData {
        vertices: vec![
            Point3::new(-10.0, -5.0, -5.0),
            Point3::new(0.0, -5.0, -5.0),
            Point3::new(0.0, -5.0, 5.0),
            Point3::new(-10.0, -5.0, 5.0),
            Point3::new(10.0, -5.0, -5.0),
            Point3::new(10.0, -5.0, 5.0),
            Point3::new(0.0, 5.0, -5.0),
            Point3::new(0.0, 5.0, 5.0),
            Point3::new(10.0, 5.0, -5.0),
            Point3::new(10.0, 5.0, 5.0),
        ],
        planes: vec![
            Plane3D::new(Vector3::x(), 0.0),
            Plane3D::new(Vector3::x(), 10.0),
            Plane3D::new(Vector3::y(), -5.0),
            Plane3D::new(Vector3::y(), 5.0),
        ],
        texture_info: vec![
            texture_info(10, Vector3::x(), Vector3::z(), 64),
            TextureInfo {
                flags: SurfaceFlags::SKY,
                ..texture_info(12, Vector3::x(), Vector3::z(), 64)
            },
            texture_info(11, Vector3::z(), Vector3::y(), 32),
        ],
        lightmap_data: vec![10; 36],
        ..BspData::default()
    };

    let west_floor = push_loop(&mut data, &[0, 1, 2, 3], false);
    let east_floor = push_loop(&mut data, &[1, 4, 5, 2], true);
    let wall = push_loop(&mut data, &[1, 6, 7, 2], false);
    let sky = push_loop(&mut data, &[6, 8, 9, 7], false);

    data.faces = vec![
        BspFace::new(2, false, west_floor, 4, 0, Some(0)),
        BspFace::new(2, false, east_floor, 4, 0, Some(18)),
        BspFace::new(0, true, wall, 4, 2, None),
        BspFace::new(3, true, sky, 4, 1, Some(0)),
        BspFace::new(2, false, 0, 0, 0, Some(0)),
    ];
    data.leaf_faces = vec![2, 0, 1, 2, 3, 4];
    data.leaves = vec![
        BspLeaf {
            cluster: ClusterId(0),
            bounds: room_bounds(-10.0),
            first_face: 0,
            face_count: 2,
        },
        BspLeaf {
            cluster: ClusterId(1),
            bounds: room_bounds(0.0),
            first_face: 2,
            face_count: 4,
        },
        BspLeaf {
            cluster: ClusterId::NOT_VISIBLE,
            bounds: room_bounds(10.0),
            first_face: 6,
            face_count: 0,
        },
    ];
    data.nodes = vec![
        BspNode {
            plane: 0,
            front: Child::Node(1),
            back: Child::Leaf(0),
        },
        BspNode {
            plane: 1,
            front: Child::Leaf(2),
            back: Child::Leaf(1),
        },
    ];
    data.clusters = vec![
        Cluster {
            pvs: Bitset::from_bytes(2, &[0b01]),
            phs: 0,
        },
        Cluster {
            pvs: Bitset::from_bytes(2, &[0b11]),
            phs: 0,
        },
    ];
    data
}

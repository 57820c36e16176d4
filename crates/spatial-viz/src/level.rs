//! Procedural test level: a corridor of box rooms along +x.
//!
//! Every room is one BSP leaf and one cluster. A room only sees the rooms
//! within [`VISIBLE_RANGE`] of it, so walking the camera along the corridor
//! shows PVS culling at work. Every third ceiling is sky.

use nalgebra::{Point3, Vector3};
use spatial_tree::{
    Bitset, BoundingBox, BspData, BspFace, BspLeaf, BspNode, Child, Cluster, ClusterId, Edge,
    FaceEdge, Plane3D, SurfaceFlags, TextureHandle, TextureInfo, TriangleIndices,
};

/// Length and width of a room, a multiple of the luxel size.
pub const ROOM_SIZE: f32 = 64.0;
pub const ROOM_HEIGHT: f32 = 48.0;
/// How many rooms away a room can see in either direction.
pub const VISIBLE_RANGE: usize = 2;

const LUXEL_SIZE: f32 = 16.0;

/// Texture info indices; texture handles are the index plus one.
pub const FLOOR: u32 = 0;
pub const WALL: u32 = 1;
pub const END_WALL: u32 = 2;
pub const CEILING: u32 = 3;
pub const SKY: u32 = 4;

/// Level data for the BSP world plus the same geometry as a triangle soup.
pub struct Level {
    pub data: BspData,
    /// Indices into `data.vertices`.
    pub triangles: Vec<TriangleIndices>,
    pub rooms: usize,
}

impl Level {
    /// Builds a corridor of `rooms` rooms (at least one).
    pub fn corridor(rooms: usize) -> Self {
        let rooms = rooms.max(1);
        let mut builder = LevelBuilder::default();
        builder.data.texture_info = texture_infos();

        for room in 0..rooms {
            let first_face = builder.data.leaf_faces.len() as u32;
            for face in builder.push_room(room, rooms) {
                builder.data.leaf_faces.push(face);
            }
            builder.data.leaves.push(BspLeaf {
                cluster: ClusterId(room as u16),
                bounds: room_bounds(room),
                first_face,
                face_count: builder.data.leaf_faces.len() as u32 - first_face,
            });
            builder.data.clusters.push(Cluster {
                pvs: room_pvs(room, rooms),
                phs: 0,
            });
        }

        // A chain of splits at every room boundary.
        for split in 1..rooms {
            let plane = builder.data.planes.len() as u32;
            builder
                .data
                .planes
                .push(Plane3D::new(Vector3::x(), split as f32 * ROOM_SIZE));
            let front = if split + 1 < rooms {
                Child::Node(split as u32)
            } else {
                Child::Leaf(split as u32)
            };
            builder.data.nodes.push(BspNode {
                plane,
                front,
                back: Child::Leaf(split as u32 - 1),
            });
        }

        Self {
            data: builder.data,
            triangles: builder.triangles,
            rooms,
        }
    }

    /// Vertices referenced by [`Level::triangles`].
    pub fn vertices(&self) -> &[Point3<f32>] {
        &self.data.vertices
    }

    /// Middle of the corridor at half height.
    pub fn center(&self) -> Point3<f32> {
        Point3::new(self.rooms as f32 * ROOM_SIZE / 2.0, ROOM_HEIGHT / 2.0, 0.0)
    }
}

#[derive(Default)]
struct LevelBuilder {
    data: BspData,
    triangles: Vec<TriangleIndices>,
}

impl LevelBuilder {
    /// Adds the faces of one room, returning their indices.
    fn push_room(&mut self, room: usize, rooms: usize) -> Vec<u32> {
        let x0 = room as f32 * ROOM_SIZE;
        let x1 = x0 + ROOM_SIZE;
        let (z0, z1) = (-ROOM_SIZE / 2.0, ROOM_SIZE / 2.0);
        let h = ROOM_HEIGHT;
        let p = Point3::new;

        // Corners wind so that normals point into the room.
        let floor = [p(x0, 0.0, z0), p(x0, 0.0, z1), p(x1, 0.0, z1), p(x1, 0.0, z0)];
        let ceiling = [p(x0, h, z0), p(x1, h, z0), p(x1, h, z1), p(x0, h, z1)];
        let north = [p(x0, 0.0, z0), p(x1, 0.0, z0), p(x1, h, z0), p(x0, h, z0)];
        let south = [p(x0, 0.0, z1), p(x0, h, z1), p(x1, h, z1), p(x1, 0.0, z1)];
        let west = [p(x0, 0.0, z0), p(x0, h, z0), p(x0, h, z1), p(x0, 0.0, z1)];
        let east = [p(x1, 0.0, z0), p(x1, 0.0, z1), p(x1, h, z1), p(x1, h, z0)];

        let lightmap = self.push_floor_lightmap(room);
        let ceiling_info = if room % 3 == 2 { SKY } else { CEILING };

        let mut faces = vec![
            self.push_face(floor, FLOOR, Some(lightmap)),
            self.push_face(ceiling, ceiling_info, None),
            self.push_face(north, WALL, None),
            self.push_face(south, WALL, None),
        ];
        if room == 0 {
            faces.push(self.push_face(west, END_WALL, None));
        }
        if room + 1 == rooms {
            faces.push(self.push_face(east, END_WALL, None));
        }
        faces
    }

    /// Adds a quad with its own vertices, edges and plane.
    fn push_face(
        &mut self,
        corners: [Point3<f32>; 4],
        texture_info: u32,
        lightmap: Option<u32>,
    ) -> u32 {
        let first_vertex = self.data.vertices.len() as u32;
        self.data.vertices.extend(corners);

        let first_edge = self.data.face_edges.len() as u32;
        for i in 0..4 {
            let edge = self.data.edges.len() as u32;
            self.data.edges.push(Edge {
                points: [first_vertex + i, first_vertex + (i + 1) % 4],
            });
            self.data.face_edges.push(FaceEdge {
                edge,
                reversed: false,
            });
        }
        for i in 1..3 {
            self.triangles
                .push(TriangleIndices::new(first_vertex, first_vertex + i, first_vertex + i + 1));
        }

        let plane = self.data.planes.len() as u32;
        self.data
            .planes
            .push(Plane3D::from_three_points(corners[0], corners[1], corners[2]));

        let face = self.data.faces.len() as u32;
        self.data
            .faces
            .push(BspFace::new(plane, false, first_edge, 4, texture_info, lightmap));
        face
    }

    /// Appends a floor lightmap, bright in the middle of the room, and
    /// returns its offset.
    fn push_floor_lightmap(&mut self, room: usize) -> u32 {
        let offset = self.data.lightmap_data.len() as u32;
        let luxels = (ROOM_SIZE / LUXEL_SIZE) as usize + 1;
        let middle = (luxels - 1) as f32 / 2.0;
        let tint = [[1.0, 0.8, 0.6], [0.6, 0.8, 1.0], [0.8, 1.0, 0.7]][room % 3];

        for v in 0..luxels {
            for u in 0..luxels {
                let distance = ((u as f32 - middle).powi(2) + (v as f32 - middle).powi(2)).sqrt();
                let light = 40.0 + 100.0 * (1.0 - distance / (middle * 1.5)).max(0.0);
                self.data
                    .lightmap_data
                    .extend(tint.map(|channel: f32| (light * channel) as u8));
            }
        }
        offset
    }
}

fn texture_infos() -> Vec<TextureInfo> {
    let info = |texture: u32, axis_u: Vector3<f32>, axis_v: Vector3<f32>, flags| TextureInfo {
        axis_u,
        offset_u: 0.0,
        axis_v,
        offset_v: 0.0,
        flags,
        value: 0,
        texture: TextureHandle(texture + 1),
        width: 64,
        height: 64,
        next: None,
    };
    vec![
        info(FLOOR, Vector3::x(), Vector3::z(), SurfaceFlags::empty()),
        info(WALL, Vector3::x(), Vector3::y(), SurfaceFlags::empty()),
        info(END_WALL, Vector3::z(), Vector3::y(), SurfaceFlags::empty()),
        info(CEILING, Vector3::x(), Vector3::z(), SurfaceFlags::empty()),
        info(SKY, Vector3::x(), Vector3::z(), SurfaceFlags::SKY),
    ]
}

fn room_bounds(room: usize) -> BoundingBox {
    let x0 = room as f32 * ROOM_SIZE;
    BoundingBox::new(
        Point3::new(x0, 0.0, -ROOM_SIZE / 2.0),
        Point3::new(x0 + ROOM_SIZE, ROOM_HEIGHT, ROOM_SIZE / 2.0),
    )
}

fn room_pvs(room: usize, rooms: usize) -> Bitset {
    let mut pvs = Bitset::new(rooms);
    for other in room.saturating_sub(VISIBLE_RANGE)..(room + VISIBLE_RANGE + 1).min(rooms) {
        pvs.set(other);
    }
    pvs
}

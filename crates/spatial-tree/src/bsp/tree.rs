//! BSP world container, validation, point location and lightmap preparation.

use log::{debug, info, warn};
use nalgebra::{Point3, Vector2};

use crate::error::check_index;
use crate::{
    Bitset, LightmapAtlas, LightmapConfig, LightmapImage, Plane3D, Result, SpatialError,
};

use super::types::{
    BspData, BspFace, BspLeaf, BspNode, Child, Cluster, ClusterId, Edge, FaceEdge, SurfaceFlags,
    TextureInfo,
};

/// A level partitioned by a BSP tree, with per-cluster visibility.
///
/// # Construction
///
/// The world is built from [`BspData`] prepared by an importer.
/// [`Bsp::from_data`] checks every cross reference once, so queries never
/// index out of bounds. [`Bsp::init`] then computes texture extents and
/// uploads face lightmaps to a [`LightmapAtlas`]:
///
/// ```ignore
/// let mut bsp = Bsp::from_data(data)?;
/// bsp.init(&mut atlas)?;
/// ```
///
/// # Queries
///
/// - [`Bsp::find_leaf_containing`]: walks the planes down to a leaf
/// - [`Bsp::is_potentially_visible`]: reads a cluster's PVS row
/// - [`Bsp::render`]: emits every visible face into a [`crate::DrawSink`]
#[derive(Debug, Clone)]
pub struct Bsp {
    pub(super) vertices: Vec<Point3<f32>>,
    pub(super) edges: Vec<Edge>,
    pub(super) face_edges: Vec<FaceEdge>,
    pub(super) planes: Vec<Plane3D>,
    pub(super) nodes: Vec<BspNode>,
    pub(super) leaves: Vec<BspLeaf>,
    pub(super) leaf_faces: Vec<u32>,
    pub(super) faces: Vec<BspFace>,
    pub(super) clusters: Vec<Cluster>,
    pub(super) texture_info: Vec<TextureInfo>,
    pub(super) lightmap_data: Vec<u8>,
    pub(super) lightmap_config: LightmapConfig,
    /// Faces already emitted during the current render pass.
    pub(super) faces_drawn: Bitset,
    /// Last valid cluster the camera was found in.
    pub(super) current_cluster: ClusterId,
}

impl Bsp {
    /// Validates importer output and takes ownership of it.
    ///
    /// Fails on the first index that points outside its target array, on a
    /// PVS row whose length differs from the cluster count, and on node
    /// links that revisit a node.
    pub fn from_data(data: BspData) -> Result<Self> {
        validate(&data)?;

        let face_count = data.faces.len();
        debug!(
            "BSP loaded: {} nodes, {} leaves, {} faces, {} clusters",
            data.nodes.len(),
            data.leaves.len(),
            face_count,
            data.clusters.len()
        );

        Ok(Self {
            vertices: data.vertices,
            edges: data.edges,
            face_edges: data.face_edges,
            planes: data.planes,
            nodes: data.nodes,
            leaves: data.leaves,
            leaf_faces: data.leaf_faces,
            faces: data.faces,
            clusters: data.clusters,
            texture_info: data.texture_info,
            lightmap_data: data.lightmap_data,
            lightmap_config: LightmapConfig::default(),
            faces_drawn: Bitset::new(face_count),
            current_cluster: ClusterId::NOT_VISIBLE,
        })
    }

    /// Prepares faces for rendering with the default [`LightmapConfig`].
    pub fn init<A: LightmapAtlas + ?Sized>(&mut self, atlas: &mut A) -> Result<()> {
        self.init_with(atlas, &LightmapConfig::default())
    }

    /// Computes each face's texture extent, then gamma-corrects its lightmap
    /// and inserts it into `atlas`.
    ///
    /// Sky, warped and translucent faces and faces without edges get neither
    /// extent nor lightmap. Faces without lightmap data are valid and render
    /// with their base texture only. Faces whose snapped texture bounds do not
    /// fit in `i32` are left unlit.
    ///
    /// On error the world and the atlas are left untouched, so a failed
    /// reinitialization keeps the previous lightmaps.
    pub fn init_with<A: LightmapAtlas + ?Sized>(
        &mut self,
        atlas: &mut A,
        config: &LightmapConfig,
    ) -> Result<()> {
        let luxel = config.luxel_size.max(1);
        let mut pending = Vec::new();
        let mut unlit = 0;
        let mut empty = 0;
        let mut oversized = 0;

        for index in 0..self.faces.len() {
            let face = &self.faces[index];
            let flags = self.texture_info[face.texture_info as usize].flags;
            if face.edge_count == 0 {
                empty += 1;
                continue;
            }
            if flags.intersects(SurfaceFlags::UNLIT) {
                unlit += 1;
                continue;
            }

            let Some((texture_min, extent)) = self.texture_extent(face, luxel) else {
                oversized += 1;
                pending.push((index, Vector2::zeros(), Vector2::zeros(), None));
                continue;
            };
            let image = match face.lightmap_offset {
                Some(offset) => Some(self.read_lightmap(index, offset as usize, extent, luxel)?),
                None => None,
            };
            pending.push((index, texture_min, extent, image));
        }

        atlas.begin_packing();
        let mut packed = 0;
        for (index, texture_min, extent, image) in pending {
            let slot = image.and_then(|mut image| {
                image.apply_gamma(config.gamma);
                atlas.insert_image(&image)
            });
            packed += usize::from(slot.is_some());

            let face = &mut self.faces[index];
            face.texture_min = texture_min;
            face.extent = extent;
            face.lightmap = slot;
        }
        atlas.end_packing();

        self.lightmap_config = *config;
        if empty > 0 {
            warn!("BSP has {} faces without edges, skipped", empty);
        }
        if oversized > 0 {
            warn!("BSP has {} faces with texture bounds out of range, left unlit", oversized);
        }
        info!(
            "BSP lightmaps packed: {} of {} faces ({} unlit)",
            packed,
            self.faces.len(),
            unlit
        );
        Ok(())
    }

    /// Returns the index of the leaf containing `point`.
    ///
    /// Points exactly on a splitting plane go to its front side. Fails with
    /// [`SpatialError::EmptyTree`] when the world has no nodes.
    pub fn find_leaf_containing(&self, point: Point3<f32>) -> Result<usize> {
        if self.nodes.is_empty() {
            return Err(SpatialError::EmptyTree);
        }

        let mut child = Child::Node(0);
        loop {
            match child {
                Child::Leaf(leaf) => return Ok(leaf as usize),
                Child::Node(index) => {
                    let node = &self.nodes[index as usize];
                    let distance = self.planes[node.plane as usize].signed_distance(point);
                    child = if distance >= 0.0 { node.front } else { node.back };
                }
            }
        }
    }

    /// Returns `true` if `test` may be seen from `from`.
    ///
    /// From [`ClusterId::NOT_VISIBLE`] everything may be visible; nothing
    /// sees into [`ClusterId::NOT_VISIBLE`].
    pub fn is_potentially_visible(&self, from: ClusterId, test: ClusterId) -> Result<bool> {
        let Some(from) = from.index() else {
            return Ok(true);
        };
        let Some(test) = test.index() else {
            return Ok(false);
        };

        let row = &self.clusters[check_index("cluster", from, self.clusters.len())?].pvs;
        check_index("cluster", test, self.clusters.len())?;
        Ok(row.get(test))
    }

    /// Iterates over the indices of the leaves potentially visible from `from`.
    pub fn visible_leaves(&self, from: ClusterId) -> impl Iterator<Item = usize> + '_ {
        self.leaves
            .iter()
            .enumerate()
            .filter(move |(_, leaf)| {
                self.is_potentially_visible(from, leaf.cluster)
                    .unwrap_or(false)
            })
            .map(|(index, _)| index)
    }

    /// Iterates over the corners of face `index`, in edge-loop order.
    pub fn face_vertices(&self, index: usize) -> Result<impl Iterator<Item = Point3<f32>> + '_> {
        let face = &self.faces[check_index("face", index, self.faces.len())?];
        Ok(self.face_points(face))
    }

    /// Cluster the camera was last found in; kept while the camera is outside
    /// every cluster.
    #[inline]
    pub fn current_cluster(&self) -> ClusterId {
        self.current_cluster
    }

    /// Returns the leaf at `index`.
    pub fn leaf(&self, index: usize) -> Result<&BspLeaf> {
        Ok(&self.leaves[check_index("leaf", index, self.leaves.len())?])
    }

    /// Returns the face at `index`.
    pub fn face(&self, index: usize) -> Result<&BspFace> {
        Ok(&self.faces[check_index("face", index, self.faces.len())?])
    }

    /// Returns all leaves.
    #[inline]
    pub fn leaves(&self) -> &[BspLeaf] {
        &self.leaves
    }

    /// Returns all faces.
    #[inline]
    pub fn faces(&self) -> &[BspFace] {
        &self.faces
    }

    /// Returns all nodes; the root is at index 0.
    #[inline]
    pub fn nodes(&self) -> &[BspNode] {
        &self.nodes
    }

    /// Returns all planes.
    #[inline]
    pub fn planes(&self) -> &[Plane3D] {
        &self.planes
    }

    /// Returns all clusters.
    #[inline]
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Returns all texture infos.
    #[inline]
    pub fn texture_info(&self) -> &[TextureInfo] {
        &self.texture_info
    }

    pub(super) fn face_points<'a>(
        &'a self,
        face: &BspFace,
    ) -> impl Iterator<Item = Point3<f32>> + 'a {
        let first = face.first_edge as usize;
        let edges = &self.face_edges[first..first + face.edge_count as usize];
        edges.iter().map(|face_edge| {
            let edge = &self.edges[face_edge.edge as usize];
            self.vertices[edge.start(face_edge.reversed) as usize]
        })
    }

    /// Texture-space bounds of a face snapped out to the luxel grid, as
    /// `(minimum, extent)`. `None` if they do not fit in `i32`.
    fn texture_extent(&self, face: &BspFace, luxel: u32) -> Option<(Vector2<i32>, Vector2<i32>)> {
        let info = &self.texture_info[face.texture_info as usize];
        let mut min = Vector2::repeat(f32::MAX);
        let mut max = Vector2::repeat(f32::MIN);
        for point in self.face_points(face) {
            let st = info.project(point);
            min = min.inf(&st);
            max = max.sup(&st);
        }

        let snap = |min: f32, max: f32| -> Option<(i32, i32)> {
            let luxel_f = luxel as f32;
            let (low, high) = ((min / luxel_f).floor(), (max / luxel_f).ceil());
            // Float to int casts saturate, so check the range first.
            if !(low >= i32::MIN as f32 && high < i32::MAX as f32) {
                return None;
            }
            let luxel = i32::try_from(luxel).ok()?;
            let texture_min = (low as i32).checked_mul(luxel)?;
            let extent = (high as i32).checked_sub(low as i32)?.checked_mul(luxel)?;
            Some((texture_min, extent))
        };

        let (min_u, extent_u) = snap(min.x, max.x)?;
        let (min_v, extent_v) = snap(min.y, max.y)?;
        Some((Vector2::new(min_u, min_v), Vector2::new(extent_u, extent_v)))
    }

    fn read_lightmap(
        &self,
        face: usize,
        offset: usize,
        extent: Vector2<i32>,
        luxel: u32,
    ) -> Result<LightmapImage> {
        let luxel = luxel as i32;
        let width = (extent.x / luxel + 1) as u32;
        let height = (extent.y / luxel + 1) as u32;
        let len = LightmapImage::byte_len(width, height);

        let out_of_range = || SpatialError::LightmapOutOfRange {
            face,
            offset,
            len: self.lightmap_data.len(),
        };
        let end = offset.checked_add(len).ok_or_else(out_of_range)?;
        let bytes = self.lightmap_data.get(offset..end).ok_or_else(out_of_range)?;
        LightmapImage::new(width, height, bytes.to_vec()).ok_or_else(out_of_range)
    }
}

/// Checks that `first..first + count` lies within an array of `len` elements.
fn check_range(kind: &'static str, first: u32, count: u32, len: usize) -> Result<()> {
    let first = first as usize;
    let end = first + count as usize;
    if end <= len {
        Ok(())
    } else {
        Err(SpatialError::out_of_range(kind, (end - 1).max(first), len))
    }
}

fn check_child(child: Child, data: &BspData) -> Result<()> {
    let checked = match child {
        Child::Node(index) => check_index("node", index as usize, data.nodes.len()),
        Child::Leaf(index) => check_index("leaf", index as usize, data.leaves.len()),
    };
    checked.map(|_| ())
}

fn validate(data: &BspData) -> Result<()> {
    for edge in &data.edges {
        for &point in &edge.points {
            check_index("vertex", point as usize, data.vertices.len())?;
        }
    }
    for face_edge in &data.face_edges {
        check_index("edge", face_edge.edge as usize, data.edges.len())?;
    }
    for info in &data.texture_info {
        if let Some(next) = info.next {
            check_index("texture info", next as usize, data.texture_info.len())?;
        }
    }
    for face in &data.faces {
        check_index("plane", face.plane as usize, data.planes.len())?;
        check_index("texture info", face.texture_info as usize, data.texture_info.len())?;
        check_range("face edge", face.first_edge, face.edge_count, data.face_edges.len())?;
    }
    for &face in &data.leaf_faces {
        check_index("face", face as usize, data.faces.len())?;
    }
    for leaf in &data.leaves {
        if let Some(cluster) = leaf.cluster.index() {
            check_index("cluster", cluster, data.clusters.len())?;
        }
        check_range("leaf face", leaf.first_face, leaf.face_count, data.leaf_faces.len())?;
    }
    for node in &data.nodes {
        check_index("plane", node.plane as usize, data.planes.len())?;
        check_child(node.front, data)?;
        check_child(node.back, data)?;
    }
    for (index, cluster) in data.clusters.iter().enumerate() {
        if cluster.pvs.len() != data.clusters.len() {
            return Err(SpatialError::InvalidPvs {
                cluster: index,
                reason: "row length differs from the cluster count",
            });
        }
    }
    validate_links(data)
}

/// Ensures the nodes reachable from the root form a tree, so descents end.
fn validate_links(data: &BspData) -> Result<()> {
    if data.nodes.is_empty() {
        return Ok(());
    }

    let mut visited = vec![false; data.nodes.len()];
    let mut stack = vec![0_usize];
    while let Some(index) = stack.pop() {
        if std::mem::replace(&mut visited[index], true) {
            return Err(SpatialError::MalformedTree { node: index });
        }
        let node = &data.nodes[index];
        for child in [node.front, node.back] {
            if let Child::Node(next) = child {
                stack.push(next as usize);
            }
        }
    }
    Ok(())
}

//! Visible-face traversal.

use log::{trace, warn};
use nalgebra::{Matrix4, Point3, Vector2};

use crate::{DrawSink, Frustum, LightmapAtlas, Primitive, TextureStage};

use super::tree::Bsp;
use super::types::{BspFace, ClusterId, SurfaceFlags};

/// Camera state for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct View {
    /// Eye position in world space.
    pub position: Point3<f32>,
    /// Projection matrix (OpenGL clip-space conventions).
    pub projection: Matrix4<f32>,
    /// World-to-eye matrix.
    pub view: Matrix4<f32>,
}

/// What one [`Bsp::render`] call drew.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Leaves that passed the PVS and frustum tests.
    pub visible_leaves: usize,
    /// Faces emitted to the sink.
    pub visible_faces: usize,
}

/// Tracks the lightmap page bound to [`TextureStage::Lightmap`].
#[derive(Debug, Default)]
struct BindCache {
    lightmap_page: Option<u32>,
}

impl BindCache {
    fn bind_lightmap<A, S>(&mut self, page: Option<u32>, atlas: &A, sink: &mut S)
    where
        A: LightmapAtlas + ?Sized,
        S: DrawSink + ?Sized,
    {
        if page == self.lightmap_page {
            return;
        }
        match page {
            Some(page) => sink.bind_texture(TextureStage::Lightmap, atlas.texture(page)),
            None => sink.unbind_texture(TextureStage::Lightmap),
        }
        self.lightmap_page = page;
    }
}

impl Bsp {
    /// Emits every face potentially visible from `view` into `sink`.
    ///
    /// The camera's leaf picks the PVS row. When the camera is outside every
    /// cluster the last valid cluster is kept, so clipping into a wall does
    /// not blank the screen. Leaves then go through the frustum, and each of
    /// their faces is drawn as a triangle fan at most once per call. Sky faces
    /// are left to a separate sky pass. Matrices that give no usable frustum
    /// leave the PVS as the only culling step.
    ///
    /// Both texture stages are unbound on return.
    pub fn render<A, S>(&mut self, view: &View, atlas: &A, sink: &mut S) -> RenderStats
    where
        A: LightmapAtlas + ?Sized,
        S: DrawSink + ?Sized,
    {
        let camera_cluster = self
            .find_leaf_containing(view.position)
            .map_or(ClusterId::NOT_VISIBLE, |leaf| self.leaves[leaf].cluster);
        if camera_cluster.is_visible() {
            self.current_cluster = camera_cluster;
        }

        let frustum = Frustum::try_from_matrices(&view.projection, &view.view);
        if frustum.is_none() {
            warn!("degenerate view matrices, drawing without frustum culling");
        }
        let mut drawn = std::mem::take(&mut self.faces_drawn);
        drawn.clear_all();

        let mut cache = BindCache::default();
        let mut stats = RenderStats::default();
        for leaf in self.leaves.iter().rev() {
            if !self
                .is_potentially_visible(self.current_cluster, leaf.cluster)
                .unwrap_or(false)
            {
                continue;
            }
            if frustum
                .as_ref()
                .is_some_and(|frustum| !frustum.intersects_box(&leaf.bounds))
            {
                continue;
            }
            stats.visible_leaves += 1;

            let first = leaf.first_face as usize;
            let slots = &self.leaf_faces[first..first + leaf.face_count as usize];
            for &face_index in slots.iter().rev() {
                let face_index = face_index as usize;
                if drawn.get(face_index) {
                    continue;
                }
                drawn.set(face_index);

                let face = &self.faces[face_index];
                if face.edge_count == 0 {
                    continue;
                }
                if self.texture_info[face.texture_info as usize]
                    .flags
                    .contains(SurfaceFlags::SKY)
                {
                    continue;
                }

                self.emit_face(face, atlas, &mut cache, sink);
                stats.visible_faces += 1;
            }
        }

        sink.unbind_texture(TextureStage::Base);
        sink.unbind_texture(TextureStage::Lightmap);
        self.faces_drawn = drawn;

        trace!(
            "BSP render from cluster {:?}: {} leaves, {} faces",
            self.current_cluster, stats.visible_leaves, stats.visible_faces
        );
        stats
    }

    fn emit_face<A, S>(&self, face: &BspFace, atlas: &A, cache: &mut BindCache, sink: &mut S)
    where
        A: LightmapAtlas + ?Sized,
        S: DrawSink + ?Sized,
    {
        let info = &self.texture_info[face.texture_info as usize];
        sink.bind_texture(TextureStage::Base, info.texture);
        cache.bind_lightmap(face.lightmap.map(|slot| slot.page), atlas, sink);

        let plane = self.planes[face.plane as usize];
        let plane = if face.plane_side { plane.flipped() } else { plane };

        let texel = Vector2::new(info.width.max(1) as f32, info.height.max(1) as f32);
        let luxel = self.lightmap_config.luxel_size.max(1) as f32;
        let page_span = atlas.page_size().max(1) as f32 * luxel;

        sink.begin(Primitive::TriangleFan);
        sink.normal(plane.normal());
        for point in self.face_points(face) {
            let st = info.project(point);
            sink.uv(TextureStage::Base, st.component_div(&texel));

            if let Some(slot) = face.lightmap {
                let slot_offset = Vector2::new(slot.offset_u as f32, slot.offset_v as f32) * luxel;
                let local = st + slot_offset - face.texture_min.cast::<f32>();
                // Sample luxel centers.
                let uv = local.add_scalar(luxel / 2.0) / page_span;
                sink.uv(TextureStage::Lightmap, uv);
            }
            sink.vertex(point);
        }
        sink.end();
    }
}

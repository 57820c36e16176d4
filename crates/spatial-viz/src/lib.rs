//! Shared visualization utilities for the level viewer.

use macroquad::models::{Mesh, Vertex, draw_mesh};
use macroquad::prelude::*;
use nalgebra::{Matrix4, Point3, Vector2, Vector3};
use spatial_tree::{
    AtlasSlot, BoundingBox, DrawSink, LightmapAtlas, LightmapImage, Primitive, TextureHandle,
    TextureStage,
};

pub mod level;
pub use level::Level;

/// Texture handles from this value up name lightmap atlas pages.
pub const LIGHTMAP_TEXTURES: u32 = 1000;

// Camera3D defaults, mirrored for frustum extraction.
const FOVY: f32 = std::f32::consts::FRAC_PI_4;
const Z_NEAR: f32 = 0.01;
const Z_FAR: f32 = 10000.0;

/// Flat color standing in for a base texture.
pub fn texture_color(texture: TextureHandle) -> Color {
    const PALETTE: [Color; 6] = [
        Color::new(0.8, 0.8, 0.8, 1.0),
        Color::new(0.75, 0.65, 0.5, 1.0),
        Color::new(0.55, 0.6, 0.7, 1.0),
        Color::new(0.7, 0.5, 0.5, 1.0),
        Color::new(0.6, 0.7, 0.6, 1.0),
        Color::new(0.4, 0.6, 0.9, 1.0),
    ];
    PALETTE[texture.0 as usize % PALETTE.len()]
}

fn to_vec3(point: Point3<f32>) -> Vec3 {
    vec3(point.x, point.y, point.z)
}

/// Draws the edges of a box.
pub fn draw_bounds(bounds: &BoundingBox, color: Color) {
    let center = bounds.center();
    let size = bounds.half_extents() * 2.0;
    draw_cube_wires(to_vec3(center), vec3(size.x, size.y, size.z), color);
}

/// Lightmap atlas keeping its pages in memory, filled shelf by shelf.
pub struct ShelfAtlas {
    page_size: u32,
    pages: Vec<Vec<u8>>,
    cursor_u: u32,
    cursor_v: u32,
    shelf_height: u32,
}

impl ShelfAtlas {
    /// Creates an atlas of square pages `page_size` luxels wide.
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size,
            pages: Vec::new(),
            cursor_u: 0,
            cursor_v: 0,
            shelf_height: 0,
        }
    }

    /// Number of pages in use.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Reads the luxel under an atlas coordinate in `[0, 1]`.
    pub fn sample(&self, page: u32, uv: Vector2<f32>) -> Option<[u8; 3]> {
        let data = self.pages.get(page as usize)?;
        let size = self.page_size as f32;
        let max = self.page_size.saturating_sub(1) as f32;
        let u = (uv.x * size).floor().clamp(0.0, max) as usize;
        let v = (uv.y * size).floor().clamp(0.0, max) as usize;
        let offset = (v * self.page_size as usize + u) * 3;
        Some([data[offset], data[offset + 1], data[offset + 2]])
    }

    fn new_page(&mut self) {
        let side = self.page_size as usize;
        self.pages.push(vec![0; side * side * 3]);
        self.cursor_u = 0;
        self.cursor_v = 0;
        self.shelf_height = 0;
    }
}

impl LightmapAtlas for ShelfAtlas {
    fn begin_packing(&mut self) {
        self.pages.clear();
        self.new_page();
    }

    fn insert_image(&mut self, image: &LightmapImage) -> Option<AtlasSlot> {
        let (width, height) = (image.width(), image.height());
        if width > self.page_size || height > self.page_size {
            return None;
        }
        if self.pages.is_empty() {
            self.new_page();
        }
        if self.cursor_u + width > self.page_size {
            self.cursor_u = 0;
            self.cursor_v += self.shelf_height;
            self.shelf_height = 0;
        }
        if self.cursor_v + height > self.page_size {
            self.new_page();
        }

        let side = self.page_size as usize;
        let row_bytes = width as usize * 3;
        let page = self.pages.len() - 1;
        for (row, source) in image.data().chunks_exact(row_bytes).enumerate() {
            let start = ((self.cursor_v as usize + row) * side + self.cursor_u as usize) * 3;
            self.pages[page][start..start + row_bytes].copy_from_slice(source);
        }

        let slot = AtlasSlot {
            page: page as u32,
            offset_u: self.cursor_u,
            offset_v: self.cursor_v,
        };
        self.cursor_u += width;
        self.shelf_height = self.shelf_height.max(height);
        Some(slot)
    }

    fn texture(&self, page: u32) -> TextureHandle {
        TextureHandle(LIGHTMAP_TEXTURES + page)
    }

    fn page_size(&self) -> u32 {
        self.page_size
    }
}

/// [`DrawSink`] that turns each primitive batch into a macroquad mesh.
///
/// Base textures map to flat colors; the bound lightmap page is sampled from
/// the atlas per vertex and modulates that color.
pub struct MeshSink<'a> {
    atlas: &'a ShelfAtlas,
    base: Option<TextureHandle>,
    lightmap_page: Option<u32>,
    primitive: Option<Primitive>,
    normal: Vector3<f32>,
    lightmap_uv: Option<Vector2<f32>>,
    vertices: Vec<Vertex>,
    /// Batches flushed since creation.
    pub batches: usize,
}

impl<'a> MeshSink<'a> {
    pub fn new(atlas: &'a ShelfAtlas) -> Self {
        Self {
            atlas,
            base: None,
            lightmap_page: None,
            primitive: None,
            normal: Vector3::y(),
            lightmap_uv: None,
            vertices: Vec::new(),
            batches: 0,
        }
    }

    fn vertex_color(&self) -> Color {
        let base = self.base.map_or(WHITE, texture_color);
        // Fixed light from above, so walls read apart from floors.
        let shade = 0.6 + 0.4 * self.normal.dot(&Vector3::new(0.3, 0.9, 0.3).normalize()).abs();
        let light = match (self.lightmap_page, self.lightmap_uv) {
            (Some(page), Some(uv)) => self
                .atlas
                .sample(page, uv)
                .map_or([1.0; 3], |rgb| rgb.map(|c| f32::from(c) / 255.0)),
            _ => [0.8; 3],
        };
        Color::new(
            base.r * shade * light[0],
            base.g * shade * light[1],
            base.b * shade * light[2],
            1.0,
        )
    }

    fn flush(&mut self, primitive: Primitive) {
        let vertices = std::mem::take(&mut self.vertices);
        let count = vertices.len() as u16;
        let indices: Vec<u16> = match primitive {
            Primitive::TriangleFan => (1..count.saturating_sub(1))
                .flat_map(|i| [0, i, i + 1])
                .collect(),
            Primitive::Triangles => (0..count - count % 3).collect(),
            Primitive::Lines => {
                for pair in vertices.chunks_exact(2) {
                    let [r, g, b, a] = pair[0].color;
                    draw_line_3d(pair[0].position, pair[1].position, Color::from_rgba(r, g, b, a));
                }
                self.batches += 1;
                return;
            }
        };
        if indices.is_empty() {
            return;
        }

        draw_mesh(&Mesh {
            vertices,
            indices,
            texture: None,
        });
        self.batches += 1;
    }
}

impl DrawSink for MeshSink<'_> {
    fn begin(&mut self, primitive: Primitive) {
        self.primitive = Some(primitive);
        self.vertices.clear();
    }

    fn end(&mut self) {
        if let Some(primitive) = self.primitive.take() {
            self.flush(primitive);
        }
    }

    fn normal(&mut self, normal: Vector3<f32>) {
        self.normal = normal;
    }

    fn uv(&mut self, stage: TextureStage, uv: Vector2<f32>) {
        if stage == TextureStage::Lightmap {
            self.lightmap_uv = Some(uv);
        }
    }

    fn vertex(&mut self, position: Point3<f32>) {
        let color = self.vertex_color();
        self.vertices
            .push(Vertex::new2(to_vec3(position), vec2(0.0, 0.0), color));
        self.lightmap_uv = None;
    }

    fn bind_texture(&mut self, stage: TextureStage, texture: TextureHandle) {
        match stage {
            TextureStage::Base => self.base = Some(texture),
            TextureStage::Lightmap => {
                self.lightmap_page = texture.0.checked_sub(LIGHTMAP_TEXTURES);
            }
        }
    }

    fn unbind_texture(&mut self, stage: TextureStage) {
        match stage {
            TextureStage::Base => self.base = None,
            TextureStage::Lightmap => self.lightmap_page = None,
        }
    }
}

/// Simple orbit camera for 3D scene navigation.
pub struct OrbitCamera {
    pub distance: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub target: Vec3,
    /// Multiplier for scroll wheel zoom
    pub zoom_speed: f32,
    /// Minimum distance from target
    pub min_distance: f32,
    /// Maximum distance from target
    pub max_distance: f32,
}

impl OrbitCamera {
    /// Creates a new orbit camera with the given configuration.
    pub fn new(distance: f32, yaw: f32, pitch: f32) -> Self {
        Self {
            distance,
            yaw,
            pitch,
            target: vec3(0.0, 0.0, 0.0),
            zoom_speed: 5.0,
            min_distance: 10.0,
            max_distance: 200.0,
        }
    }

    /// Sets the zoom configuration (speed and distance limits).
    pub fn with_zoom(mut self, speed: f32, min: f32, max: f32) -> Self {
        self.zoom_speed = speed;
        self.min_distance = min;
        self.max_distance = max;
        self
    }

    /// Sets the camera target point.
    pub fn with_target(mut self, target: Vec3) -> Self {
        self.target = target;
        self
    }

    /// Updates camera state from user input (mouse drag, scroll, arrow keys,
    /// A/D to slide the target along x).
    pub fn update(&mut self) {
        if is_mouse_button_down(MouseButton::Left) {
            let delta = mouse_delta_position();
            self.yaw -= delta.x * 2.0;
            self.pitch -= delta.y * 2.0;
        }

        // Clamp pitch to avoid gimbal lock
        self.pitch = self.pitch.clamp(-1.5, 1.5);

        let scroll = mouse_wheel().1;
        self.distance -= scroll * self.zoom_speed;
        self.distance = self.distance.clamp(self.min_distance, self.max_distance);

        if is_key_down(KeyCode::Left) {
            self.yaw += 0.02;
        }
        if is_key_down(KeyCode::Right) {
            self.yaw -= 0.02;
        }
        if is_key_down(KeyCode::Up) {
            self.pitch += 0.02;
        }
        if is_key_down(KeyCode::Down) {
            self.pitch -= 0.02;
        }
        if is_key_down(KeyCode::A) {
            self.target.x -= 2.0;
        }
        if is_key_down(KeyCode::D) {
            self.target.x += 2.0;
        }
    }

    /// Returns the camera's world position.
    pub fn position(&self) -> Vec3 {
        let x = self.distance * self.pitch.cos() * self.yaw.sin();
        let y = self.distance * self.pitch.sin();
        let z = self.distance * self.pitch.cos() * self.yaw.cos();
        self.target + vec3(x, y, z)
    }

    /// Converts to macroquad's Camera3D for rendering.
    pub fn to_camera3d(&self) -> Camera3D {
        Camera3D {
            position: self.position(),
            up: vec3(0.0, 1.0, 0.0),
            target: self.target,
            fovy: FOVY,
            ..Default::default()
        }
    }

    /// Returns the eye point as a nalgebra Point3 for BSP queries.
    pub fn eye_point(&self) -> Point3<f32> {
        let pos = self.position();
        Point3::new(pos.x, pos.y, pos.z)
    }

    /// World-to-eye matrix matching [`OrbitCamera::to_camera3d`].
    pub fn view_matrix(&self) -> Matrix4<f32> {
        let t = self.target;
        Matrix4::look_at_rh(&self.eye_point(), &Point3::new(t.x, t.y, t.z), &Vector3::y())
    }

    /// Projection matrix matching [`OrbitCamera::to_camera3d`] for the given
    /// aspect ratio.
    ///
    /// A zero or non-finite aspect (a minimized window) falls back to square.
    pub fn projection_matrix(&self, aspect: f32) -> Matrix4<f32> {
        let aspect = if aspect.is_finite() && aspect > f32::EPSILON { aspect } else { 1.0 };
        Matrix4::new_perspective(aspect, FOVY, Z_NEAR, Z_FAR)
    }
}

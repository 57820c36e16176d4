//! The drawing surface BSP traversal emits geometry into.
//!
//! The crate never talks to a graphics API. A renderer implements
//! [`DrawSink`] and receives immediate-mode style calls: bind textures, begin
//! a primitive batch, then per vertex the normal, texture coordinates and
//! position.

use nalgebra::{Point3, Vector2, Vector3};

/// Opaque handle to a texture owned by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureHandle(pub u32);

/// Texture units used by level rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureStage {
    /// The surface's own texture.
    Base = 0,
    /// The lightmap atlas page modulating it.
    Lightmap = 1,
}

/// Kind of primitive batch opened by [`DrawSink::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    /// Convex polygon: vertex 0 is shared by every triangle.
    TriangleFan,
    /// Independent triangles, three vertices each.
    Triangles,
    /// Independent line segments, two vertices each.
    Lines,
}

/// Receiver of draw calls.
///
/// Between [`begin`](DrawSink::begin) and [`end`](DrawSink::end), attributes
/// set by [`normal`](DrawSink::normal) and [`uv`](DrawSink::uv) apply to the
/// following [`vertex`](DrawSink::vertex) calls until changed.
pub trait DrawSink {
    /// Opens a batch of primitives.
    fn begin(&mut self, primitive: Primitive);

    /// Closes the current batch.
    fn end(&mut self);

    /// Sets the current normal.
    fn normal(&mut self, normal: Vector3<f32>);

    /// Sets the current texture coordinate of a stage.
    fn uv(&mut self, stage: TextureStage, uv: Vector2<f32>);

    /// Emits a vertex with the current attributes.
    fn vertex(&mut self, position: Point3<f32>);

    /// Binds a texture to a stage.
    fn bind_texture(&mut self, stage: TextureStage, texture: TextureHandle);

    /// Leaves a stage without texture.
    fn unbind_texture(&mut self, stage: TextureStage);
}

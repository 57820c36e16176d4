//! Plane representation shared by the BSP world and the view frustum.

use nalgebra::{Point3, Vector3};

/// A plane in 3D space, represented as `normal · point = offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane3D {
    normal: Vector3<f32>,
    offset: f32,
}

impl Plane3D {
    /// Builds a plane from a normal and an offset, scaling both so the
    /// normal has unit length.
    ///
    /// # Panics
    /// Panics if `normal` is zero.
    pub fn new(normal: Vector3<f32>, offset: f32) -> Self {
        match Self::try_new(normal, offset) {
            Some(plane) => plane,
            None => panic!("plane normal must be finite and non-zero, got {normal:?}"),
        }
    }

    /// Like [`Plane3D::new`], but returns `None` for a zero or non-finite
    /// normal or offset.
    ///
    /// Use this for planes coming from external data.
    pub fn try_new(normal: Vector3<f32>, offset: f32) -> Option<Self> {
        let norm = normal.norm();
        let valid = norm.is_finite() && offset.is_finite() && norm > f32::EPSILON;
        valid.then(|| Self {
            normal: normal / norm,
            offset: offset / norm,
        })
    }

    /// Plane through `a`, `b` and `c`, facing along `(b - a) × (c - a)`.
    ///
    /// # Panics
    /// Panics if the points are collinear.
    pub fn from_three_points(a: Point3<f32>, b: Point3<f32>, c: Point3<f32>) -> Self {
        let normal = (b - a).cross(&(c - a));
        Self::new(normal, normal.dot(&a.coords))
    }

    #[inline]
    pub fn normal(&self) -> Vector3<f32> {
        self.normal
    }

    /// Distance of the plane from the origin, along [`Plane3D::normal`].
    #[inline]
    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Positive in front of the plane, negative behind it.
    #[inline]
    pub fn signed_distance(&self, point: Point3<f32>) -> f32 {
        self.normal.dot(&point.coords) - self.offset
    }

    /// The same plane facing the other way.
    #[inline]
    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            offset: -self.offset,
        }
    }
}

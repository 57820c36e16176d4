//! Rays, segments and their intersection tests.

use nalgebra::{Point3, Vector3};

use crate::BoundingBox;

/// Determinant below which a ray is considered parallel to a triangle.
pub const TRIANGLE_EPSILON: f32 = 1e-6;

/// Margin added around boxes in [`Ray3::intersects_box`].
///
/// Keeps the box test conservative against rounding, so a ray that hits a
/// triangle is never rejected by the box enclosing it.
pub const BOX_EPSILON: f32 = 1e-4;

/// Direction components smaller than this are treated as zero by the slab test.
const PARALLEL_EPSILON: f32 = 1e-12;

/// A ray `origin + t * direction` with `t` in `[0, max_toi]`.
///
/// [`Ray3::new`] builds a half-line (`max_toi = +inf`), [`Ray3::segment`]
/// a line segment (`max_toi = 1`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray3 {
    origin: Point3<f32>,
    direction: Vector3<f32>,
    inv_direction: Vector3<f32>,
    max_toi: f32,
}

impl Ray3 {
    /// Creates a half-line starting at `origin`.
    ///
    /// The direction does not need to be normalized.
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Self {
        Self::with_max_toi(origin, direction, f32::INFINITY)
    }

    /// Creates the segment going from `start` to `end`.
    pub fn segment(start: Point3<f32>, end: Point3<f32>) -> Self {
        Self::with_max_toi(start, end - start, 1.0)
    }

    /// Creates a ray whose parameter is limited to `[0, max_toi]`.
    pub fn with_max_toi(origin: Point3<f32>, direction: Vector3<f32>, max_toi: f32) -> Self {
        Self {
            origin,
            direction,
            inv_direction: direction.map(|d| 1.0 / d),
            max_toi,
        }
    }

    /// Returns the origin of the ray.
    #[inline]
    pub fn origin(&self) -> Point3<f32> {
        self.origin
    }

    /// Returns the (unnormalized) direction of the ray.
    #[inline]
    pub fn direction(&self) -> Vector3<f32> {
        self.direction
    }

    /// Returns the largest accepted ray parameter.
    #[inline]
    pub fn max_toi(&self) -> f32 {
        self.max_toi
    }

    /// Returns the point at parameter `t`.
    #[inline]
    pub fn point_at(&self, t: f32) -> Point3<f32> {
        self.origin + self.direction * t
    }

    /// Slab test against a box.
    ///
    /// The box is inflated by [`BOX_EPSILON`], so the test may report hits a
    /// hair outside the box but never misses a point on it.
    pub fn intersects_box(&self, bounds: &BoundingBox) -> bool {
        if bounds.is_empty() {
            return false;
        }

        let bounds = bounds.inflated(BOX_EPSILON);
        let (min, max) = (bounds.min(), bounds.max());
        let mut t_near = 0.0_f32;
        let mut t_far = self.max_toi;

        for axis in 0..3 {
            let origin = self.origin[axis];

            if self.direction[axis].abs() < PARALLEL_EPSILON {
                if origin < min[axis] || origin > max[axis] {
                    return false;
                }
                continue;
            }

            let inv = self.inv_direction[axis];
            let mut t0 = (min[axis] - origin) * inv;
            let mut t1 = (max[axis] - origin) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }

            t_near = t_near.max(t0);
            t_far = t_far.min(t1);
            if t_near > t_far {
                return false;
            }
        }

        true
    }

    /// Möller–Trumbore test against the triangle `(a, b, c)`.
    ///
    /// Both windings are accepted. Returns the ray parameter of the hit.
    pub fn triangle_toi(&self, a: Point3<f32>, b: Point3<f32>, c: Point3<f32>) -> Option<f32> {
        let edge1 = b - a;
        let edge2 = c - a;
        let pvec = self.direction.cross(&edge2);
        let det = edge1.dot(&pvec);

        // Ray lies in the triangle's plane.
        if det.abs() < TRIANGLE_EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;

        let tvec = self.origin - a;
        let u = tvec.dot(&pvec) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let qvec = tvec.cross(&edge1);
        let v = self.direction.dot(&qvec) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = edge2.dot(&qvec) * inv_det;
        (0.0..=self.max_toi).contains(&t).then_some(t)
    }

    /// Returns `true` if the ray hits the triangle `(a, b, c)`.
    #[inline]
    pub fn intersects_triangle(&self, a: Point3<f32>, b: Point3<f32>, c: Point3<f32>) -> bool {
        self.triangle_toi(a, b, c).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> BoundingBox {
        BoundingBox::new(Point3::new(-0.5, -0.5, -0.5), Point3::new(0.5, 0.5, 0.5))
    }

    #[test]
    fn ray_through_box_center() {
        let ray = Ray3::new(Point3::new(-5.0, 0.0, 0.0), Vector3::x());
        assert!(ray.intersects_box(&unit_box()));
    }

    #[test]
    fn ray_pointing_away_misses_box() {
        let ray = Ray3::new(Point3::new(-5.0, 0.0, 0.0), -Vector3::x());
        assert!(!ray.intersects_box(&unit_box()));
    }

    #[test]
    fn axis_parallel_ray_outside_slab() {
        let ray = Ray3::new(Point3::new(-5.0, 100.0, 0.0), Vector3::x());
        assert!(!ray.intersects_box(&unit_box()));
    }

    #[test]
    fn axis_parallel_ray_on_box_face() {
        // Origin exactly on the min plane of the y slab.
        let ray = Ray3::new(Point3::new(-5.0, -0.5, 0.0), Vector3::x());
        assert!(ray.intersects_box(&unit_box()));
    }

    #[test]
    fn segment_stops_short_of_box() {
        let short = Ray3::segment(Point3::new(-5.0, 0.0, 0.0), Point3::new(-1.0, 0.0, 0.0));
        let long = Ray3::segment(Point3::new(-5.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0));
        assert!(!short.intersects_box(&unit_box()));
        assert!(long.intersects_box(&unit_box()));
    }

    #[test]
    fn origin_inside_box() {
        let ray = Ray3::new(Point3::origin(), Vector3::new(0.3, -0.2, 0.9));
        assert!(ray.intersects_box(&unit_box()));
    }

    #[test]
    fn empty_box_is_never_hit() {
        let ray = Ray3::new(Point3::origin(), Vector3::x());
        assert!(!ray.intersects_box(&BoundingBox::empty()));
    }

    #[test]
    fn triangle_hit_both_windings() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);
        let ray = Ray3::new(Point3::new(0.25, 0.25, 5.0), -Vector3::z());

        assert_eq!(ray.triangle_toi(a, b, c), Some(5.0));
        assert!(ray.intersects_triangle(a, c, b));
    }

    #[test]
    fn triangle_miss_outside_edges() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);
        let ray = Ray3::new(Point3::new(0.75, 0.75, 5.0), -Vector3::z());
        assert!(!ray.intersects_triangle(a, b, c));
    }

    #[test]
    fn triangle_behind_origin() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);
        let ray = Ray3::new(Point3::new(0.25, 0.25, 5.0), Vector3::z());
        assert!(!ray.intersects_triangle(a, b, c));
    }

    #[test]
    fn ray_in_triangle_plane_is_a_miss() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);
        let ray = Ray3::new(Point3::new(-1.0, 0.25, 0.0), Vector3::x());
        assert!(!ray.intersects_triangle(a, b, c));
    }

    #[test]
    fn segment_limits_triangle_hits() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);
        let short = Ray3::segment(Point3::new(0.25, 0.25, 5.0), Point3::new(0.25, 0.25, 1.0));
        let through = Ray3::segment(Point3::new(0.25, 0.25, 5.0), Point3::new(0.25, 0.25, -1.0));
        assert!(!short.intersects_triangle(a, b, c));
        assert!(through.intersects_triangle(a, b, c));
    }
}

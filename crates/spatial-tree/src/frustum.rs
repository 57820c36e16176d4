//! View frustum extraction and culling tests.

use nalgebra::{Matrix4, Point3, RowVector4};

use crate::{BoundingBox, Plane3D};

/// Index of each side in [`Frustum::planes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrustumSide {
    Left = 0,
    Right = 1,
    Bottom = 2,
    Top = 3,
    Near = 4,
    Far = 5,
}

/// The six planes bounding a view volume, normals pointing inward.
#[derive(Debug, Clone, PartialEq)]
pub struct Frustum {
    planes: [Plane3D; 6],
}

impl Frustum {
    /// Extracts the frustum from a projection and a view matrix.
    ///
    /// Matrices follow nalgebra's column-vector convention with OpenGL clip
    /// space, so a world point maps to `projection * view * p`. Returns
    /// `None` when a plane cannot be formed, as happens for a non-finite
    /// matrix or a zero aspect ratio.
    pub fn try_from_matrices(projection: &Matrix4<f32>, view: &Matrix4<f32>) -> Option<Self> {
        let m = projection * view;
        let row = |i: usize| -> RowVector4<f32> { m.row(i).into_owned() };
        let plane = |r: RowVector4<f32>| {
            Plane3D::try_new(r.fixed_columns::<3>(0).transpose(), -r[3])
        };

        let w = row(3);
        Some(Self {
            planes: [
                plane(w + row(0))?,
                plane(w - row(0))?,
                plane(w + row(1))?,
                plane(w - row(1))?,
                plane(w + row(2))?,
                plane(w - row(2))?,
            ],
        })
    }

    /// Returns the six planes, indexed by [`FrustumSide`].
    #[inline]
    pub fn planes(&self) -> &[Plane3D; 6] {
        &self.planes
    }

    /// Returns the plane of one side.
    #[inline]
    pub fn plane(&self, side: FrustumSide) -> &Plane3D {
        &self.planes[side as usize]
    }

    /// Returns `true` if `point` is inside or on the frustum.
    pub fn contains_point(&self, point: Point3<f32>) -> bool {
        self.planes.iter().all(|p| p.signed_distance(point) >= 0.0)
    }

    /// Returns `false` only when the box lies entirely outside one plane.
    ///
    /// Boxes near a frustum corner can pass without actually overlapping it;
    /// that is fine for culling.
    pub fn intersects_box(&self, bounds: &BoundingBox) -> bool {
        if bounds.is_empty() {
            return false;
        }
        let (min, max) = (bounds.min(), bounds.max());

        self.planes.iter().all(|plane| {
            let n = plane.normal();
            // Corner furthest along the plane normal.
            let positive = Point3::new(
                if n.x >= 0.0 { max.x } else { min.x },
                if n.y >= 0.0 { max.y } else { min.y },
                if n.z >= 0.0 { max.z } else { min.z },
            );
            plane.signed_distance(positive) >= 0.0
        })
    }
}

//! Split selection strategies for kDOP tree construction.
//!
//! A selector looks at the centroids of the triangles owned by a node and
//! decides the axis and coordinate the node is split at. Triangles whose
//! centroid lies below the value go left, above go right.

use nalgebra::Point3;

/// A coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

impl Axis {
    /// Returns the component index of the axis (0, 1 or 2).
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Where a node is split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Split {
    /// Axis the split plane is perpendicular to.
    pub axis: Axis,
    /// Coordinate of the split plane along `axis`.
    pub value: f32,
}

/// Strategy for choosing the split of a kDOP node.
pub trait SplitSelector {
    /// Chooses a split for the triangles `triangles` (indices into
    /// `centroids`). Never called with an empty slice.
    fn select(&self, triangles: &[u32], centroids: &[Point3<f32>]) -> Split;
}

/// Splits along the axis of greatest centroid variance, at the centroid mean.
///
/// Ties go to the first axis that compares strictly greater: x wins only if it
/// beats both y and z, otherwise y wins if it beats z, otherwise z.
#[derive(Debug, Clone, Copy, Default)]
pub struct VarianceSplit;

impl SplitSelector for VarianceSplit {
    fn select(&self, triangles: &[u32], centroids: &[Point3<f32>]) -> Split {
        let inv_count = 1.0 / triangles.len() as f32;
        let points = || triangles.iter().map(|&t| centroids[t as usize]);

        let mean = points().fold([0.0_f32; 3], |mut sum, p| {
            for axis in 0..3 {
                sum[axis] += p[axis];
            }
            sum
        });
        let mean = mean.map(|s| s * inv_count);

        let variance = points().fold([0.0_f32; 3], |mut sum, p| {
            for axis in 0..3 {
                let d = p[axis] - mean[axis];
                sum[axis] += d * d;
            }
            sum
        });
        let variance = variance.map(|s| s * inv_count);

        let axis = if variance[0] > variance[1] && variance[0] > variance[2] {
            Axis::X
        } else if variance[1] > variance[2] {
            Axis::Y
        } else {
            Axis::Z
        };

        Split {
            axis,
            value: mean[axis.index()],
        }
    }
}

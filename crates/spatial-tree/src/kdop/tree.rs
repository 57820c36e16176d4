//! kDOP tree container, construction and ray queries.

use log::{debug, warn};
use nalgebra::Point3;

use crate::error::check_index;
use crate::{BoundingBox, Ray3, Result};

use super::node::{KdopNode, KdopNodeKind, TriangleIndices};
use super::selector::{Split, SplitSelector, VarianceSplit};

/// Construction parameters for a [`KdopTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdopConfig {
    /// Nodes holding this many triangles or fewer become leaves.
    /// Values below 1 are treated as 1.
    pub max_leaf_triangles: usize,
}

impl Default for KdopConfig {
    fn default() -> Self {
        Self {
            max_leaf_triangles: 5,
        }
    }
}

/// Shape of a built tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KdopStats {
    /// Total number of nodes, leaves included.
    pub nodes: usize,
    /// Number of leaves.
    pub leaves: usize,
    /// Depth of the deepest leaf (1 for a single-leaf tree, 0 when empty).
    pub max_depth: usize,
}

/// A bounding volume hierarchy of axis-aligned boxes (a 6-DOP tree) over a
/// triangle soup, answering any-hit ray queries.
///
/// # Construction
///
/// The tree keeps its own copy of the vertices and triangles. Each node is
/// split along the axis where triangle centroids vary the most, at their
/// mean, until it holds at most [`KdopConfig::max_leaf_triangles`] triangles:
///
/// ```ignore
/// use spatial_tree::{KdopTree, TriangleIndices};
///
/// let tree = KdopTree::build(&triangles, &vertices)?;
/// ```
///
/// # Queries
///
/// [`KdopTree::line_check`] answers whether a ray or segment touches any
/// triangle. It does not report where.
#[derive(Debug, Clone, Default)]
pub struct KdopTree {
    nodes: Vec<KdopNode>,
    vertices: Vec<Point3<f32>>,
    triangles: Vec<TriangleIndices>,
    stats: KdopStats,
}

impl KdopTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tree with the default configuration and [`VarianceSplit`].
    ///
    /// Fails if a triangle references a vertex that does not exist.
    pub fn build(triangles: &[TriangleIndices], vertices: &[Point3<f32>]) -> Result<Self> {
        Self::build_with(triangles, vertices, &KdopConfig::default(), &VarianceSplit)
    }

    /// Builds a tree with an explicit configuration and split selector.
    pub fn build_with<S: SplitSelector>(
        triangles: &[TriangleIndices],
        vertices: &[Point3<f32>],
        config: &KdopConfig,
        selector: &S,
    ) -> Result<Self> {
        for triangle in triangles {
            for &index in &triangle.0 {
                check_index("vertex", index as usize, vertices.len())?;
            }
        }

        let mut tree = Self {
            nodes: Vec::new(),
            vertices: vertices.to_vec(),
            triangles: triangles.to_vec(),
            stats: KdopStats::default(),
        };

        if triangles.is_empty() {
            debug!("kDOP tree built empty");
            return Ok(tree);
        }

        let centroids: Vec<Point3<f32>> = tree
            .triangles
            .iter()
            .map(|t| {
                let [a, b, c] = tree.triangle_vertices(t);
                Point3::from((a.coords + b.coords + c.coords) * (1.0 / 3.0))
            })
            .collect();

        let mut builder = Builder {
            vertices: &tree.vertices,
            triangles: &tree.triangles,
            centroids: &centroids,
            max_leaf_triangles: config.max_leaf_triangles.max(1),
            selector,
            nodes: vec![placeholder()],
        };
        let all = (0..triangles.len() as u32).collect();
        let stats = builder.build_node(0, all, 1);
        let nodes = builder.nodes;

        tree.nodes = nodes;
        tree.stats = stats;
        debug!(
            "kDOP tree built: {} triangles, {} nodes, {} leaves, depth {}",
            triangles.len(),
            stats.nodes,
            stats.leaves,
            stats.max_depth
        );
        Ok(tree)
    }

    /// Returns `true` if the tree has no nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the node arena; the root is at index 0.
    #[inline]
    pub fn nodes(&self) -> &[KdopNode] {
        &self.nodes
    }

    /// Returns the node at `index`.
    pub fn node(&self, index: usize) -> Result<&KdopNode> {
        Ok(&self.nodes[check_index("node", index, self.nodes.len())?])
    }

    /// Returns the tree's copy of the vertices.
    #[inline]
    pub fn vertices(&self) -> &[Point3<f32>] {
        &self.vertices
    }

    /// Returns the tree's copy of the triangles.
    #[inline]
    pub fn triangles(&self) -> &[TriangleIndices] {
        &self.triangles
    }

    /// Returns node, leaf and depth counts gathered during construction.
    #[inline]
    pub fn stats(&self) -> KdopStats {
        self.stats
    }

    /// Iterates over the leaf nodes.
    pub fn leaves(&self) -> impl Iterator<Item = &KdopNode> {
        self.nodes.iter().filter(|n| n.is_leaf())
    }

    /// Returns `true` if the ray touches at least one triangle.
    ///
    /// An empty tree is never hit.
    pub fn line_check(&self, ray: &Ray3) -> bool {
        !self.nodes.is_empty() && self.line_check_node(0, ray)
    }

    /// Returns the boxes of the nodes found at depth `level` (the root is at
    /// level 1), plus those of leaves ending above that depth.
    ///
    /// Useful for drawing one layer of the hierarchy.
    pub fn boxes_at_level(&self, level: usize) -> Vec<BoundingBox> {
        let mut boxes = Vec::new();
        if !self.nodes.is_empty() {
            self.collect_level(0, 1, level, &mut boxes);
        }
        boxes
    }

    fn line_check_node(&self, index: usize, ray: &Ray3) -> bool {
        let node = &self.nodes[index];
        if !ray.intersects_box(node.bounds()) {
            return false;
        }

        match node.kind() {
            KdopNodeKind::Leaf { triangles } => triangles.iter().any(|&t| {
                let [a, b, c] = self.triangle_vertices(&self.triangles[t as usize]);
                ray.intersects_triangle(a, b, c)
            }),
            KdopNodeKind::Internal { first_child } => {
                self.line_check_node(*first_child, ray)
                    || self.line_check_node(first_child + 1, ray)
            }
        }
    }

    fn collect_level(
        &self,
        index: usize,
        depth: usize,
        level: usize,
        boxes: &mut Vec<BoundingBox>,
    ) {
        let node = &self.nodes[index];
        match node.children() {
            Some([left, right]) if depth < level => {
                self.collect_level(left, depth + 1, level, boxes);
                self.collect_level(right, depth + 1, level, boxes);
            }
            _ => boxes.push(*node.bounds()),
        }
    }

    fn triangle_vertices(&self, triangle: &TriangleIndices) -> [Point3<f32>; 3] {
        triangle.0.map(|i| self.vertices[i as usize])
    }
}

fn placeholder() -> KdopNode {
    KdopNode::new(BoundingBox::empty(), KdopNodeKind::Internal { first_child: 0 })
}

/// Transient construction state; the centroids die with it.
struct Builder<'a, S> {
    vertices: &'a [Point3<f32>],
    triangles: &'a [TriangleIndices],
    centroids: &'a [Point3<f32>],
    max_leaf_triangles: usize,
    selector: &'a S,
    nodes: Vec<KdopNode>,
}

impl<S: SplitSelector> Builder<'_, S> {
    /// Fills arena slot `slot` with a node over `triangles`, recursing into
    /// freshly appended child slots as needed.
    fn build_node(&mut self, slot: usize, triangles: Vec<u32>, depth: usize) -> KdopStats {
        let bounds = self.bounds_of(&triangles);

        if triangles.len() <= self.max_leaf_triangles {
            self.nodes[slot] = KdopNode::new(bounds, KdopNodeKind::Leaf { triangles });
            return KdopStats {
                nodes: 1,
                leaves: 1,
                max_depth: depth,
            };
        }

        let split = self.selector.select(&triangles, self.centroids);
        let (left, right) = self.partition(&triangles, split);

        let first_child = self.nodes.len();
        self.nodes[slot] = KdopNode::new(bounds, KdopNodeKind::Internal { first_child });
        self.nodes.push(placeholder());
        self.nodes.push(placeholder());

        let left = self.build_node(first_child, left, depth + 1);
        let right = self.build_node(first_child + 1, right, depth + 1);

        KdopStats {
            nodes: 1 + left.nodes + right.nodes,
            leaves: left.leaves + right.leaves,
            max_depth: left.max_depth.max(right.max_depth),
        }
    }

    fn bounds_of(&self, triangles: &[u32]) -> BoundingBox {
        BoundingBox::from_points(
            triangles
                .iter()
                .flat_map(|&t| self.triangles[t as usize].0)
                .map(|v| self.vertices[v as usize]),
        )
    }

    /// Splits `triangles` by centroid against `split`.
    ///
    /// Centroids exactly on the split go to whichever side is smaller at that
    /// point (left only when strictly smaller). Both halves are non-empty on
    /// return.
    fn partition(&self, triangles: &[u32], split: Split) -> (Vec<u32>, Vec<u32>) {
        let axis = split.axis.index();
        let mut left = Vec::with_capacity(triangles.len());
        let mut right = Vec::with_capacity(triangles.len());
        let mut on_split = Vec::new();

        for &t in triangles {
            let c = self.centroids[t as usize][axis];
            if c < split.value {
                left.push(t);
            } else if c > split.value {
                right.push(t);
            } else {
                on_split.push(t);
            }
        }

        for t in on_split {
            if left.len() < right.len() {
                left.push(t);
            } else {
                right.push(t);
            }
        }

        if left.is_empty() || right.is_empty() {
            warn!(
                "degenerate kDOP split of {} triangles on {:?} at {}, halving by centroid order",
                triangles.len(),
                split.axis,
                split.value
            );
            let mut sorted = triangles.to_vec();
            sorted.sort_by(|&a, &b| {
                self.centroids[a as usize][axis].total_cmp(&self.centroids[b as usize][axis])
            });
            let right = sorted.split_off(sorted.len() / 2);
            return (sorted, right);
        }

        (left, right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdop::selector::Axis;
    use nalgebra::Vector3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn points(raw: &[[f32; 3]]) -> Vec<Point3<f32>> {
        raw.iter().map(|p| Point3::from(*p)).collect()
    }

    fn tris(raw: &[[u32; 3]]) -> Vec<TriangleIndices> {
        raw.iter().map(|t| TriangleIndices(*t)).collect()
    }

    /// Unit cube centered on the origin: 8 vertices, 12 triangles.
    fn unit_cube() -> (Vec<TriangleIndices>, Vec<Point3<f32>>) {
        let vertices = points(&[
            [-0.5, -0.5, -0.5],
            [0.5, -0.5, -0.5],
            [0.5, 0.5, -0.5],
            [-0.5, 0.5, -0.5],
            [-0.5, -0.5, 0.5],
            [0.5, -0.5, 0.5],
            [0.5, 0.5, 0.5],
            [-0.5, 0.5, 0.5],
        ]);
        let triangles = tris(&[
            [4, 5, 6],
            [4, 6, 7],
            [1, 0, 3],
            [1, 3, 2],
            [0, 4, 7],
            [0, 7, 3],
            [5, 1, 2],
            [5, 2, 6],
            [7, 6, 2],
            [7, 2, 3],
            [0, 1, 5],
            [0, 5, 4],
        ]);
        (triangles, vertices)
    }

    fn brute_force(tree: &KdopTree, ray: &Ray3) -> bool {
        tree.triangles().iter().any(|t| {
            let [a, b, c] = t.0.map(|i| tree.vertices()[i as usize]);
            ray.intersects_triangle(a, b, c)
        })
    }

    fn subtree_triangle_count(tree: &KdopTree, index: usize) -> usize {
        let node = &tree.nodes()[index];
        match node.children() {
            Some([l, r]) => subtree_triangle_count(tree, l) + subtree_triangle_count(tree, r),
            None => node.triangles().len(),
        }
    }

    fn assert_invariants(tree: &KdopTree, triangle_count: usize, max_leaf: usize) {
        let mut seen: Vec<u32> = tree.leaves().flat_map(|n| n.triangles().to_vec()).collect();
        seen.sort_unstable();
        let expected: Vec<u32> = (0..triangle_count as u32).collect();
        assert_eq!(seen, expected, "every triangle must sit in exactly one leaf");

        for node in tree.nodes() {
            match node.children() {
                Some([l, r]) => {
                    assert!(node.triangles().is_empty());
                    assert!(node.bounds().contains_box(tree.nodes()[l].bounds()));
                    assert!(node.bounds().contains_box(tree.nodes()[r].bounds()));
                }
                None => {
                    assert!(!node.triangles().is_empty(), "leaves are never empty");
                    assert!(node.triangles().len() <= max_leaf);
                }
            }
        }

        if !tree.is_empty() {
            assert_eq!(subtree_triangle_count(tree, 0), triangle_count);
        }
    }

    #[test]
    fn empty_tree_never_hits() {
        let tree = KdopTree::build(&[], &[]).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.stats(), KdopStats::default());
        assert!(!tree.line_check(&Ray3::new(Point3::origin(), Vector3::x())));
        assert!(tree.boxes_at_level(1).is_empty());
        assert!(KdopTree::new().is_empty());
    }

    #[test]
    fn small_mesh_is_a_single_leaf() {
        // One triangle on the bottom face, one on the top face.
        let vertices = points(&[
            [-0.5, -0.5, -0.5],
            [0.5, -0.5, -0.5],
            [0.5, 0.5, -0.5],
            [-0.5, -0.5, 0.5],
            [0.5, 0.5, 0.5],
            [-0.5, 0.5, 0.5],
        ]);
        let triangles = tris(&[[0, 1, 2], [3, 4, 5]]);
        let tree = KdopTree::build(&triangles, &vertices).unwrap();

        assert_eq!(tree.nodes().len(), 1);
        assert_eq!(tree.stats().leaves, 1);
        let root = tree.node(0).unwrap();
        assert!(root.is_leaf());
        assert_eq!(root.bounds().min(), Point3::new(-0.5, -0.5, -0.5));
        assert_eq!(root.bounds().max(), Point3::new(0.5, 0.5, 0.5));

        let through_center = Ray3::new(Point3::new(0.2, -0.1, -5.0), Vector3::new(-0.2, 0.1, 5.0));
        assert!(tree.line_check(&through_center));

        let far_away = Ray3::new(Point3::new(100.0, 100.0, -5.0), Vector3::z());
        assert!(!tree.line_check(&far_away));
    }

    #[test]
    fn cube_splits_and_keeps_invariants() {
        let (triangles, vertices) = unit_cube();
        let tree = KdopTree::build(&triangles, &vertices).unwrap();

        assert!(!tree.node(0).unwrap().is_leaf());
        assert_invariants(&tree, 12, 5);
        assert_eq!(tree.stats().nodes, tree.nodes().len());
        assert_eq!(tree.stats().leaves, tree.leaves().count());

        assert!(tree.line_check(&Ray3::new(Point3::new(0.1, 0.3, -5.0), Vector3::z())));
        assert!(tree.line_check(&Ray3::new(Point3::origin(), Vector3::new(1.0, 0.3, -0.2))));
        assert!(!tree.line_check(&Ray3::new(Point3::new(0.0, 0.0, -5.0), -Vector3::z())));
        assert!(!tree.line_check(&Ray3::segment(
            Point3::new(0.0, 0.0, -5.0),
            Point3::new(0.0, 0.0, -1.0)
        )));
    }

    #[test]
    fn tree_copies_its_input() {
        let (triangles, mut vertices) = unit_cube();
        let tree = KdopTree::build(&triangles, &vertices).unwrap();
        vertices.clear();
        assert_eq!(tree.vertices().len(), 8);
        assert_eq!(tree.triangles().len(), 12);
    }

    #[test]
    fn bad_vertex_index_is_rejected() {
        let vertices = points(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        let err = KdopTree::build(&tris(&[[0, 1, 3]]), &vertices).unwrap_err();
        assert_eq!(err, crate::SpatialError::out_of_range("vertex", 3, 3));
    }

    #[test]
    fn identical_triangles_still_terminate() {
        let vertices = points(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        let triangles = vec![TriangleIndices::new(0, 1, 2); 23];
        let tree = KdopTree::build(&triangles, &vertices).unwrap();

        assert_invariants(&tree, 23, 5);
        assert!(tree.line_check(&Ray3::new(Point3::new(0.2, 0.2, 1.0), -Vector3::z())));
    }

    #[test]
    fn on_split_ties_balance_children() {
        // Every centroid sits on the split.
        let vertices = points(&[[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        let triangles = vec![TriangleIndices::new(0, 1, 2); 7];
        let tree = KdopTree::build(&triangles, &vertices).unwrap();

        let [l, r] = tree.node(0).unwrap().children().unwrap();
        // Ties go right unless left is strictly smaller: 7 -> 3 left, 4 right.
        assert_eq!(tree.nodes()[l].triangles().len(), 3);
        assert_eq!(tree.nodes()[r].triangles().len(), 4);
    }

    #[test]
    fn degenerate_mean_falls_back_to_halving() {
        struct PastEverything;
        impl SplitSelector for PastEverything {
            fn select(&self, _: &[u32], _: &[Point3<f32>]) -> Split {
                Split {
                    axis: Axis::X,
                    value: 1.0e9,
                }
            }
        }

        let (triangles, vertices) = unit_cube();
        let config = KdopConfig {
            max_leaf_triangles: 2,
        };
        let tree = KdopTree::build_with(&triangles, &vertices, &config, &PastEverything).unwrap();
        assert_invariants(&tree, 12, 2);
    }

    #[test]
    fn custom_leaf_size() {
        let (triangles, vertices) = unit_cube();
        let config = KdopConfig {
            max_leaf_triangles: 1,
        };
        let tree = KdopTree::build_with(&triangles, &vertices, &config, &VarianceSplit).unwrap();
        assert_invariants(&tree, 12, 1);
        assert_eq!(tree.stats().leaves, 12);

        let zero = KdopConfig {
            max_leaf_triangles: 0,
        };
        let tree = KdopTree::build_with(&triangles, &vertices, &zero, &VarianceSplit).unwrap();
        assert_invariants(&tree, 12, 1);
    }

    #[test]
    fn boxes_at_level() {
        let (triangles, vertices) = unit_cube();
        let tree = KdopTree::build(&triangles, &vertices).unwrap();

        let root = tree.boxes_at_level(1);
        assert_eq!(root, vec![*tree.node(0).unwrap().bounds()]);

        let second = tree.boxes_at_level(2);
        assert_eq!(second.len(), 2);

        let deepest = tree.boxes_at_level(tree.stats().max_depth);
        assert_eq!(deepest.len(), tree.stats().leaves);
    }

    #[test]
    fn matches_brute_force_on_random_meshes() {
        let mut rng = StdRng::seed_from_u64(0x6b_d0_97);
        let mut hits = 0;
        let mut misses = 0;

        for _ in 0..20 {
            let count: usize = rng.random_range(1..150);
            let mut vertices = Vec::with_capacity(count * 3);
            for _ in 0..count {
                let center: Point3<f32> = Point3::new(
                    rng.random_range(-10.0..10.0),
                    rng.random_range(-10.0..10.0),
                    rng.random_range(-10.0..10.0),
                );
                for _ in 0..3 {
                    let offset: Vector3<f32> = Vector3::new(
                        rng.random_range(-1.5..1.5),
                        rng.random_range(-1.5..1.5),
                        rng.random_range(-1.5..1.5),
                    );
                    vertices.push(center + offset);
                }
            }
            let triangles: Vec<TriangleIndices> = (0..count as u32)
                .map(|i| TriangleIndices::new(3 * i, 3 * i + 1, 3 * i + 2))
                .collect();

            let tree = KdopTree::build(&triangles, &vertices).unwrap();
            assert_invariants(&tree, count, 5);

            for i in 0..200 {
                let origin: Point3<f32> = Point3::new(
                    rng.random_range(-15.0..15.0),
                    rng.random_range(-15.0..15.0),
                    rng.random_range(-15.0..15.0),
                );
                let target: Point3<f32> = Point3::new(
                    rng.random_range(-10.0..10.0),
                    rng.random_range(-10.0..10.0),
                    rng.random_range(-10.0..10.0),
                );
                let ray = if i % 2 == 0 {
                    Ray3::new(origin, target - origin)
                } else {
                    Ray3::segment(origin, target)
                };

                let expected = brute_force(&tree, &ray);
                assert_eq!(tree.line_check(&ray), expected, "ray {ray:?}");
                if expected {
                    hits += 1;
                } else {
                    misses += 1;
                }
            }
        }

        assert!(hits > 100, "too few hits to be meaningful: {hits}");
        assert!(misses > 100, "too few misses to be meaningful: {misses}");
    }
}

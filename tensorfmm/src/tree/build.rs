//! Top-down recursive construction of ball trees.
use num::Float;

use crate::traits::types::FmmError;
use crate::tree::types::{distance, orthant, Ball, Tree, TreeNode, MIN_BALL_RADIUS};

/// Build a ball tree over a point cloud.
///
/// Points and normals are consumed and reordered in place so that every node
/// owns a contiguous range of the arrays; the permutation is recorded in
/// `orig_idx`. The build is deterministic given its inputs.
///
/// # Arguments
/// * `points` - Point coordinates, flat row-major, `D` per point.
/// * `normals` - Unit normals, flat row-major, one per point.
/// * `leaf_capacity` - Maximum number of points per leaf.
pub fn build_tree<T, const D: usize>(
    points: Vec<T>,
    normals: Vec<T>,
    leaf_capacity: usize,
) -> Result<Tree<T, D>, FmmError>
where
    T: Float,
{
    Tree::from_points(points, normals, leaf_capacity)
}

impl<T, const D: usize> Tree<T, D>
where
    T: Float,
{
    /// Build a ball tree over a point cloud. See [`build_tree`].
    pub fn from_points(
        points: Vec<T>,
        normals: Vec<T>,
        leaf_capacity: usize,
    ) -> Result<Self, FmmError> {
        if leaf_capacity < 1 {
            return Err(FmmError::InvalidConfig(
                "leaf capacity must be at least 1".to_string(),
            ));
        }
        if points.len() % D != 0 {
            return Err(FmmError::InvalidConfig(format!(
                "point buffer length {} is not a multiple of the dimension {D}",
                points.len()
            )));
        }
        if normals.len() != points.len() {
            return Err(FmmError::ShapeMismatch {
                expected: points.len(),
                found: normals.len(),
            });
        }
        if points.is_empty() {
            return Err(FmmError::InvalidConfig(
                "cannot build a tree over zero points".to_string(),
            ));
        }

        let n_points = points.len() / D;
        let mut tree = Tree {
            points,
            normals,
            orig_idx: (0..n_points).collect(),
            nodes: Vec::new(),
            max_height: 0,
            max_depth: 0,
            leaf_capacity,
        };

        tree.build_node(0, n_points, 0);
        tree.fill_heights();

        Ok(tree)
    }

    /// Create the node owning `[start, end)` at `depth`, recursively building
    /// its children. Returns the node's index.
    fn build_node(&mut self, start: usize, end: usize, depth: usize) -> usize {
        let bounds = enclosing_ball::<T, D>(&self.points[start * D..end * D]);

        let idx = self.nodes.len();
        self.nodes.push(TreeNode {
            idx,
            start,
            end,
            depth,
            height: 0,
            is_leaf: true,
            bounds,
            children: Vec::new(),
        });
        self.max_depth = self.max_depth.max(depth);

        if end - start <= self.leaf_capacity {
            return idx;
        }

        // Coincident or near-coincident clouds stay leaves regardless of
        // capacity, the radius floor marks them.
        if bounds.radius <= T::from(MIN_BALL_RADIUS).unwrap() {
            return idx;
        }

        let child_ranges = self.partition(start, end);

        // A split that fails to separate the points cannot make progress.
        if child_ranges.len() < 2 {
            return idx;
        }

        let mut children = Vec::with_capacity(child_ranges.len());
        for (child_start, child_end) in child_ranges {
            children.push(self.build_node(child_start, child_end, depth + 1));
        }
        self.nodes[idx].is_leaf = false;
        self.nodes[idx].children = children;

        idx
    }

    /// Reorder `[start, end)` into up to 2^D orthants about the midpoint of
    /// the actual point extents, returning the non-empty child ranges in
    /// orthant order. Stable, so the build is deterministic.
    fn partition(&mut self, start: usize, end: usize) -> Vec<(usize, usize)> {
        let n = end - start;
        let n_orthants = 1 << D;

        let mut lo = [T::infinity(); D];
        let mut hi = [T::neg_infinity(); D];
        for i in start..end {
            for axis in 0..D {
                let x = self.points[i * D + axis];
                lo[axis] = lo[axis].min(x);
                hi[axis] = hi[axis].max(x);
            }
        }
        let mut split = [T::zero(); D];
        let half = T::from(0.5).unwrap();
        for axis in 0..D {
            split[axis] = (lo[axis] + hi[axis]) * half;
        }

        let codes: Vec<usize> = (start..end)
            .map(|i| orthant::<T, D>(&self.points[i * D..(i + 1) * D], &split))
            .collect();

        // Counting sort over orthant codes.
        let mut counts = vec![0usize; n_orthants];
        for &code in codes.iter() {
            counts[code] += 1;
        }
        let mut offsets = vec![0usize; n_orthants];
        let mut acc = 0;
        for code in 0..n_orthants {
            offsets[code] = acc;
            acc += counts[code];
        }

        let mut points = vec![T::zero(); n * D];
        let mut normals = vec![T::zero(); n * D];
        let mut orig_idx = vec![0usize; n];
        let mut cursor = offsets.clone();
        for (local, &code) in codes.iter().enumerate() {
            let dst = cursor[code];
            cursor[code] += 1;
            let src = start + local;
            points[dst * D..(dst + 1) * D].copy_from_slice(&self.points[src * D..(src + 1) * D]);
            normals[dst * D..(dst + 1) * D]
                .copy_from_slice(&self.normals[src * D..(src + 1) * D]);
            orig_idx[dst] = self.orig_idx[src];
        }
        self.points[start * D..end * D].copy_from_slice(&points);
        self.normals[start * D..end * D].copy_from_slice(&normals);
        self.orig_idx[start..end].copy_from_slice(&orig_idx);

        (0..n_orthants)
            .filter(|&code| counts[code] > 0)
            .map(|code| {
                (
                    start + offsets[code],
                    start + offsets[code] + counts[code],
                )
            })
            .collect()
    }

    /// Fill heights bottom-up. Children are created after their parent, so a
    /// reverse sweep over the node array sees every child before its parent.
    fn fill_heights(&mut self) {
        for i in (0..self.nodes.len()).rev() {
            if !self.nodes[i].is_leaf {
                let height = self.nodes[i]
                    .children
                    .iter()
                    .map(|&c| self.nodes[c].height)
                    .max()
                    .unwrap()
                    + 1;
                self.nodes[i].height = height;
            }
        }
        self.max_height = self.nodes[0].height;
    }
}

/// Smallest enclosing ball of a point cloud, via Ritter's two-pass
/// approximation followed by an exact radius pass so that containment holds
/// with zero tolerance.
pub fn enclosing_ball<T, const D: usize>(points: &[T]) -> Ball<T, D>
where
    T: Float,
{
    let n = points.len() / D;
    let point = |i: usize| &points[i * D..(i + 1) * D];

    // Pass 1: a diameter estimate from two far-apart points.
    let p0 = point(0);
    let p1 = argmax_distance::<T, D>(points, p0);
    let p1 = point(p1);
    let p2 = argmax_distance::<T, D>(points, p1);
    let p2 = point(p2);

    let half = T::from(0.5).unwrap();
    let mut center = [T::zero(); D];
    for axis in 0..D {
        center[axis] = (p1[axis] + p2[axis]) * half;
    }
    let mut radius = distance::<T, D>(p1, p2) * half;

    // Pass 2: grow the ball towards any stragglers.
    for i in 0..n {
        let d = distance::<T, D>(&center, point(i));
        if d > radius {
            let grown = (radius + d) * half;
            let shift = (d - grown) / d;
            for axis in 0..D {
                center[axis] = center[axis] + (point(i)[axis] - center[axis]) * shift;
            }
            radius = grown;
        }
    }

    // Containment is an invariant, not an approximation. Settle the radius
    // at the exact farthest distance from the final center.
    let mut exact = T::zero();
    for i in 0..n {
        exact = exact.max(distance::<T, D>(&center, point(i)));
    }
    radius = exact.max(T::from(MIN_BALL_RADIUS).unwrap());

    Ball { center, radius }
}

fn argmax_distance<T, const D: usize>(points: &[T], from: &[T]) -> usize
where
    T: Float,
{
    let n = points.len() / D;
    let mut best = 0;
    let mut best_d = T::neg_infinity();
    for i in 0..n {
        let d = distance::<T, D>(from, &points[i * D..(i + 1) * D]);
        if d > best_d {
            best_d = d;
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tree::helpers::{normals_fixture, points_fixture};

    fn check_partition<const D: usize>(tree: &Tree<f64, D>) {
        for node in tree.nodes.iter() {
            if node.is_leaf {
                continue;
            }
            let mut cursor = node.start;
            for &child in node.children.iter() {
                let child = &tree.nodes[child];
                assert_eq!(child.start, cursor);
                assert!(child.end > child.start);
                cursor = child.end;
            }
            assert_eq!(cursor, node.end);
        }
    }

    fn check_containment<const D: usize>(tree: &Tree<f64, D>) {
        for node in tree.nodes.iter() {
            for i in node.start..node.end {
                assert!(node.bounds.contains(&tree.points[i * D..(i + 1) * D]));
            }
        }
    }

    fn check_permutation<const D: usize>(tree: &Tree<f64, D>) {
        let mut seen = vec![false; tree.n_points()];
        for &orig in tree.orig_idx.iter() {
            assert!(!seen[orig]);
            seen[orig] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_tree_invariants() {
        let n_points = 10000;
        let points = points_fixture::<f64, 3>(n_points, None, None, Some(0));
        let normals = normals_fixture::<f64, 3>(n_points, Some(1));
        let tree = Tree::<f64, 3>::from_points(points, normals, 50).unwrap();

        check_partition(&tree);
        check_containment(&tree);
        check_permutation(&tree);

        for node in tree.nodes.iter() {
            if node.is_leaf {
                assert!(node.n_points() <= 50);
                assert_eq!(node.height, 0);
            } else {
                assert!(node.n_points() > 50);
                let expected = node
                    .children
                    .iter()
                    .map(|&c| tree.nodes[c].height)
                    .max()
                    .unwrap()
                    + 1;
                assert_eq!(node.height, expected);
                for &c in node.children.iter() {
                    assert_eq!(tree.nodes[c].depth, node.depth + 1);
                }
            }
        }
    }

    #[test]
    fn test_normals_travel_with_points() {
        let n_points = 500;
        let points = points_fixture::<f64, 3>(n_points, None, None, Some(2));
        let normals = normals_fixture::<f64, 3>(n_points, Some(3));
        let tree =
            Tree::<f64, 3>::from_points(points.clone(), normals.clone(), 20).unwrap();

        for (new, &orig) in tree.orig_idx.iter().enumerate() {
            for axis in 0..3 {
                assert_eq!(tree.points[new * 3 + axis], points[orig * 3 + axis]);
                assert_eq!(tree.normals[new * 3 + axis], normals[orig * 3 + axis]);
            }
        }
    }

    #[test]
    fn test_coincident_points_become_a_leaf() {
        let n_points = 64;
        let points = vec![0.25; n_points * 3];
        let normals = normals_fixture::<f64, 3>(n_points, Some(4));
        let tree = Tree::<f64, 3>::from_points(points, normals, 4).unwrap();

        assert_eq!(tree.nodes.len(), 1);
        assert!(tree.root().is_leaf);
        assert_eq!(tree.root().n_points(), n_points);
        assert!(tree.root().bounds.radius >= MIN_BALL_RADIUS);
    }

    #[test]
    fn test_clustered_cloud_omits_empty_orthants() {
        // All the mass sits in a single octant of the unit cube.
        let n_points = 100;
        let points = points_fixture::<f64, 3>(n_points, Some(0.0), Some(0.25), Some(5));
        let normals = normals_fixture::<f64, 3>(n_points, Some(6));
        let tree = Tree::<f64, 3>::from_points(points, normals, 10).unwrap();

        for node in tree.nodes.iter() {
            assert!(node.children.len() <= 8);
            for &child in node.children.iter() {
                assert!(tree.nodes[child].n_points() > 0);
            }
        }
        check_partition(&tree);
        check_containment(&tree);
    }

    #[test]
    fn test_two_dimensional_build() {
        let n_points = 300;
        let points = points_fixture::<f64, 2>(n_points, Some(-1.0), Some(1.0), Some(7));
        let normals = normals_fixture::<f64, 2>(n_points, Some(8));
        let tree = Tree::<f64, 2>::from_points(points, normals, 16).unwrap();

        check_partition(&tree);
        check_containment(&tree);
        check_permutation(&tree);
        for node in tree.nodes.iter() {
            assert!(node.children.len() <= 4);
        }
    }

    #[test]
    fn test_invalid_inputs() {
        let points = points_fixture::<f64, 3>(10, None, None, Some(9));
        let normals = normals_fixture::<f64, 3>(9, Some(10));
        assert!(matches!(
            Tree::<f64, 3>::from_points(points.clone(), normals, 10),
            Err(FmmError::ShapeMismatch { .. })
        ));

        let normals = normals_fixture::<f64, 3>(10, Some(11));
        assert!(matches!(
            Tree::<f64, 3>::from_points(points, normals, 0),
            Err(FmmError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_determinism() {
        let n_points = 1000;
        let points = points_fixture::<f64, 3>(n_points, None, None, Some(12));
        let normals = normals_fixture::<f64, 3>(n_points, Some(13));
        let a = Tree::<f64, 3>::from_points(points.clone(), normals.clone(), 30).unwrap();
        let b = Tree::<f64, 3>::from_points(points, normals, 30).unwrap();

        assert_eq!(a.nodes.len(), b.nodes.len());
        assert_eq!(a.orig_idx, b.orig_idx);
        assert_eq!(a.points, b.points);
    }
}

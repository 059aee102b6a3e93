//! Complete 4-ary tree over Morton-ordered nodes for O(n log n) repulsion.
//!
//! The tree is a flat array laid out level by level: the root is cell 0 and
//! the children of cell `c` are `4c + 1 ..= 4c + 4`. Sorted node `r` lives in
//! leaf `leaf_offset + r`, so every cell covers a contiguous range of Morton
//! ranks, which keeps cells spatially compact. Each cell stores its mass,
//! center of mass and the tight box around the points it contains.

use rayon::prelude::*;

use crate::NodeState;

/// Shape of a complete quadtree with at least `n` leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeGeometry {
    /// Number of levels, root included.
    pub levels: u32,
    /// `4^(levels - 1)`, the smallest power of four >= max(n, 1).
    pub leaf_count: usize,
    /// Index of the first leaf: `(4^(levels - 1) - 1) / 3`.
    pub leaf_offset: usize,
    /// Total number of cells: `leaf_offset + leaf_count`.
    pub tree_size: usize,
}

impl TreeGeometry {
    pub fn for_leaves(n: usize) -> Self {
        let mut levels = 1;
        let mut leaf_count = 1usize;
        while leaf_count < n {
            leaf_count *= 4;
            levels += 1;
        }
        let leaf_offset = (leaf_count - 1) / 3;
        Self {
            levels,
            leaf_count,
            leaf_offset,
            tree_size: leaf_offset + leaf_count,
        }
    }

    /// Index of the first cell of `level`.
    pub fn level_start(level: u32) -> usize {
        ((1usize << (2 * level)) - 1) / 3
    }

    pub fn is_leaf(&self, cell: usize) -> bool {
        cell >= self.leaf_offset
    }

    /// Half-open range of Morton ranks covered by `cell` at `level`.
    pub fn leaf_range(&self, cell: usize, level: u32) -> std::ops::Range<usize> {
        let index_in_level = cell - Self::level_start(level);
        let span = 1usize << (2 * (self.levels - 1 - level));
        index_in_level * span..(index_in_level + 1) * span
    }
}

/// Aggregate of the points inside one cell.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct TreeCell {
    /// Number of nodes in this cell
    pub mass: f32,
    /// Center of mass X
    pub center_x: f32,
    /// Center of mass Y
    pub center_y: f32,
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl TreeCell {
    pub const EMPTY: Self = Self {
        mass: 0.0,
        center_x: 0.0,
        center_y: 0.0,
        min_x: f32::INFINITY,
        min_y: f32::INFINITY,
        max_x: f32::NEG_INFINITY,
        max_y: f32::NEG_INFINITY,
    };

    /// A single node as a trivial aggregate.
    pub fn point(x: f32, y: f32) -> Self {
        if !(x.is_finite() && y.is_finite()) {
            return Self::EMPTY;
        }
        Self {
            mass: 1.0,
            center_x: x,
            center_y: y,
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mass <= 0.0
    }

    /// Side of the cell's bounding square, used by the opening criterion.
    pub fn width(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        (self.max_x - self.min_x).max(self.max_y - self.min_y)
    }

    /// Combine four children into their parent.
    fn merge(children: &[TreeCell]) -> Self {
        let mut mass = 0.0f64;
        let mut sum_x = 0.0f64;
        let mut sum_y = 0.0f64;
        let mut out = Self::EMPTY;

        for child in children.iter().filter(|c| !c.is_empty()) {
            let m = f64::from(child.mass);
            mass += m;
            sum_x += m * f64::from(child.center_x);
            sum_y += m * f64::from(child.center_y);
            out.min_x = out.min_x.min(child.min_x);
            out.min_y = out.min_y.min(child.min_y);
            out.max_x = out.max_x.max(child.max_x);
            out.max_y = out.max_y.max(child.max_y);
        }

        if mass == 0.0 {
            return Self::EMPTY;
        }
        out.mass = mass as f32;
        out.center_x = (sum_x / mass) as f32;
        out.center_y = (sum_y / mass) as f32;
        out
    }
}

/// Scratch quadtree rebuilt from scratch every tick.
#[derive(Debug)]
pub struct QuadTree {
    geometry: TreeGeometry,
    cells: Vec<TreeCell>,
}

impl Default for QuadTree {
    fn default() -> Self {
        Self::new()
    }
}

impl QuadTree {
    pub fn new() -> Self {
        let geometry = TreeGeometry::for_leaves(0);
        Self {
            geometry,
            cells: vec![TreeCell::EMPTY; geometry.tree_size],
        }
    }

    /// Resize for `n` nodes. Returns true if the cell buffer had to grow.
    pub fn ensure_geometry(&mut self, n: usize) -> bool {
        self.geometry = TreeGeometry::for_leaves(n);
        let grew = self.geometry.tree_size > self.cells.capacity();
        self.cells.resize(self.geometry.tree_size, TreeCell::EMPTY);
        grew
    }

    pub fn geometry(&self) -> &TreeGeometry {
        &self.geometry
    }

    pub fn cells(&self) -> &[TreeCell] {
        &self.cells
    }

    pub fn root(&self) -> &TreeCell {
        &self.cells[0]
    }

    /// Stage 3: clear the tree and place each sorted node in its leaf.
    ///
    /// `order[r]` is the node at Morton rank `r`.
    pub fn build(&mut self, states: &[NodeState], order: &[u32]) {
        debug_assert!(order.len() <= self.geometry.leaf_count);

        self.cells.par_iter_mut().for_each(|cell| *cell = TreeCell::EMPTY);

        let leaf_offset = self.geometry.leaf_offset;
        self.cells[leaf_offset..leaf_offset + order.len()]
            .par_iter_mut()
            .zip(order.par_iter())
            .for_each(|(leaf, &node)| {
                let state = &states[node as usize];
                *leaf = TreeCell::point(state.x, state.y);
            });
    }

    /// Stage 4: aggregate children into parents, deepest internal level first.
    ///
    /// Each level is its own parallel pass; a level only starts once the one
    /// below it is complete.
    pub fn summarize(&mut self) {
        for level in (0..self.geometry.levels - 1).rev() {
            let start = TreeGeometry::level_start(level);
            let next = TreeGeometry::level_start(level + 1);
            let (upper, lower) = self.cells.split_at_mut(next);
            let lower = &*lower;

            upper[start..]
                .par_iter_mut()
                .enumerate()
                .for_each(|(j, parent)| {
                    *parent = TreeCell::merge(&lower[4 * j..4 * j + 4]);
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_states(n: usize, seed: u64) -> Vec<NodeState> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| NodeState::at(rng.random_range(-500.0..500.0), rng.random_range(-500.0..500.0)))
            .collect()
    }

    fn built_tree(states: &[NodeState]) -> QuadTree {
        let order: Vec<u32> = (0..states.len() as u32).collect();
        let mut tree = QuadTree::new();
        tree.ensure_geometry(states.len());
        tree.build(states, &order);
        tree.summarize();
        tree
    }

    #[test]
    fn test_geometry_closed_form() {
        let cases = [
            (0, 1, 1, 0, 1),
            (1, 1, 1, 0, 1),
            (2, 2, 4, 1, 5),
            (4, 2, 4, 1, 5),
            (5, 3, 16, 5, 21),
            (16, 3, 16, 5, 21),
            (17, 4, 64, 21, 85),
        ];
        for (n, levels, leaf_count, leaf_offset, tree_size) in cases {
            let g = TreeGeometry::for_leaves(n);
            assert_eq!(
                (g.levels, g.leaf_count, g.leaf_offset, g.tree_size),
                (levels, leaf_count, leaf_offset, tree_size),
                "n = {n}"
            );
        }
    }

    #[test]
    fn test_leaf_range() {
        let g = TreeGeometry::for_leaves(16);
        assert_eq!(g.leaf_range(0, 0), 0..16);
        assert_eq!(g.leaf_range(1, 1), 0..4);
        assert_eq!(g.leaf_range(4, 1), 12..16);
        assert_eq!(g.leaf_range(5, 2), 0..1);
        assert_eq!(g.leaf_range(20, 2), 15..16);
    }

    #[test]
    fn test_empty_tree() {
        let mut tree = QuadTree::new();
        tree.ensure_geometry(0);
        tree.build(&[], &[]);
        tree.summarize();
        assert!(tree.root().is_empty());
    }

    #[test]
    fn test_single_node() {
        let tree = built_tree(&[NodeState::at(3.0, 4.0)]);
        assert_eq!(tree.cells().len(), 1);
        assert_eq!(tree.root().mass, 1.0);
        assert_eq!(tree.root().center_x, 3.0);
        assert_eq!(tree.root().width(), 0.0);
    }

    #[test]
    fn test_root_aggregates_everything() {
        let states = random_states(300, 7);
        let tree = built_tree(&states);
        let root = tree.root();
        assert_eq!(root.mass, 300.0);

        let mean_x = states.iter().map(|s| f64::from(s.x)).sum::<f64>() / 300.0;
        let mean_y = states.iter().map(|s| f64::from(s.y)).sum::<f64>() / 300.0;
        assert!((f64::from(root.center_x) - mean_x).abs() < 1e-3);
        assert!((f64::from(root.center_y) - mean_y).abs() < 1e-3);
    }

    #[test]
    fn test_internal_cells_sum_children() {
        let states = random_states(777, 11);
        let tree = built_tree(&states);
        let g = *tree.geometry();
        let cells = tree.cells();

        for c in 0..g.leaf_offset {
            let children = &cells[4 * c + 1..4 * c + 5];
            let mass: f32 = children.iter().map(|k| k.mass).sum();
            assert_eq!(cells[c].mass, mass, "cell {c}");

            if mass > 0.0 {
                let cx: f32 = children.iter().map(|k| k.mass * k.center_x).sum::<f32>() / mass;
                let cy: f32 = children.iter().map(|k| k.mass * k.center_y).sum::<f32>() / mass;
                assert!((cells[c].center_x - cx).abs() < 1e-2, "cell {c}");
                assert!((cells[c].center_y - cy).abs() < 1e-2, "cell {c}");
                for k in children.iter().filter(|k| !k.is_empty()) {
                    assert!(cells[c].min_x <= k.min_x && cells[c].max_x >= k.max_x);
                    assert!(cells[c].min_y <= k.min_y && cells[c].max_y >= k.max_y);
                }
            } else {
                assert!(cells[c].is_empty());
            }
        }
    }

    #[test]
    fn test_unused_leaves_are_empty() {
        let states = random_states(5, 3);
        let tree = built_tree(&states);
        let g = tree.geometry();
        let leaves = &tree.cells()[g.leaf_offset..];
        assert_eq!(leaves.iter().filter(|c| c.mass == 1.0).count(), 5);
        assert!(leaves[5..].iter().all(TreeCell::is_empty));
    }

    #[test]
    fn test_non_finite_point_is_excluded() {
        let states = vec![NodeState::at(0.0, 0.0), NodeState::at(f32::NAN, 1.0)];
        let tree = built_tree(&states);
        assert_eq!(tree.root().mass, 1.0);
        assert!(tree.root().center_x.is_finite());
    }

    #[test]
    fn test_rebuild_after_shrink() {
        let mut tree = built_tree(&random_states(100, 1));
        let small = random_states(3, 2);
        tree.ensure_geometry(3);
        tree.build(&small, &[2, 0, 1]);
        tree.summarize();
        assert_eq!(tree.cells().len(), 5);
        assert_eq!(tree.root().mass, 3.0);
        assert_eq!(tree.cells()[1].center_x, small[2].x);
    }
}

//! Barnes-Hut repulsion over the summarized quadtree.

use rayon::prelude::*;

use crate::accumulator::ForceAccumulator;
use crate::quadtree::QuadTree;
use crate::NodeState;

/// Distances below this are clamped before dividing.
pub(crate) const DISTANCE_EPSILON: f32 = 1.0;

const STACK_CAPACITY: usize = 64;

/// Deterministic unit vector for two coincident bodies.
///
/// `jiggle(a, b) == -jiggle(b, a)`, so coincident pairs push apart along the
/// same line instead of producing NaN.
pub(crate) fn jiggle(a: u32, b: u32) -> (f32, f32) {
    let (lo, hi, sign) = if a <= b { (a, b, 1.0) } else { (b, a, -1.0) };
    let hash = u64::from(lo).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ u64::from(hi).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    let angle = (hash >> 40) as f32 / (1u64 << 24) as f32 * std::f32::consts::TAU;
    (sign * angle.cos(), sign * angle.sin())
}

/// Repulsive force a body of `mass` at offset `(dx, dy)` exerts.
///
/// `(dx, dy)` points from the source toward the receiving node.
fn pseudo_body_force(dx: f32, dy: f32, mass: f32, strength: f32, pair: (u32, u32)) -> (f32, f32) {
    let dist_sq = dx * dx + dy * dy;
    let (ux, uy) = if dist_sq > 0.0 && dist_sq.is_finite() {
        let dist = dist_sq.sqrt();
        (dx / dist, dy / dist)
    } else {
        jiggle(pair.0, pair.1)
    };
    let magnitude = strength * mass / dist_sq.max(DISTANCE_EPSILON * DISTANCE_EPSILON);
    (ux * magnitude, uy * magnitude)
}

/// Total repulsion on the node at Morton rank `rank`, positioned at `(x, y)`.
///
/// `strength` already includes `alpha`.
pub(crate) fn force_on(
    tree: &QuadTree,
    rank: usize,
    x: f32,
    y: f32,
    strength: f32,
    theta: f32,
) -> (f32, f32) {
    let geometry = tree.geometry();
    let cells = tree.cells();
    let own_leaf = geometry.leaf_offset + rank;
    let theta_sq = theta * theta;

    let mut fx = 0.0f32;
    let mut fy = 0.0f32;

    // (cell, level)
    let mut stack = [(0usize, 0u32); STACK_CAPACITY];
    let mut len = 1;

    while len > 0 {
        len -= 1;
        let (index, level) = stack[len];
        if index == own_leaf {
            continue;
        }

        let cell = &cells[index];
        if cell.is_empty() {
            continue;
        }

        let dx = x - cell.center_x;
        let dy = y - cell.center_y;
        let is_leaf = geometry.is_leaf(index);

        let far_enough = !is_leaf && {
            let width = cell.width();
            !geometry.leaf_range(index, level).contains(&rank)
                && width * width < theta_sq * (dx * dx + dy * dy)
        };

        if is_leaf || far_enough {
            let other = if is_leaf {
                (index - geometry.leaf_offset) as u32
            } else {
                geometry.leaf_range(index, level).start as u32
            };
            let (cx, cy) = pseudo_body_force(dx, dy, cell.mass, strength, (rank as u32, other));
            fx += cx;
            fy += cy;
        } else {
            debug_assert!(len + 4 <= STACK_CAPACITY, "quadtree deeper than the traversal stack");
            for child in (4 * index + 1..=4 * index + 4).rev() {
                stack[len] = (child, level + 1);
                len += 1;
            }
        }
    }

    (fx, fy)
}

/// Stage 5: add Barnes-Hut repulsion for every node to `forces`.
///
/// `order[r]` is the node at Morton rank `r`; the tree must have been built
/// and summarized from the same order.
pub(crate) fn accumulate(
    tree: &QuadTree,
    order: &[u32],
    states: &[NodeState],
    strength: f32,
    theta: f32,
    forces: &ForceAccumulator,
) {
    if strength == 0.0 {
        return;
    }
    order.par_iter().enumerate().for_each(|(rank, &node)| {
        let state = &states[node as usize];
        let (fx, fy) = force_on(tree, rank, state.x, state.y, strength, theta);
        forces.add(node as usize, fx, fy);
    });
}

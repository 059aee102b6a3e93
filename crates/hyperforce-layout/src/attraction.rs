//! Hyperedge attraction.
//!
//! Each hyperedge is modelled as a star around the centroid of its members
//! rather than as springs between every member pair.

use rayon::prelude::*;

use crate::accumulator::ForceAccumulator;
use crate::topology::Hypergraph;
use crate::NodeState;

/// Spring vectors shorter than this have no direction and exert nothing.
pub(crate) const MIN_SPRING_LENGTH: f32 = 1e-6;

/// Members per work-item when a single hyperedge is split across workers.
const MEMBER_CHUNK: usize = 1024;

fn centroid(members: &[u32], states: &[NodeState]) -> (f32, f32) {
    let (sx, sy) = members
        .par_iter()
        .with_min_len(MEMBER_CHUNK)
        .map(|&m| {
            let s = &states[m as usize];
            (f64::from(s.x), f64::from(s.y))
        })
        .reduce(|| (0.0, 0.0), |a, b| (a.0 + b.0, a.1 + b.1));
    let count = members.len() as f64;
    ((sx / count) as f32, (sy / count) as f32)
}

/// Spring force pulling a member at `(x, y)` toward `rest_length` from the
/// centroid `(cx, cy)`. Negative magnitude pushes away.
fn spring_force(x: f32, y: f32, cx: f32, cy: f32, strength: f32, rest_length: f32) -> (f32, f32) {
    let dx = cx - x;
    let dy = cy - y;
    let dist = dx.hypot(dy);
    if dist.is_nan() || dist < MIN_SPRING_LENGTH {
        return (0.0, 0.0);
    }
    let magnitude = strength * (dist - rest_length);
    (dx / dist * magnitude, dy / dist * magnitude)
}

/// Stage 6: add the star-spring force of every hyperedge to its members.
///
/// `strength` already includes `alpha`. Members shared by several
/// hyperedges receive the sum of all of them.
pub(crate) fn accumulate(
    topology: &Hypergraph,
    states: &[NodeState],
    strength: f32,
    rest_length: f32,
    forces: &ForceAccumulator,
) {
    if strength == 0.0 {
        return;
    }
    (0..topology.edge_count()).into_par_iter().for_each(|e| {
        let members = topology.edge(e);
        if members.len() < 2 {
            return;
        }
        let (cx, cy) = centroid(members, states);
        members
            .par_iter()
            .with_min_len(MEMBER_CHUNK)
            .for_each(|&m| {
                let s = &states[m as usize];
                let (fx, fy) = spring_force(s.x, s.y, cx, cy, strength, rest_length);
                forces.add(m as usize, fx, fy);
            });
    });
}

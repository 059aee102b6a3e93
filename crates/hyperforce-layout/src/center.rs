//! Drift correction toward a fixed center point.

use rayon::prelude::*;

use crate::NodeState;

/// Mean position of all finite nodes, reduced in `f64`.
///
/// Returns `None` for an empty set.
pub(crate) fn centroid(states: &[NodeState]) -> Option<(f64, f64)> {
    let (sx, sy, count) = states
        .par_iter()
        .filter(|s| s.x.is_finite() && s.y.is_finite())
        .map(|s| (f64::from(s.x), f64::from(s.y), 1u64))
        .reduce(
            || (0.0, 0.0, 0),
            |a, b| (a.0 + b.0, a.1 + b.1, a.2 + b.2),
        );
    (count > 0).then(|| (sx / count as f64, sy / count as f64))
}

/// Stage 7: the force every node receives to move the centroid toward
/// `(center_x, center_y)`.
///
/// The same vector is applied to all nodes, so relative positions are
/// untouched. `strength` already includes `alpha`.
pub(crate) fn uniform_force(states: &[NodeState], center: (f32, f32), strength: f32) -> (f32, f32) {
    if strength == 0.0 {
        return (0.0, 0.0);
    }
    match centroid(states) {
        Some((cx, cy)) => {
            let fx = (f64::from(center.0) - cx) * f64::from(strength);
            let fy = (f64::from(center.1) - cy) * f64::from(strength);
            (fx as f32, fy as f32)
        }
        None => (0.0, 0.0),
    }
}

//! Damped position/velocity integration.

use rayon::prelude::*;

use crate::accumulator::ForceAccumulator;
use crate::NodeState;

/// Velocity update rules for one tick.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Damping {
    /// Fraction of velocity removed after forces are applied.
    pub velocity_decay: f32,
    pub max_velocity: Option<f32>,
}

impl Damping {
    fn apply(&self, mut vx: f32, mut vy: f32) -> (f32, f32) {
        let keep = 1.0 - self.velocity_decay;
        vx *= keep;
        vy *= keep;
        if let Some(max) = self.max_velocity {
            let speed = vx.hypot(vy);
            if speed > max {
                let scale = max / speed;
                vx *= scale;
                vy *= scale;
            }
        }
        (vx, vy)
    }
}

/// Stage 8: drain the accumulated forces into velocity and advance positions.
///
/// `uniform` is added to every node's force. Pinned nodes keep their
/// position and have their velocity zeroed. Returns the largest speed of
/// any free node after damping.
pub(crate) fn integrate(
    states: &mut [NodeState],
    pinned: &[bool],
    forces: &ForceAccumulator,
    uniform: (f32, f32),
    damping: Damping,
) -> f32 {
    debug_assert_eq!(states.len(), pinned.len());
    debug_assert!(forces.len() >= states.len());

    states
        .par_iter_mut()
        .zip(pinned.par_iter())
        .enumerate()
        .map(|(i, (state, &is_pinned))| {
            let (fx, fy) = forces.take(i);
            if is_pinned {
                state.vx = 0.0;
                state.vy = 0.0;
                return 0.0;
            }

            let (vx, vy) = damping.apply(state.vx + fx + uniform.0, state.vy + fy + uniform.1);
            state.vx = vx;
            state.vy = vy;
            state.x += vx;
            state.y += vy;
            vx.hypot(vy)
        })
        .reduce(|| 0.0, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_CLAMP: Damping = Damping {
        velocity_decay: 0.5,
        max_velocity: None,
    };

    fn accumulator(n: usize) -> ForceAccumulator {
        let mut acc = ForceAccumulator::new(65536.0);
        acc.ensure_capacity(n);
        acc
    }

    #[test]
    fn test_force_then_damping_then_move() {
        let mut states = vec![NodeState { x: 1.0, y: 1.0, vx: 2.0, vy: 0.0 }];
        let forces = accumulator(1);
        forces.add(0, 2.0, 4.0);

        let max_speed = integrate(&mut states, &[false], &forces, (0.0, 0.0), NO_CLAMP);

        // v = (2 + 2, 0 + 4) * 0.5
        assert_eq!(states[0], NodeState { x: 3.0, y: 3.0, vx: 2.0, vy: 2.0 });
        assert!((max_speed - 8.0f32.sqrt()).abs() < 1e-6);
        assert_eq!(forces.peek(0), (0.0, 0.0));
    }

    #[test]
    fn test_uniform_force_applies_to_all() {
        let mut states = vec![NodeState::at(0.0, 0.0), NodeState::at(5.0, 5.0)];
        let forces = accumulator(2);
        integrate(&mut states, &[false, false], &forces, (1.0, -1.0), NO_CLAMP);
        assert_eq!(states[0].position(), crate::Position::new(0.5, -0.5));
        assert_eq!(states[1].position(), crate::Position::new(5.5, 4.5));
    }

    #[test]
    fn test_max_velocity_clamps_magnitude() {
        let mut states = vec![NodeState::at(0.0, 0.0)];
        let forces = accumulator(1);
        forces.add(0, 300.0, 400.0);
        let damping = Damping {
            velocity_decay: 0.0,
            max_velocity: Some(5.0),
        };
        let max_speed = integrate(&mut states, &[false], &forces, (0.0, 0.0), damping);
        assert!((max_speed - 5.0).abs() < 1e-5);
        assert!((states[0].x - 3.0).abs() < 1e-5);
        assert!((states[0].y - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_pinned_node_stays_put() {
        let mut states = vec![NodeState { x: 7.0, y: 8.0, vx: 3.0, vy: 3.0 }];
        let forces = accumulator(1);
        forces.add(0, 100.0, 100.0);
        let max_speed = integrate(&mut states, &[true], &forces, (1.0, 1.0), NO_CLAMP);
        assert_eq!(states[0], NodeState::at(7.0, 8.0));
        assert_eq!(max_speed, 0.0);
        assert_eq!(forces.peek(0), (0.0, 0.0));
    }

    #[test]
    fn test_full_decay_stops_motion() {
        let mut states = vec![NodeState { x: 0.0, y: 0.0, vx: 10.0, vy: 10.0 }];
        let forces = accumulator(1);
        let damping = Damping {
            velocity_decay: 1.0,
            max_velocity: None,
        };
        integrate(&mut states, &[false], &forces, (0.0, 0.0), damping);
        assert_eq!(states[0], NodeState::at(0.0, 0.0));
    }
}

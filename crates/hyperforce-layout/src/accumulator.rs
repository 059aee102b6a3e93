//! Lock-free force accumulation in fixed point.
//!
//! Work-items from the repulsion and attraction stages add into the same
//! per-node slots concurrently. Contributions are scaled into `i64` and
//! summed with `fetch_add`; integer addition is associative, so the total
//! does not depend on the order the worker pool runs them in.

use std::sync::atomic::{AtomicI64, Ordering};

/// Largest magnitude a single contribution may have, in fixed-point units.
/// Leaves room for 2^20 contributions per slot before the sum could wrap.
const MAX_CONTRIBUTION: f64 = (1u64 << 42) as f64;

/// Largest force magnitude a single contribution must carry unclamped.
pub(crate) const MAX_FORCE: f64 = 1e6;

/// Largest `fixed_point_scale` that still represents `MAX_FORCE` exactly.
pub(crate) fn max_scale() -> f64 {
    MAX_CONTRIBUTION / MAX_FORCE
}

pub(crate) struct ForceAccumulator {
    x: Vec<AtomicI64>,
    y: Vec<AtomicI64>,
    scale: f64,
}

impl ForceAccumulator {
    pub(crate) fn new(scale: f64) -> Self {
        Self {
            x: Vec::new(),
            y: Vec::new(),
            scale,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.x.len()
    }

    /// Grow to `n` slots. Returns true if it reallocated.
    pub(crate) fn ensure_capacity(&mut self, n: usize) -> bool {
        if n <= self.x.len() {
            return false;
        }
        self.x = (0..n).map(|_| AtomicI64::new(0)).collect();
        self.y = (0..n).map(|_| AtomicI64::new(0)).collect();
        true
    }

    fn to_fixed(&self, value: f32) -> i64 {
        let scaled = f64::from(value) * self.scale;
        if scaled.is_nan() {
            return 0;
        }
        scaled.clamp(-MAX_CONTRIBUTION, MAX_CONTRIBUTION).round() as i64
    }

    /// Add a force to node `i`. Safe to call from many work-items at once.
    pub(crate) fn add(&self, i: usize, fx: f32, fy: f32) {
        let fx = self.to_fixed(fx);
        let fy = self.to_fixed(fy);
        if fx != 0 {
            self.x[i].fetch_add(fx, Ordering::Relaxed);
        }
        if fy != 0 {
            self.y[i].fetch_add(fy, Ordering::Relaxed);
        }
    }

    /// Current sum for node `i`, without clearing it.
    #[cfg(test)]
    pub(crate) fn peek(&self, i: usize) -> (f32, f32) {
        let fx = self.x[i].load(Ordering::Relaxed) as f64 / self.scale;
        let fy = self.y[i].load(Ordering::Relaxed) as f64 / self.scale;
        (fx as f32, fy as f32)
    }

    /// Read and clear node `i`.
    pub(crate) fn take(&self, i: usize) -> (f32, f32) {
        let fx = self.x[i].swap(0, Ordering::Relaxed) as f64 / self.scale;
        let fy = self.y[i].swap(0, Ordering::Relaxed) as f64 / self.scale;
        (fx as f32, fy as f32)
    }

    pub(crate) fn clear(&mut self) {
        for slot in self.x.iter_mut().chain(self.y.iter_mut()) {
            *slot.get_mut() = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_add_and_take() {
        let mut acc = ForceAccumulator::new(65536.0);
        acc.ensure_capacity(2);
        acc.add(1, 1.5, -0.25);
        acc.add(1, 0.5, -0.25);
        assert_eq!(acc.peek(1), (2.0, -0.5));
        assert_eq!(acc.take(1), (2.0, -0.5));
        assert_eq!(acc.take(1), (0.0, 0.0));
        assert_eq!(acc.take(0), (0.0, 0.0));
    }

    #[test]
    fn test_concurrent_adds_are_exact() {
        let mut acc = ForceAccumulator::new(1024.0);
        acc.ensure_capacity(1);
        (0..10_000).into_par_iter().for_each(|i| {
            let sign = if i % 2 == 0 { 1.0 } else { -0.5 };
            acc.add(0, sign, 0.125);
        });
        // 5000 * 1.0 - 5000 * 0.5
        assert_eq!(acc.take(0), (2500.0, 1250.0));
    }

    #[test]
    fn test_order_independent() {
        let values: Vec<f32> = (0..500).map(|i| (i as f32 * 0.37).sin() * 13.0).collect();

        let mut forward = ForceAccumulator::new(65536.0);
        forward.ensure_capacity(1);
        values.iter().for_each(|&v| forward.add(0, v, -v));

        let mut backward = ForceAccumulator::new(65536.0);
        backward.ensure_capacity(1);
        values.iter().rev().for_each(|&v| backward.add(0, v, -v));

        assert_eq!(forward.take(0), backward.take(0));
    }

    #[test]
    fn test_non_finite_contributions_are_contained() {
        let mut acc = ForceAccumulator::new(65536.0);
        acc.ensure_capacity(1);
        acc.add(0, f32::NAN, f32::INFINITY);
        let (fx, fy) = acc.take(0);
        assert_eq!(fx, 0.0);
        assert!(fy.is_finite() && fy > 0.0);
    }

    #[test]
    fn test_largest_scale_keeps_force_ceiling() {
        let mut acc = ForceAccumulator::new(max_scale());
        acc.ensure_capacity(1);
        acc.add(0, MAX_FORCE as f32, 7.5);
        let (fx, fy) = acc.take(0);
        assert!((f64::from(fx) - MAX_FORCE).abs() < 1.0, "fx {fx}");
        assert!((fy - 7.5).abs() < 1e-6, "fy {fy}");
    }

    #[test]
    fn test_clear() {
        let mut acc = ForceAccumulator::new(2.0);
        acc.ensure_capacity(3);
        acc.add(2, 4.0, 4.0);
        acc.clear();
        assert_eq!(acc.peek(2), (0.0, 0.0));
        assert_eq!(acc.len(), 3);
    }
}

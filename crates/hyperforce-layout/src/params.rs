//! Simulation parameters, engine configuration and the cooldown state machine.

use serde::{Deserialize, Serialize};

use crate::accumulator;
use crate::{LayoutError, Result};

/// Parameters read by every tick; mutated by UI collaborators between ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    /// Barnes-Hut repulsion coefficient.
    pub repulsion_strength: f32,
    /// Spring coefficient pulling hyperedge members toward their centroid.
    pub attraction_strength: f32,
    /// Target distance between a member and its hyperedge centroid.
    pub rest_length: f32,
    /// Drift correction toward (`center_x`, `center_y`).
    pub center_strength: f32,
    pub center_x: f32,
    pub center_y: f32,
    /// Fraction of velocity removed each tick (0-1).
    pub velocity_decay: f32,
    /// Optional clamp on per-tick velocity magnitude.
    pub max_velocity: Option<f32>,
    /// Barnes-Hut opening angle (smaller = more accurate, slower).
    pub theta: f32,
    /// Current energy.
    pub alpha: f32,
    /// Energy the cooldown approaches.
    pub alpha_target: f32,
    /// Fraction of the gap to `alpha_target` closed per tick.
    pub alpha_decay: f32,
    /// At or below this energy the layout is settled.
    pub alpha_min: f32,
    /// Floor alpha is raised to when a node is dragged or the layout reheated.
    pub alpha_reheat: f32,
}

impl Default for SimulationParams {
    fn default() -> Self {
        let alpha_min = 0.001_f32;
        Self {
            repulsion_strength: 30.0,
            attraction_strength: 0.1,
            rest_length: 30.0,
            center_strength: 0.1,
            center_x: 0.0,
            center_y: 0.0,
            velocity_decay: 0.4,
            max_velocity: None,
            theta: 0.9,
            alpha: 1.0,
            alpha_target: 0.0,
            // ~300 ticks from 1.0 down to alpha_min
            alpha_decay: 1.0 - alpha_min.powf(1.0 / 300.0),
            alpha_min,
            alpha_reheat: 0.3,
        }
    }
}

impl SimulationParams {
    /// Check that every parameter is finite and within its domain.
    pub fn validate(&self) -> Result<()> {
        let finite = [
            ("repulsion_strength", self.repulsion_strength),
            ("attraction_strength", self.attraction_strength),
            ("rest_length", self.rest_length),
            ("center_strength", self.center_strength),
            ("center_x", self.center_x),
            ("center_y", self.center_y),
            ("velocity_decay", self.velocity_decay),
            ("theta", self.theta),
            ("alpha", self.alpha),
            ("alpha_target", self.alpha_target),
            ("alpha_decay", self.alpha_decay),
            ("alpha_min", self.alpha_min),
            ("alpha_reheat", self.alpha_reheat),
        ];
        if let Some((name, value)) = finite.iter().find(|(_, v)| !v.is_finite()) {
            return Err(LayoutError::InvalidParams(format!(
                "{name} must be finite, got {value}"
            )));
        }

        let non_negative = [
            ("repulsion_strength", self.repulsion_strength),
            ("attraction_strength", self.attraction_strength),
            ("rest_length", self.rest_length),
            ("center_strength", self.center_strength),
            ("theta", self.theta),
            ("alpha", self.alpha),
            ("alpha_target", self.alpha_target),
            ("alpha_min", self.alpha_min),
            ("alpha_reheat", self.alpha_reheat),
        ];
        if let Some((name, value)) = non_negative.iter().find(|(_, v)| *v < 0.0) {
            return Err(LayoutError::InvalidParams(format!(
                "{name} must be non-negative, got {value}"
            )));
        }

        for (name, value) in [
            ("velocity_decay", self.velocity_decay),
            ("alpha_decay", self.alpha_decay),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(LayoutError::InvalidParams(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        if self.alpha_reheat <= self.alpha_min {
            return Err(LayoutError::InvalidParams(format!(
                "alpha_reheat ({}) must exceed alpha_min ({})",
                self.alpha_reheat, self.alpha_min
            )));
        }

        if let Some(max) = self.max_velocity {
            if !max.is_finite() || max <= 0.0 {
                return Err(LayoutError::InvalidParams(format!(
                    "max_velocity must be positive, got {max}"
                )));
            }
        }

        Ok(())
    }

    /// Advance the cooldown by one tick.
    pub fn decay_alpha(&mut self) {
        self.alpha += (self.alpha_target - self.alpha) * self.alpha_decay;
    }

    /// Raise alpha to at least the reheat floor.
    pub fn reheat(&mut self) {
        self.alpha = self.alpha.max(self.alpha_reheat);
    }

    pub fn is_settled(&self) -> bool {
        self.alpha <= self.alpha_min
    }

    pub fn state(&self) -> LayoutState {
        if self.is_settled() {
            LayoutState::Settled
        } else if self.alpha >= self.alpha_reheat {
            LayoutState::Hot
        } else {
            LayoutState::Cooling
        }
    }

    /// Number of ticks until alpha reaches `alpha_min` from its current value.
    ///
    /// Returns `None` when the cooldown never gets there (target above the
    /// minimum, or no decay at all).
    pub fn ticks_to_settle(&self) -> Option<u32> {
        if self.is_settled() {
            return Some(0);
        }
        if self.alpha_target >= self.alpha_min || self.alpha_decay <= 0.0 {
            return None;
        }
        if self.alpha_decay >= 1.0 {
            return Some(1);
        }

        // alpha_k - target = (alpha_0 - target) * (1 - decay)^k
        let gap = f64::from(self.alpha - self.alpha_target);
        let goal = f64::from(self.alpha_min - self.alpha_target);
        let ratio = 1.0 - f64::from(self.alpha_decay);
        let ticks = (goal / gap).ln() / ratio.ln();
        Some(ticks.ceil().max(1.0) as u32)
    }
}

/// Energy state of a loaded dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutState {
    /// High energy: alpha at or above the reheat floor.
    Hot,
    /// Alpha decaying toward its target.
    Cooling,
    /// Alpha at or below `alpha_min`; ticks are no-ops.
    Settled,
}

impl std::fmt::Display for LayoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Hot => "hot",
            Self::Cooling => "cooling",
            Self::Settled => "settled",
        };
        f.write_str(name)
    }
}

/// Engine tunables that stay fixed for the lifetime of an engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Worker threads (0 = one per core).
    pub threads: usize,
    /// Elements per radix-sort work partition.
    pub sort_partition_size: usize,
    /// Ticks between asynchronous bounds readbacks.
    pub bounds_refresh_interval: u32,
    /// Padding added on each side of the bounds, as a fraction of their extent.
    pub bounds_padding: f32,
    /// Float-to-integer scale of the force accumulator.
    pub fixed_point_scale: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            sort_partition_size: 4096,
            bounds_refresh_interval: 8,
            bounds_padding: 0.1,
            fixed_point_scale: 65536.0,
        }
    }
}

impl LayoutConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sort_partition_size == 0 {
            return Err(LayoutError::InvalidConfig(
                "sort_partition_size must be at least 1".into(),
            ));
        }
        if self.bounds_refresh_interval == 0 {
            return Err(LayoutError::InvalidConfig(
                "bounds_refresh_interval must be at least 1".into(),
            ));
        }
        if !self.bounds_padding.is_finite() || self.bounds_padding < 0.0 {
            return Err(LayoutError::InvalidConfig(format!(
                "bounds_padding must be a non-negative fraction, got {}",
                self.bounds_padding
            )));
        }
        if !self.fixed_point_scale.is_finite() || self.fixed_point_scale <= 0.0 {
            return Err(LayoutError::InvalidConfig(format!(
                "fixed_point_scale must be positive, got {}",
                self.fixed_point_scale
            )));
        }
        let max_scale = accumulator::max_scale();
        if self.fixed_point_scale > max_scale {
            return Err(LayoutError::InvalidConfig(format!(
                "fixed_point_scale must be at most {max_scale:.0} so forces up to {} are representable, got {}",
                accumulator::MAX_FORCE,
                self.fixed_point_scale
            )));
        }
        Ok(())
    }
}

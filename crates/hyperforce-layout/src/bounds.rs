//! Bounding box used for Morton key generation, and the asynchronous tracker
//! that refreshes it off the critical path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::NodeState;

/// Smallest extent either axis of a bounding box may have.
pub(crate) const MIN_EXTENT: f32 = 1.0;

/// Axis-aligned bounding box, always at least `MIN_EXTENT` wide on each axis
/// once it has been through [`Bounds::normalized`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min_x: -0.5 * MIN_EXTENT,
            min_y: -0.5 * MIN_EXTENT,
            max_x: 0.5 * MIN_EXTENT,
            max_y: 0.5 * MIN_EXTENT,
        }
    }
}

impl Bounds {
    /// Fold points into a box, discarding non-finite coordinates.
    ///
    /// Returns the default unit box when no finite point exists.
    pub fn from_points(points: impl IntoIterator<Item = (f32, f32)>) -> Self {
        let mut min_x = f32::INFINITY;
        let mut min_y = f32::INFINITY;
        let mut max_x = f32::NEG_INFINITY;
        let mut max_y = f32::NEG_INFINITY;

        for (x, y) in points {
            if !(x.is_finite() && y.is_finite()) {
                continue;
            }
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        if min_x > max_x {
            return Self::default();
        }

        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub(crate) fn from_states(states: &[NodeState]) -> Self {
        Self::from_points(states.iter().map(|s| (s.x, s.y)))
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> (f32, f32) {
        (
            0.5 * (self.min_x + self.max_x),
            0.5 * (self.min_y + self.max_y),
        )
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Pad each axis by `fraction` of its extent on both sides.
    pub fn padded(&self, fraction: f32) -> Self {
        let pad_x = self.width() * fraction;
        let pad_y = self.height() * fraction;
        Self {
            min_x: self.min_x - pad_x,
            min_y: self.min_y - pad_y,
            max_x: self.max_x + pad_x,
            max_y: self.max_y + pad_y,
        }
    }

    /// Grow each axis around its center to at least `MIN_EXTENT`.
    pub fn normalized(&self) -> Self {
        let (cx, cy) = self.center();
        let half_w = 0.5 * self.width().max(MIN_EXTENT);
        let half_h = 0.5 * self.height().max(MIN_EXTENT);
        Self {
            min_x: cx - half_w,
            min_y: cy - half_h,
            max_x: cx + half_w,
            max_y: cy + half_h,
        }
    }

    /// The box the key generator uses for a set of states.
    pub(crate) fn for_keys(states: &[NodeState], padding: f32) -> Self {
        Self::from_states(states).padded(padding).normalized()
    }
}

/// Result of a finished background readback.
struct BoundsReadback {
    generation: u64,
    bounds: Bounds,
    /// Returned so the next readback can reuse the allocation.
    staging: Vec<NodeState>,
}

/// Periodically recomputes the bounding box from a staging copy of the node
/// state on the worker pool.
///
/// At most one readback is in flight at any time. Results land in a
/// single-slot mailbox that the engine drains at the start of a tick, so a
/// tick never waits on a readback.
pub(crate) struct BoundsTracker {
    interval: u32,
    padding: f32,
    ticks_since_request: u32,
    generation: u64,
    in_flight: Arc<AtomicBool>,
    mailbox: Arc<Mutex<Option<BoundsReadback>>>,
    staging: Vec<NodeState>,
}

fn lock_mailbox(
    mailbox: &Mutex<Option<BoundsReadback>>,
) -> MutexGuard<'_, Option<BoundsReadback>> {
    mailbox
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl BoundsTracker {
    pub(crate) fn new(interval: u32, padding: f32) -> Self {
        Self {
            interval,
            padding,
            ticks_since_request: 0,
            generation: 0,
            in_flight: Arc::new(AtomicBool::new(false)),
            mailbox: Arc::new(Mutex::new(None)),
            staging: Vec::new(),
        }
    }

    /// Forget readbacks issued for a previous dataset.
    pub(crate) fn reset(&mut self) {
        self.generation += 1;
        self.ticks_since_request = 0;
        lock_mailbox(&self.mailbox).take();
    }

    pub(crate) fn padding(&self) -> f32 {
        self.padding
    }

    pub(crate) fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Take a finished readback for the current dataset, if one arrived.
    pub(crate) fn poll(&mut self) -> Option<Bounds> {
        let readback = lock_mailbox(&self.mailbox).take()?;

        if self.staging.capacity() < readback.staging.capacity() {
            self.staging = readback.staging;
        }

        if readback.generation != self.generation {
            tracing::warn!(
                "Discarding bounds readback from dataset generation {} (current {})",
                readback.generation,
                self.generation
            );
            return None;
        }

        Some(readback.bounds)
    }

    /// Count a tick and issue a readback once the refresh interval elapsed.
    ///
    /// Returns true if a readback was issued.
    pub(crate) fn on_tick(&mut self, pool: &rayon::ThreadPool, states: &[NodeState]) -> bool {
        self.ticks_since_request = self.ticks_since_request.saturating_add(1);
        if self.ticks_since_request < self.interval {
            return false;
        }
        self.request(pool, states)
    }

    /// Issue a readback now unless one is already in flight.
    pub(crate) fn request(&mut self, pool: &rayon::ThreadPool, states: &[NodeState]) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.ticks_since_request = 0;

        let mut staging = std::mem::take(&mut self.staging);
        staging.clear();
        staging.extend_from_slice(states);

        let generation = self.generation;
        let padding = self.padding;
        let in_flight = Arc::clone(&self.in_flight);
        let mailbox = Arc::clone(&self.mailbox);

        pool.spawn(move || {
            let bounds = Bounds::for_keys(&staging, padding);
            *lock_mailbox(&mailbox) = Some(BoundsReadback {
                generation,
                bounds,
                staging,
            });
            in_flight.store(false, Ordering::Release);
        });

        true
    }
}

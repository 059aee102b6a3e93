//! Parallel force-directed layout for hypergraphs.
//!
//! This crate animates the nodes of a hypergraph into a stable 2D layout. Every
//! tick runs a fixed pipeline of data-parallel stages on a dedicated worker
//! pool; each stage finishes completely before the next one starts.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          Spatial ordering                            │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐   ┌────────┐  │
//! │  │ Morton keys │───▶│ Radix sort  │───▶│ Tree build  │──▶│Summary │  │
//! │  │ (Z-order)   │    │ (4×8 bits)  │    │  (leaves)   │   │(levels)│  │
//! │  └─────────────┘    └─────────────┘    └─────────────┘   └────────┘  │
//! └──────────────────────────────────────────────────────────────────────┘
//!                                   │
//!                                   ▼
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                               Forces                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐   ┌────────┐  │
//! │  │  Repulsion  │───▶│  Attraction │───▶│   Center    │──▶│Integr. │  │
//! │  │ (BH approx) │    │ (hyperedge) │    │  (drift)    │   │+ alpha │  │
//! │  └─────────────┘    └─────────────┘    └─────────────┘   └────────┘  │
//! └──────────────────────────────────────────────────────────────────────┘
//!                                   │
//!                                   ▼
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                   Bounds tracker / readback (async)                  │
//! │  Staging copy of positions reduced off the critical path             │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Forces from concurrent work-items land in a fixed-point atomic
//! accumulator, so a tick produces the same result regardless of how the
//! worker pool interleaves them.
//!
//! ## Performance
//!
//! - Exact pairwise repulsion: O(n²) per tick
//! - Barnes-Hut over a Morton-ordered complete quadtree: O(n log n) per tick
//! - Hyperedge attraction uses a star around the member centroid: O(Σ|e|)

mod accumulator;
mod attraction;
mod bounds;
mod center;
mod error;
mod integrator;
mod layout;
mod morton;
mod params;
mod quadtree;
mod radix;
mod readback;
mod repulsion;
mod topology;

pub use bounds::Bounds;
pub use error::LayoutError;
pub use layout::{LayoutEngine, LayoutObserver, StageTimings, TickReport};
pub use morton::{deinterleave, encode as morton_encode, interleave, MORTON_RESOLUTION};
pub use params::{LayoutConfig, LayoutState, SimulationParams};
pub use quadtree::{QuadTree, TreeCell, TreeGeometry};
pub use radix::RadixSorter;
pub use readback::PositionsReadback;
pub use topology::Hypergraph;

#[cfg(not(target_arch = "wasm32"))]
pub use layout::sync;

/// Result type for layout operations.
pub type Result<T> = std::result::Result<T, LayoutError>;

/// A 2D position.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable, serde::Serialize,
    serde::Deserialize,
)]
#[repr(C)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn distance(&self, other: Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Per-node simulation state: position and velocity.
///
/// Laid out as four packed `f32` so the whole buffer can be handed to a
/// renderer with `bytemuck::cast_slice`.
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct NodeState {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
}

impl NodeState {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            vx: 0.0,
            vy: 0.0,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

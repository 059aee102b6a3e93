//! Error types for layout operations.

use thiserror::Error;

/// Errors that can occur during layout operations.
#[derive(Error, Debug)]
pub enum LayoutError {
    /// Failed to build the worker pool that executes the tick stages.
    #[error("worker pool initialization failed: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// The CSR hyperedge structure is malformed.
    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    /// A hyperedge references a node that does not exist.
    #[error("hyperedge {edge} references node {member}, but only {node_count} nodes exist")]
    MemberOutOfRange {
        edge: usize,
        member: u32,
        node_count: u32,
    },

    /// A node index passed by a collaborator is out of range.
    #[error("node {node} is out of range for {node_count} nodes")]
    NodeOutOfRange { node: u32, node_count: u32 },

    /// A collaborator supplied a NaN or infinite coordinate.
    #[error("node {node} was given a non-finite position ({x}, {y})")]
    NonFinitePosition { node: u32, x: f32, y: f32 },

    /// Initial positions do not match the topology's node count.
    #[error("expected {expected} initial positions, got {actual}")]
    PositionCountMismatch { expected: usize, actual: usize },

    /// Simulation parameters failed validation.
    #[error("invalid simulation parameters: {0}")]
    InvalidParams(String),

    /// Engine configuration failed validation.
    #[error("invalid layout configuration: {0}")]
    InvalidConfig(String),

    /// A position readback could not be completed.
    #[error("position readback failed: {0}")]
    Readback(String),

    /// Layout not initialized.
    #[error("layout not initialized")]
    NotInitialized,
}

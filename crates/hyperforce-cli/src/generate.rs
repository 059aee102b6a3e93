//! Random hypergraph generation for runs and benchmarks.

use anyhow::{Context, Result};
use hyperforce_layout::Hypergraph;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Shape of a generated hypergraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorSpec {
    pub nodes: u32,
    pub edges: u32,
    /// Largest hyperedge; sizes are drawn uniformly from `2..=max_edge_size`.
    pub max_edge_size: u32,
    pub seed: u64,
}

/// Build a hypergraph whose hyperedges have distinct members.
///
/// The same `GeneratorSpec` always yields the same hypergraph.
pub fn random_hypergraph(spec: GeneratorSpec) -> Result<Hypergraph> {
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let nodes = spec.nodes as usize;
    let max_size = (spec.max_edge_size as usize).min(nodes);
    let min_size = 2.min(max_size);

    let edges: Vec<Vec<u32>> = (0..spec.edges)
        .map(|_| {
            if max_size == 0 {
                return Vec::new();
            }
            let size = rng.random_range(min_size..=max_size);
            rand::seq::index::sample(&mut rng, nodes, size)
                .into_iter()
                .map(|i| i as u32)
                .collect()
        })
        .collect();

    tracing::debug!(
        "Generated hypergraph: {} nodes, {} hyperedges, seed {}",
        spec.nodes,
        spec.edges,
        spec.seed
    );

    Hypergraph::from_edges(spec.nodes, edges).context("Generated an invalid hypergraph")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(nodes: u32, edges: u32, max_edge_size: u32) -> GeneratorSpec {
        GeneratorSpec {
            nodes,
            edges,
            max_edge_size,
            seed: 1,
        }
    }

    #[test]
    fn test_sizes_and_distinct_members() {
        let graph = random_hypergraph(spec(100, 300, 6)).unwrap();
        assert_eq!(graph.node_count(), 100);
        assert_eq!(graph.edge_count(), 300);
        for members in graph.edges() {
            assert!((2..=6).contains(&members.len()));
            let mut sorted = members.to_vec();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), members.len());
        }
    }

    #[test]
    fn test_same_seed_same_graph() {
        let a = random_hypergraph(spec(50, 40, 5)).unwrap();
        let b = random_hypergraph(spec(50, 40, 5)).unwrap();
        let c = random_hypergraph(GeneratorSpec { seed: 2, ..spec(50, 40, 5) }).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_tiny_node_counts() {
        let graph = random_hypergraph(spec(1, 3, 8)).unwrap();
        assert!(graph.edges().all(|m| m.len() == 1));

        let graph = random_hypergraph(spec(0, 2, 8)).unwrap();
        assert_eq!(graph.incidence_count(), 0);
    }
}

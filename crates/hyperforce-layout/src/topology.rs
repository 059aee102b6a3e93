//! Hyperedge topology stored as compressed sparse rows.
//!
//! `members[offsets[e]..offsets[e + 1]]` are the nodes of hyperedge `e`. The
//! structure is immutable once built; reloading a dataset builds a new one.

use serde::{Deserialize, Serialize};

use crate::{LayoutError, Result};

/// A hypergraph in CSR form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CsrParts")]
pub struct Hypergraph {
    node_count: u32,
    offsets: Vec<u32>,
    members: Vec<u32>,
}

/// Unvalidated CSR fields, so deserialized topologies go through `validate`.
#[derive(Deserialize)]
struct CsrParts {
    node_count: u32,
    offsets: Vec<u32>,
    members: Vec<u32>,
}

impl TryFrom<CsrParts> for Hypergraph {
    type Error = LayoutError;

    fn try_from(parts: CsrParts) -> Result<Self> {
        Self::new(parts.node_count, parts.offsets, parts.members)
    }
}

impl Hypergraph {
    /// Wrap an existing CSR structure after validating it.
    pub fn new(node_count: u32, offsets: Vec<u32>, members: Vec<u32>) -> Result<Self> {
        let graph = Self {
            node_count,
            offsets,
            members,
        };
        graph.validate()?;
        Ok(graph)
    }

    /// A hypergraph with nodes and no hyperedges.
    pub fn empty(node_count: u32) -> Self {
        Self {
            node_count,
            offsets: vec![0],
            members: Vec::new(),
        }
    }

    /// Build the CSR from per-edge member lists.
    pub fn from_edges<I, E>(node_count: u32, edges: I) -> Result<Self>
    where
        I: IntoIterator<Item = E>,
        E: AsRef<[u32]>,
    {
        let mut offsets = vec![0u32];
        let mut members = Vec::new();

        for edge in edges {
            members.extend_from_slice(edge.as_ref());
            let end = u32::try_from(members.len()).map_err(|_| {
                LayoutError::InvalidTopology("more than u32::MAX incidences".into())
            })?;
            offsets.push(end);
        }

        Self::new(node_count, offsets, members)
    }

    fn validate(&self) -> Result<()> {
        let Some(&first) = self.offsets.first() else {
            return Err(LayoutError::InvalidTopology(
                "offsets must contain at least one entry".into(),
            ));
        };
        if first != 0 {
            return Err(LayoutError::InvalidTopology(format!(
                "offsets must start at 0, found {first}"
            )));
        }

        if let Some(e) = self.offsets.windows(2).position(|w| w[0] > w[1]) {
            return Err(LayoutError::InvalidTopology(format!(
                "offsets decrease at edge {e} ({} > {})",
                self.offsets[e],
                self.offsets[e + 1]
            )));
        }

        let last = self.offsets[self.offsets.len() - 1] as usize;
        if last != self.members.len() {
            return Err(LayoutError::InvalidTopology(format!(
                "final offset {last} does not match {} members",
                self.members.len()
            )));
        }

        for (edge, members) in self.edges().enumerate() {
            if let Some(&member) = members.iter().find(|&&m| m >= self.node_count) {
                return Err(LayoutError::MemberOutOfRange {
                    edge,
                    member,
                    node_count: self.node_count,
                });
            }
        }

        Ok(())
    }

    pub fn node_count(&self) -> u32 {
        self.node_count
    }

    pub fn edge_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Total number of (edge, member) incidences.
    pub fn incidence_count(&self) -> usize {
        self.members.len()
    }

    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    pub fn members(&self) -> &[u32] {
        &self.members
    }

    /// Members of hyperedge `e`.
    ///
    /// # Panics
    /// Panics if `e >= edge_count()`.
    pub fn edge(&self, e: usize) -> &[u32] {
        let start = self.offsets[e] as usize;
        let end = self.offsets[e + 1] as usize;
        &self.members[start..end]
    }

    /// Iterate over the member slices of every hyperedge.
    pub fn edges(&self) -> impl ExactSizeIterator<Item = &[u32]> + '_ {
        self.offsets
            .windows(2)
            .map(move |w| &self.members[w[0] as usize..w[1] as usize])
    }

    /// Nodes sharing at least one hyperedge with `node`, sorted and deduplicated.
    pub fn neighbors(&self, node: u32) -> Vec<u32> {
        let mut out: Vec<u32> = self
            .edges()
            .filter(|members| members.contains(&node))
            .flat_map(|members| members.iter().copied())
            .filter(|&m| m != node)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_edges_builds_csr() {
        let graph = Hypergraph::from_edges(5, [vec![0, 1, 2], vec![2, 3], vec![]]).unwrap();
        assert_eq!(graph.offsets(), &[0, 3, 5, 5]);
        assert_eq!(graph.members(), &[0, 1, 2, 2, 3]);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.edge(1), &[2, 3]);
        assert!(graph.edge(2).is_empty());
        assert_eq!(graph.incidence_count(), 5);
    }

    #[test]
    fn test_empty_topology() {
        let graph = Hypergraph::empty(10);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.edges().count(), 0);
        assert!(graph.neighbors(3).is_empty());
    }

    #[test]
    fn test_rejects_decreasing_offsets() {
        let err = Hypergraph::new(4, vec![0, 3, 2], vec![0, 1, 2]).unwrap_err();
        assert!(matches!(err, LayoutError::InvalidTopology(_)));
    }

    #[test]
    fn test_rejects_bad_final_offset() {
        let err = Hypergraph::new(4, vec![0, 2], vec![0, 1, 2]).unwrap_err();
        assert!(matches!(err, LayoutError::InvalidTopology(_)));
    }

    #[test]
    fn test_rejects_nonzero_first_offset() {
        let err = Hypergraph::new(4, vec![1, 2], vec![0, 1]).unwrap_err();
        assert!(matches!(err, LayoutError::InvalidTopology(_)));
    }

    #[test]
    fn test_rejects_member_out_of_range() {
        let err = Hypergraph::from_edges(3, [vec![0, 1], vec![2, 3]]).unwrap_err();
        match err {
            LayoutError::MemberOutOfRange {
                edge,
                member,
                node_count,
            } => {
                assert_eq!(edge, 1);
                assert_eq!(member, 3);
                assert_eq!(node_count, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_neighbors() {
        let graph = Hypergraph::from_edges(6, [vec![0, 1, 2], vec![2, 3], vec![4, 5]]).unwrap();
        assert_eq!(graph.neighbors(2), vec![0, 1, 3]);
        assert_eq!(graph.neighbors(4), vec![5]);
    }
}

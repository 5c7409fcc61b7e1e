//! Failed-link sets

use crate::{Result, RoutingError};
use clos_fabric::{ClosTopology, EdgeId, NodeId};

/// Links that are down for one scenario, indexed by canonical edge id.
/// An undirected edge is down in both directions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureSet {
    down: Vec<bool>,
    count: usize,
}

impl FailureSet {
    /// No failed links
    pub fn empty(topology: &ClosTopology) -> Self {
        Self {
            down: vec![false; topology.edge_count()],
            count: 0,
        }
    }

    /// Mark the given node pairs as failed. Either orientation is accepted;
    /// duplicates are collapsed.
    pub fn from_edges<I>(topology: &ClosTopology, edges: I) -> Result<Self>
    where
        I: IntoIterator<Item = (NodeId, NodeId)>,
    {
        let mut set = Self::empty(topology);
        for (u, v) in edges {
            let edge = topology
                .edge_id(u, v)
                .ok_or(RoutingError::NotAnEdge { from: u, to: v })?;
            set.insert(edge)?;
        }
        Ok(set)
    }

    /// Mark the given canonical edges as failed
    pub fn from_edge_ids<I>(topology: &ClosTopology, edges: I) -> Result<Self>
    where
        I: IntoIterator<Item = EdgeId>,
    {
        let mut set = Self::empty(topology);
        for edge in edges {
            set.insert(edge)?;
        }
        Ok(set)
    }

    fn insert(&mut self, edge: EdgeId) -> Result<()> {
        let edge_count = self.down.len();
        let slot = self
            .down
            .get_mut(edge.index())
            .ok_or(RoutingError::EdgeOutOfRange { edge: edge.0, edge_count })?;
        if !*slot {
            *slot = true;
            self.count += 1;
        }
        Ok(())
    }

    #[inline]
    pub fn contains(&self, edge: EdgeId) -> bool {
        self.down.get(edge.index()).copied().unwrap_or(false)
    }

    /// Whether the link between `u` and `v` is down. Pairs that are not
    /// links of the fabric are never down.
    #[inline]
    pub fn is_down(&self, topology: &ClosTopology, u: NodeId, v: NodeId) -> bool {
        topology.edge_id(u, v).is_some_and(|e| self.contains(e))
    }

    /// Number of failed undirected links
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.down
            .iter()
            .enumerate()
            .filter(|(_, &d)| d)
            .map(|(i, _)| EdgeId(i as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_orientations() {
        let fabric = ClosTopology::new(4).unwrap();
        let agg = fabric.aggregation(1);
        let acc = fabric.access(0);

        let failures = FailureSet::from_edges(&fabric, [(acc, agg), (agg, acc)]).unwrap();
        assert_eq!(failures.len(), 1);
        assert!(failures.is_down(&fabric, agg, acc));
        assert!(failures.is_down(&fabric, acc, agg));
        assert!(!failures.is_down(&fabric, fabric.aggregation(0), acc));
        assert_eq!(failures.iter().collect::<Vec<_>>(), vec![fabric.edge_id(agg, acc).unwrap()]);
    }

    #[test]
    fn test_rejects_non_links() {
        let fabric = ClosTopology::new(4).unwrap();
        let err = FailureSet::from_edges(&fabric, [(fabric.access(0), fabric.access(1))]).unwrap_err();
        assert!(matches!(err, RoutingError::NotAnEdge { .. }));
        assert!(FailureSet::empty(&fabric).is_empty());
    }

    #[test]
    fn test_edge_ids_checked_against_fabric() {
        let fabric = ClosTopology::new(4).unwrap();
        let failures = FailureSet::from_edge_ids(&fabric, [EdgeId(0), EdgeId(31), EdgeId(0)]).unwrap();
        assert_eq!(failures.len(), 2);

        let err = FailureSet::from_edge_ids(&fabric, [EdgeId(3), EdgeId(32)]).unwrap_err();
        assert!(matches!(err, RoutingError::EdgeOutOfRange { edge: 32, edge_count: 32 }));
    }
}

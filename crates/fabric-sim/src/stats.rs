//! Link and node load accounting
//!
//! Loads are fixed-size arrays indexed by edge id and node id, so untouched
//! elements are already present as zeros when a batch is summarised.

use crate::Result;
use arbor_routing::{RouteOutcome, RoutingError};
use clos_fabric::ClosTopology;
use serde::{Deserialize, Serialize};

/// Value at `fraction` (0..=1) of an ascending slice, interpolating linearly
/// between the two closest ranks. Empty input gives 0.
pub fn percentile(sorted: &[f64], fraction: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (sorted.len() - 1) as f64 * fraction.clamp(0.0, 1.0);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    sorted[lo] * (hi as f64 - rank) + sorted[hi] * (rank - lo as f64)
}

/// Distribution summary of one load vector
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LoadSummary {
    pub max: f64,
    pub second: f64,
    pub p9999: f64,
    pub p9995: f64,
    pub p999: f64,
    pub p99: f64,
    pub p95: f64,
    pub p90: f64,
    pub p50: f64,
    pub p10: f64,
    pub mean: f64,
}

impl LoadSummary {
    /// Summarise `values`, left-padding with zeros up to `theoretical_count`
    /// so elements that carried nothing still count.
    pub fn from_loads(values: &[f64], theoretical_count: usize) -> Self {
        let mut sorted = Vec::with_capacity(values.len().max(theoretical_count));
        sorted.resize(theoretical_count.saturating_sub(values.len()), 0.0);
        sorted.extend_from_slice(values);
        sorted.sort_by(|a, b| a.total_cmp(b));

        let n = sorted.len();
        if n == 0 {
            return Self::default();
        }
        Self {
            max: sorted[n - 1],
            second: if n >= 2 { sorted[n - 2] } else { 0.0 },
            p9999: percentile(&sorted, 0.9999),
            p9995: percentile(&sorted, 0.9995),
            p999: percentile(&sorted, 0.999),
            p99: percentile(&sorted, 0.99),
            p95: percentile(&sorted, 0.95),
            p90: percentile(&sorted, 0.90),
            p50: percentile(&sorted, 0.50),
            p10: percentile(&sorted, 0.10),
            mean: sorted.iter().sum::<f64>() / n as f64,
        }
    }
}

/// Accumulated load of one batch (or one worker's share of it)
#[derive(Debug, Clone, PartialEq)]
pub struct LoadStatistics {
    edge_loads: Vec<f64>,
    node_loads: Vec<f64>,
    /// Queries recorded, loops included
    pub routed: usize,
    pub loops: usize,
    /// Hops summed over delivered queries
    pub total_hops: usize,
    pub max_hops: usize,
}

impl LoadStatistics {
    pub fn new(topology: &ClosTopology) -> Self {
        Self {
            edge_loads: vec![0.0; topology.edge_count()],
            node_loads: vec![0.0; topology.node_count()],
            routed: 0,
            loops: 0,
            total_hops: 0,
            max_hops: 0,
        }
    }

    /// Fold one route carrying `weight` into the totals.
    ///
    /// A looping route is only counted. A delivered route charges `weight`
    /// to every link it crosses and to every node it passes through,
    /// destination included.
    pub fn record(&mut self, topology: &ClosTopology, outcome: &RouteOutcome, weight: f64) -> Result<()> {
        self.routed += 1;
        if outcome.has_cycle {
            self.loops += 1;
            return Ok(());
        }

        let hops = outcome.hop_count();
        self.total_hops += hops;
        self.max_hops = self.max_hops.max(hops);

        for (u, v) in outcome.links() {
            let edge = topology
                .edge_id(u, v)
                .ok_or(RoutingError::NotAnEdge { from: u, to: v })?;
            self.edge_loads[edge.index()] += weight;
            self.node_loads[u.index()] += weight;
        }
        if let (true, Some(last)) = (hops > 0, outcome.hop_list.last()) {
            self.node_loads[last.index()] += weight;
        }
        Ok(())
    }

    /// Add another accumulator over the same fabric
    pub fn merge(mut self, other: Self) -> Self {
        for (a, b) in self.edge_loads.iter_mut().zip(other.edge_loads) {
            *a += b;
        }
        for (a, b) in self.node_loads.iter_mut().zip(other.node_loads) {
            *a += b;
        }
        self.routed += other.routed;
        self.loops += other.loops;
        self.total_hops += other.total_hops;
        self.max_hops = self.max_hops.max(other.max_hops);
        self
    }

    pub fn edge_loads(&self) -> &[f64] {
        &self.edge_loads
    }

    pub fn node_loads(&self) -> &[f64] {
        &self.node_loads
    }

    pub fn delivered(&self) -> usize {
        self.routed - self.loops
    }

    pub fn edge_summary(&self) -> LoadSummary {
        LoadSummary::from_loads(&self.edge_loads, self.edge_loads.len())
    }

    pub fn node_summary(&self) -> LoadSummary {
        LoadSummary::from_loads(&self.node_loads, self.node_loads.len())
    }

    /// Mean hop count over delivered queries; 0 when nothing was delivered
    pub fn average_hops(&self) -> f64 {
        match self.delivered() {
            0 => 0.0,
            n => self.total_hops as f64 / n as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_routing::{fixtures, Algorithm, FailureSet, RelabelCache, RoutingEngine};
    use clos_fabric::{NodeId, Variant};
    use std::sync::Arc;

    fn engine() -> (Arc<ClosTopology>, RoutingEngine) {
        let fabric = Arc::new(ClosTopology::new(4).unwrap());
        let trees = Arc::new(fixtures::arborescences(&fabric, 2).unwrap());
        let engine = RoutingEngine::new(Arc::clone(&fabric), trees).unwrap();
        (fabric, engine)
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [0.0, 10.0, 20.0, 30.0, 40.0];
        assert_eq!(percentile(&sorted, 0.0), 0.0);
        assert_eq!(percentile(&sorted, 1.0), 40.0);
        assert_eq!(percentile(&sorted, 0.5), 20.0);
        assert!((percentile(&sorted, 0.9) - 36.0).abs() < 1e-9);
        assert_eq!(percentile(&[], 0.5), 0.0);
        assert_eq!(percentile(&[7.0], 0.99), 7.0);
    }

    #[test]
    fn test_summary_pads_with_zeros() {
        let summary = LoadSummary::from_loads(&[3.0, 1.0], 4);
        assert_eq!(summary.max, 3.0);
        assert_eq!(summary.second, 1.0);
        assert_eq!(summary.mean, 1.0);
        assert_eq!(summary.p10, 0.0);
        assert_eq!(LoadSummary::from_loads(&[], 0), LoadSummary::default());
    }

    #[test]
    fn test_single_demand_round_trip() {
        let (fabric, engine) = engine();
        let cache = RelabelCache::new(Arc::clone(&fabric));
        let map = cache.get(0, Variant::FixedCore).unwrap();
        let failures = FailureSet::empty(&fabric);

        let outcome = engine
            .route(Algorithm::DetCirc, fabric.access(3), fabric.access(0), &failures, &map)
            .unwrap();
        assert!(!outcome.has_cycle);
        assert_eq!(outcome.hop_count(), 4);

        let mut stats = LoadStatistics::new(&fabric);
        stats.record(&fabric, &outcome, 2.5).unwrap();

        let edge_total: f64 = stats.edge_loads().iter().sum();
        let node_total: f64 = stats.node_loads().iter().sum();
        assert_eq!(edge_total, 2.5 * outcome.hop_count() as f64);
        assert_eq!(node_total, 2.5 * outcome.hop_list.len() as f64);
        assert_eq!(stats.average_hops(), 4.0);
        assert_eq!(stats.edge_summary().max, 2.5);
    }

    #[test]
    fn test_loops_carry_no_load() {
        let fabric = ClosTopology::new(4).unwrap();
        let looping = RouteOutcome {
            has_cycle: true,
            hop_list: vec![fabric.access(2), fabric.aggregation(2), fabric.access(2)],
            switch_count: 4,
            detour_edges: Vec::new(),
        };

        let mut stats = LoadStatistics::new(&fabric);
        stats.record(&fabric, &looping, 1.0).unwrap();
        assert_eq!((stats.routed, stats.loops, stats.delivered()), (1, 1, 0));
        assert!(stats.edge_loads().iter().all(|&l| l == 0.0));
        assert_eq!(stats.average_hops(), 0.0);
    }

    #[test]
    fn test_rejects_non_links() {
        let fabric = ClosTopology::new(4).unwrap();
        let bogus = RouteOutcome {
            has_cycle: false,
            hop_list: vec![fabric.access(0), NodeId(0)],
            switch_count: 0,
            detour_edges: Vec::new(),
        };
        let mut stats = LoadStatistics::new(&fabric);
        assert!(stats.record(&fabric, &bogus, 1.0).is_err());
    }

    #[test]
    fn test_merge_adds_partials() {
        let (fabric, engine) = engine();
        let cache = RelabelCache::new(Arc::clone(&fabric));
        let map = cache.get(0, Variant::FixedCore).unwrap();
        let failures = FailureSet::empty(&fabric);

        let mut a = LoadStatistics::new(&fabric);
        let mut b = LoadStatistics::new(&fabric);
        for (stats, source) in [(&mut a, 1), (&mut b, 5)] {
            let outcome = engine
                .route(Algorithm::DetCirc, fabric.access(source), fabric.access(0), &failures, &map)
                .unwrap();
            stats.record(&fabric, &outcome, 1.0).unwrap();
        }
        let hops = a.total_hops + b.total_hops;
        let max = a.max_hops.max(b.max_hops);

        let merged = a.merge(b);
        assert_eq!(merged.routed, 2);
        assert_eq!(merged.total_hops, hops);
        assert_eq!(merged.max_hops, max);
        assert_eq!(merged.edge_loads().iter().sum::<f64>(), hops as f64);
    }
}

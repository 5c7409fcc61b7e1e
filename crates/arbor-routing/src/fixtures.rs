//! Hand-built routing inputs for tests and benches
//!
//! Tree `t` (for `t < pod_size`) rooted at `acc0`:
//!
//! - pod 0: `agg t -> acc0`, other access nodes `-> agg t`, other aggregation
//!   nodes `-> acc1 -> agg t`
//! - core block `t` goes straight down to `agg t`; core block `b != t` goes to
//!   `agg b` of pod 0
//! - other pods: access `-> agg(p, t)`, aggregation slot `b -> core(b, t)`

use crate::{ArborescenceSet, PathTable, Result};
use clos_fabric::{ClosTopology, NodeId};

/// `(child, parent)` arcs of fixture tree `tree`
pub fn tree_arcs(topology: &ClosTopology, tree: usize) -> Vec<(NodeId, NodeId)> {
    let h = topology.pod_size();
    let t = tree;
    let mut arcs = Vec::with_capacity(topology.node_count());

    for b in 0..h {
        let agg = topology.aggregation(b);
        let parent = if b == t { topology.access(0) } else { topology.access(1) };
        arcs.push((agg, parent));
    }
    for j in 1..h {
        arcs.push((topology.access(j), topology.aggregation(t)));
    }

    for c in 0..topology.core_count() {
        let block = c / h;
        arcs.push((topology.core(c), topology.aggregation(block)));
    }

    for pod in 1..topology.pods() {
        for b in 0..h {
            arcs.push((topology.aggregation(pod * h + b), topology.core(b * h + t)));
        }
        for j in 0..h {
            arcs.push((topology.access(pod * h + j), topology.aggregation(pod * h + t)));
        }
    }

    arcs
}

/// `trees` fixture arborescences rooted at the reference destination
pub fn arborescences(topology: &ClosTopology, trees: usize) -> Result<ArborescenceSet> {
    let arcs: Vec<_> = (0..trees).map(|t| tree_arcs(topology, t)).collect();
    ArborescenceSet::from_arcs(topology, topology.reference_destination(), &arcs)
}

/// One edge-disjoint path per aggregation slot for every access node except
/// the root: two hops inside pod 0, four hops through the core elsewhere.
pub fn square_one_paths(topology: &ClosTopology) -> Result<PathTable> {
    let h = topology.pod_size();
    let root = topology.reference_destination();

    let entries = (1..topology.access_count()).map(|a| {
        let source = topology.access(a);
        let pod = a / h;
        let paths = (0..h)
            .map(|i| {
                if pod == 0 {
                    vec![source, topology.aggregation(i), root]
                } else {
                    vec![
                        source,
                        topology.aggregation(pod * h + i),
                        topology.core(i * h + a % h),
                        topology.aggregation(i),
                        root,
                    ]
                }
            })
            .collect();
        (source, paths)
    });

    PathTable::from_paths(topology, root, entries)
}

//! Bounded forwarding walks
//!
//! Walks run in the canonical frame (trees rooted at the reference
//! destination). Every link is translated through the automorphism before
//! it is tested against the failure set, and every recorded node is the
//! destination-frame image.

use crate::policy::TreePolicy;
use crate::{ArborescenceSet, FailureSet, Result, RouteOutcome};
use clos_fabric::{AutomorphismMap, ClosTopology, NodeId};

/// Read-only inputs shared by every walk of one query
pub(crate) struct WalkContext<'a> {
    pub topology: &'a ClosTopology,
    pub failures: &'a FailureSet,
    pub map: &'a AutomorphismMap,
}

impl WalkContext<'_> {
    #[inline]
    pub fn is_down(&self, u: NodeId, v: NodeId) -> bool {
        self.failures
            .is_down(self.topology, self.map.apply(u), self.map.apply(v))
    }
}

/// Mutable state of one walk
pub(crate) struct Trace<'a> {
    map: &'a AutomorphismMap,
    hop_list: Vec<NodeId>,
    detour_edges: Vec<(NodeId, NodeId)>,
    pub hops: usize,
    pub switches: usize,
}

impl<'a> Trace<'a> {
    pub fn new(map: &'a AutomorphismMap, start: NodeId) -> Self {
        Self {
            map,
            hop_list: vec![map.apply(start)],
            detour_edges: Vec::new(),
            hops: 0,
            switches: 0,
        }
    }

    /// Record arrival at a canonical node, skipping consecutive repeats
    pub fn visit(&mut self, node: NodeId) {
        let real = self.map.apply(node);
        if self.hop_list.last() != Some(&real) {
            self.hop_list.push(real);
        }
    }

    pub fn detour(&mut self, from: NodeId, to: NodeId) {
        self.detour_edges
            .push((self.map.apply(from), self.map.apply(to)));
    }

    pub fn finish(self, has_cycle: bool) -> RouteOutcome {
        RouteOutcome {
            has_cycle,
            hop_list: self.hop_list,
            switch_count: self.switches,
            detour_edges: self.detour_edges,
        }
    }
}

/// Walk the arborescences from canonical node `start` toward the root,
/// switching trees on failed links according to `policy`.
pub(crate) fn walk_trees<P: TreePolicy>(
    ctx: &WalkContext<'_>,
    trees: &ArborescenceSet,
    policy: &mut P,
    start: NodeId,
) -> Result<RouteOutcome> {
    let root = trees.root();
    let n = ctx.topology.node_count();
    let hop_limit = policy.hop_limit(n);
    let switch_limit = trees.len() * n;

    let mut trace = Trace::new(ctx.map, start);
    let mut current = start;
    let mut tree = policy.initial_tree();

    while current != root {
        let next = trees.next_hop(tree, current)?;
        if ctx.is_down(current, next) {
            trace.switches += 1;
            tree = policy.next_tree(tree, trace.switches);
        } else {
            if trace.switches > 0 {
                trace.detour(current, next);
            }
            current = next;
            trace.hops += 1;
            trace.visit(current);
        }

        if trace.hops > hop_limit || trace.switches >= switch_limit {
            return Ok(trace.finish(true));
        }
    }

    Ok(trace.finish(false))
}

//! Destination-shifting automorphisms of the Clos fabric
//!
//! Arborescences are computed once, rooted at the reference destination
//! (`acc0`). Routing toward any other access node `acc t` reuses them by
//! relabelling the fabric with an automorphism that maps `acc0` to `acc t`:
//!
//! - inner shift: rotate access and aggregation nodes inside every pod by
//!   `t mod h`, and rotate the core layer by `(t mod h) · h`
//! - pod shift: rotate whole pods by `t div h`; the core layer is either left
//!   fixed (variant 1) or rotated inside each core block (variant 2)
//!
//! The two variants realise different subgroups of the automorphism group
//! and spread load differently when trees are reused across destinations.

use crate::{ClosTopology, FabricError, NodeId, Result};
use serde::{Deserialize, Serialize};

/// Which pod-shift subgroup to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Variant {
    /// Pod shift leaves core nodes in place
    FixedCore,
    /// Pod shift also rotates each core block
    RotatedCore,
}

impl Variant {
    pub fn number(&self) -> u8 {
        match self {
            Variant::FixedCore => 1,
            Variant::RotatedCore => 2,
        }
    }
}

impl TryFrom<u8> for Variant {
    type Error = FabricError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Variant::FixedCore),
            2 => Ok(Variant::RotatedCore),
            other => Err(FabricError::InvalidVariant(other)),
        }
    }
}

/// A bijective relabelling of the fabric, from the canonical (reference
/// destination) frame into the frame of one target destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomorphismMap {
    target: usize,
    variant: Variant,
    forward: Vec<NodeId>,
    inverse: Vec<NodeId>,
}

impl AutomorphismMap {
    /// Canonical node -> target-frame node
    #[inline]
    pub fn apply(&self, node: NodeId) -> NodeId {
        self.forward[node.index()]
    }

    /// Target-frame node -> canonical node
    #[inline]
    pub fn invert(&self, node: NodeId) -> NodeId {
        self.inverse[node.index()]
    }

    /// Destination (access-layer index) this map was built for
    pub fn target(&self) -> usize {
        self.target
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn is_identity(&self) -> bool {
        self.forward
            .iter()
            .enumerate()
            .all(|(i, n)| n.index() == i)
    }

    /// Edge `{u, v}` exists iff `{map(u), map(v)}` exists
    pub fn is_automorphism_of(&self, topology: &ClosTopology) -> bool {
        if self.forward.len() != topology.node_count() {
            return false;
        }
        // A bijection that maps every edge onto an edge of a finite graph
        // maps the edge set onto itself.
        topology
            .edges()
            .all(|(_, u, v)| topology.contains_edge(self.apply(u), self.apply(v)))
    }
}

impl ClosTopology {
    /// Automorphism mapping the reference destination onto access node
    /// `target`. `relabel(0, _)` is the identity.
    pub fn relabel(&self, target: usize, variant: Variant) -> Result<AutomorphismMap> {
        if target >= self.access_count() {
            return Err(FabricError::TargetOutOfRange {
                target,
                access_count: self.access_count(),
            });
        }

        let h = self.pod_size();
        let layer_len = self.access_count();
        let core_len = self.core_count();
        let inner_shift = target % h;
        let pod_shift = target / h;

        // Rotate inside each pod
        let inner_pod = |i: usize| (i / h) * h + (i % h + inner_shift) % h;
        let inner_core = |i: usize| (i + inner_shift * h) % core_len;

        // Rotate across pods
        let across_pod = |i: usize| (i + pod_shift * h) % layer_len;
        let across_core = |i: usize| match variant {
            Variant::FixedCore => i,
            Variant::RotatedCore => (i / h) * h + (i % h + pod_shift) % h,
        };

        let mut forward = Vec::with_capacity(self.node_count());
        for i in 0..core_len {
            forward.push(self.core(across_core(inner_core(i))));
        }
        for i in 0..self.aggregation_count() {
            forward.push(self.aggregation(across_pod(inner_pod(i))));
        }
        for i in 0..layer_len {
            forward.push(self.access(across_pod(inner_pod(i))));
        }

        let mut inverse = vec![NodeId(0); forward.len()];
        for (i, n) in forward.iter().enumerate() {
            inverse[n.index()] = NodeId(i as u32);
        }

        Ok(AutomorphismMap {
            target,
            variant,
            forward,
            inverse,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_reference_is_identity() {
        let fabric = ClosTopology::new(8).unwrap();
        for variant in [Variant::FixedCore, Variant::RotatedCore] {
            assert!(fabric.relabel(0, variant).unwrap().is_identity());
        }
    }

    #[test]
    fn test_maps_reference_to_target() {
        let fabric = ClosTopology::new(6).unwrap();
        let reference = fabric.reference_destination();

        for target in 0..fabric.access_count() {
            let map = fabric.relabel(target, Variant::RotatedCore).unwrap();
            assert_eq!(map.apply(reference), fabric.access(target));
            assert_eq!(map.invert(fabric.access(target)), reference);
        }
    }

    #[test]
    fn test_bijection_and_edge_preservation() {
        let fabric = ClosTopology::new(6).unwrap();

        for target in 0..fabric.access_count() {
            for variant in [Variant::FixedCore, Variant::RotatedCore] {
                let map = fabric.relabel(target, variant).unwrap();

                let image: HashSet<NodeId> =
                    (0..fabric.node_count() as u32).map(|i| map.apply(NodeId(i))).collect();
                assert_eq!(image.len(), fabric.node_count());

                let mapped: HashSet<_> = fabric
                    .edges()
                    .map(|(_, u, v)| fabric.edge_id(map.apply(u), map.apply(v)))
                    .collect();
                let original: HashSet<_> = fabric.edges().map(|(e, _, _)| Some(e)).collect();
                assert_eq!(mapped, original);
            }
        }
    }

    #[test]
    fn test_variants_differ_on_core() {
        let fabric = ClosTopology::new(4).unwrap();
        // target acc2 sits in pod 1: pure pod shift
        let fixed = fabric.relabel(2, Variant::FixedCore).unwrap();
        let rotated = fabric.relabel(2, Variant::RotatedCore).unwrap();

        assert_eq!(fixed.apply(fabric.core(0)), fabric.core(0));
        assert_eq!(rotated.apply(fabric.core(0)), fabric.core(1));
        assert_eq!(fixed.apply(fabric.aggregation(0)), fabric.aggregation(2));
        assert_eq!(rotated.apply(fabric.aggregation(0)), fabric.aggregation(2));
    }

    #[test]
    fn test_domain_errors() {
        let fabric = ClosTopology::new(4).unwrap();
        assert_eq!(
            fabric.relabel(8, Variant::FixedCore).unwrap_err(),
            FabricError::TargetOutOfRange { target: 8, access_count: 8 }
        );
        assert_eq!(Variant::try_from(3).unwrap_err(), FabricError::InvalidVariant(3));
        assert_eq!(Variant::try_from(2).unwrap(), Variant::RotatedCore);
    }
}

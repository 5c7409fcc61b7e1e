//! Arbor Routing
//!
//! Failure-oblivious forwarding over precomputed arborescences:
//!
//! - DetCirc: deterministic circular tree switching
//! - PRNB: random switching without bouncing back to the same tree
//! - BIBD: switching order read from a design schedule row
//! - Square-One: restart from the source on the next edge-disjoint path
//!
//! All structures are rooted at the reference destination. Routing toward
//! any other destination goes through an [`AutomorphismMap`]; failures are
//! always tested in the real (destination) frame.

use clos_fabric::{AutomorphismMap, ClosTopology, FabricError, NodeId};
use design_schedule::DesignSchedule;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub mod arborescence;
pub mod cache;
pub mod failures;
pub mod hash;
pub mod policy;
pub mod square_one;
mod walk;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use arborescence::{ArborescenceSet, ParentSlot};
pub use cache::RelabelCache;
pub use failures::FailureSet;
pub use square_one::PathTable;

use policy::{Circular, RandomNoBounce, Scheduled};
use square_one::walk_paths;
use walk::{walk_trees, WalkContext};

#[derive(Error, Debug)]
pub enum RoutingError {
    #[error(transparent)]
    Fabric(#[from] FabricError),
    #[error("Tree {tree}: node {node} has {parents} parent arcs, expected exactly one")]
    CorruptTree { tree: usize, node: NodeId, parents: usize },
    #[error("Tree {tree}: arc {from} -> {to} is not a fabric link")]
    ForeignArc { tree: usize, from: NodeId, to: NodeId },
    #[error("Tree {tree} is invalid: {reason}")]
    InvalidTree { tree: usize, reason: String },
    #[error("No arborescences supplied")]
    EmptyTreeSet,
    #[error("{trees} trees requested but the fabric supports at most {pod_size}")]
    TooManyTrees { trees: usize, pod_size: usize },
    #[error("Trees are rooted at {found}, expected the reference destination {expected}")]
    WrongRoot { expected: NodeId, found: NodeId },
    #[error("BIBD routing requires a design schedule")]
    ScheduleNotLoaded,
    #[error("Schedule ({width} columns, largest entry {max_entry}) does not fit {trees} trees")]
    ScheduleMismatch { width: usize, max_entry: usize, trees: usize },
    #[error("Square-One routing requires a path table")]
    PathTableNotLoaded,
    #[error("No square-one paths from canonical node {node}")]
    NoPaths { node: NodeId },
    #[error("Path {index} from {node} is invalid: {reason}")]
    InvalidPath { node: NodeId, index: usize, reason: String },
    #[error("{0} is not an access node")]
    NotAccessNode(NodeId),
    #[error("{from} - {to} is not a fabric link")]
    NotAnEdge { from: NodeId, to: NodeId },
    #[error("Edge id {edge} out of range (fabric has {edge_count} links)")]
    EdgeOutOfRange { edge: u32, edge_count: usize },
    #[error("Automorphism targets {found}, query destination is {expected}")]
    MapMismatch { expected: NodeId, found: NodeId },
    #[error("Unknown routing algorithm: {0}")]
    UnknownAlgorithm(String),
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RoutingError>;

// ============================================================================
// Algorithms and outcomes
// ============================================================================

/// Routing decision algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    DetCirc,
    Prnb,
    #[serde(rename = "sq1")]
    SquareOne,
    Bibd,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::DetCirc,
        Algorithm::Prnb,
        Algorithm::SquareOne,
        Algorithm::Bibd,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::DetCirc => "detcirc",
            Algorithm::Prnb => "prnb",
            Algorithm::SquareOne => "sq1",
            Algorithm::Bibd => "bibd",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = RoutingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "detcirc" => Ok(Algorithm::DetCirc),
            "prnb" => Ok(Algorithm::Prnb),
            "sq1" | "squareone" | "square-one" => Ok(Algorithm::SquareOne),
            "bibd" => Ok(Algorithm::Bibd),
            _ => Err(RoutingError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Result of one route query, in the destination frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteOutcome {
    /// Hop or switch budget exhausted; `hop_list` is the partial trace
    pub has_cycle: bool,
    /// Visited nodes, consecutive repeats removed
    pub hop_list: Vec<NodeId>,
    pub switch_count: usize,
    /// Links taken after the first switch
    pub detour_edges: Vec<(NodeId, NodeId)>,
}

impl RouteOutcome {
    pub fn hop_count(&self) -> usize {
        self.hop_list.len().saturating_sub(1)
    }

    /// Consecutive node pairs of the trace
    pub fn links(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.hop_list.windows(2).map(|w| (w[0], w[1]))
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Routes queries over one fabric and one set of precomputed structures.
/// Cheap to clone; all inputs are shared read-only.
#[derive(Debug, Clone)]
pub struct RoutingEngine {
    topology: Arc<ClosTopology>,
    trees: Arc<ArborescenceSet>,
    schedule: Option<Arc<DesignSchedule>>,
    paths: Option<Arc<PathTable>>,
    seed: u64,
}

impl RoutingEngine {
    /// Check the tree set against the fabric once, before any routing
    pub fn new(topology: Arc<ClosTopology>, trees: Arc<ArborescenceSet>) -> Result<Self> {
        if trees.is_empty() {
            return Err(RoutingError::EmptyTreeSet);
        }
        if trees.len() > topology.pod_size() {
            return Err(RoutingError::TooManyTrees {
                trees: trees.len(),
                pod_size: topology.pod_size(),
            });
        }
        if trees.root() != topology.reference_destination() {
            return Err(RoutingError::WrongRoot {
                expected: topology.reference_destination(),
                found: trees.root(),
            });
        }
        if trees.node_count() != topology.node_count() {
            return Err(RoutingError::InvalidTree {
                tree: 0,
                reason: format!(
                    "covers {} nodes, fabric has {}",
                    trees.node_count(),
                    topology.node_count()
                ),
            });
        }

        Ok(Self {
            topology,
            trees,
            schedule: None,
            paths: None,
            seed: 0,
        })
    }

    /// Attach the BIBD schedule. Every row must list at least `k` trees and
    /// every entry must name an existing tree.
    pub fn with_schedule(mut self, schedule: Arc<DesignSchedule>) -> Result<Self> {
        let trees = self.trees.len();
        let max_entry = schedule.max_entry().unwrap_or(0);
        if schedule.width() < trees || max_entry >= trees {
            return Err(RoutingError::ScheduleMismatch {
                width: schedule.width(),
                max_entry,
                trees,
            });
        }
        self.schedule = Some(schedule);
        Ok(self)
    }

    /// Attach the Square-One path table
    pub fn with_paths(mut self, paths: Arc<PathTable>) -> Result<Self> {
        if paths.root() != self.topology.reference_destination() {
            return Err(RoutingError::WrongRoot {
                expected: self.topology.reference_destination(),
                found: paths.root(),
            });
        }
        self.paths = Some(paths);
        Ok(self)
    }

    /// Seed for PRNB switching
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn topology(&self) -> &ClosTopology {
        &self.topology
    }

    pub fn trees(&self) -> &ArborescenceSet {
        &self.trees
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn schedule(&self) -> Option<&DesignSchedule> {
        self.schedule.as_deref()
    }

    pub fn paths(&self) -> Option<&PathTable> {
        self.paths.as_deref()
    }

    /// Fail fast if `algorithm` needs data that was never attached
    pub fn check_ready(&self, algorithm: Algorithm) -> Result<()> {
        match algorithm {
            Algorithm::Bibd if self.schedule.is_none() => Err(RoutingError::ScheduleNotLoaded),
            Algorithm::SquareOne if self.paths.is_none() => Err(RoutingError::PathTableNotLoaded),
            _ => Ok(()),
        }
    }

    /// Route one packet from `source` to `destination`, both real access
    /// nodes. `map` must send the reference destination to `destination`.
    pub fn route(
        &self,
        algorithm: Algorithm,
        source: NodeId,
        destination: NodeId,
        failures: &FailureSet,
        map: &AutomorphismMap,
    ) -> Result<RouteOutcome> {
        for node in [source, destination] {
            if !self.topology.is_access(node) {
                return Err(RoutingError::NotAccessNode(node));
            }
        }
        let mapped_root = map.apply(self.topology.reference_destination());
        if mapped_root != destination {
            return Err(RoutingError::MapMismatch {
                expected: destination,
                found: mapped_root,
            });
        }

        let start = map.invert(source);
        let k = self.trees.len();
        let ctx = WalkContext {
            topology: &self.topology,
            failures,
            map,
        };

        let outcome = match algorithm {
            Algorithm::DetCirc => {
                let mut policy = Circular::new(k, start);
                walk_trees(&ctx, &self.trees, &mut policy, start)?
            }
            Algorithm::Prnb => {
                let rng = ChaCha8Rng::seed_from_u64(
                    hash::mix64(self.seed) ^ hash::pair_hash(start, destination),
                );
                let mut policy = RandomNoBounce::new(k, start, destination, rng);
                walk_trees(&ctx, &self.trees, &mut policy, start)?
            }
            Algorithm::Bibd => {
                let schedule = self.schedule.as_ref().ok_or(RoutingError::ScheduleNotLoaded)?;
                let row = schedule.row(hash::pick(hash::node_hash(start), schedule.rows()));
                let mut policy = Scheduled::new(k, row);
                walk_trees(&ctx, &self.trees, &mut policy, start)?
            }
            Algorithm::SquareOne => {
                let paths = self.paths.as_ref().ok_or(RoutingError::PathTableNotLoaded)?;
                walk_paths(&ctx, paths, start, destination)?
            }
        };

        if outcome.has_cycle {
            debug!(
                algorithm = algorithm.name(),
                source = %source,
                destination = %destination,
                switches = outcome.switch_count,
                "Route exhausted its budget"
            );
        }
        Ok(outcome)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use clos_fabric::{EdgeId, Variant};
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        // Fuzz: delivered routes only use live fabric links and end at the destination
        #[test]
        fn fuzz_delivered_routes_are_live_paths(
            down in proptest::collection::vec(0u32..32, 0..6),
            d in 0usize..8,
            s in 0usize..8,
            variant in 1u8..=2,
        ) {
            prop_assume!(s != d);
            let fabric = Arc::new(ClosTopology::new(4).unwrap());
            let engine = RoutingEngine::new(
                Arc::clone(&fabric),
                Arc::new(fixtures::arborescences(&fabric, 2).unwrap()),
            )
            .unwrap()
            .with_schedule(Arc::new(DesignSchedule::from_rows(vec![vec![0, 1], vec![1, 0]]).unwrap()))
            .unwrap()
            .with_paths(Arc::new(fixtures::square_one_paths(&fabric).unwrap()))
            .unwrap();

            let failures = FailureSet::from_edge_ids(&fabric, down.into_iter().map(EdgeId)).unwrap();
            let map = fabric.relabel(d, Variant::try_from(variant).unwrap()).unwrap();
            let (source, destination) = (fabric.access(s), fabric.access(d));

            for algorithm in Algorithm::ALL {
                let outcome = engine.route(algorithm, source, destination, &failures, &map).unwrap();
                prop_assert_eq!(outcome.hop_list.first(), Some(&source));
                for (u, v) in outcome.links() {
                    prop_assert!(fabric.contains_edge(u, v));
                    prop_assert!(!failures.is_down(&fabric, u, v));
                }
                if !outcome.has_cycle {
                    prop_assert_eq!(outcome.hop_list.last(), Some(&destination));
                }
            }
        }
    }
}

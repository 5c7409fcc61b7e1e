//! Clos Fabric
//!
//! Topology model for the three-layer Clos (fat-tree) data-center fabric:
//!
//! - Flat integer node ids, partitioned by layer (core, aggregation, access)
//! - Canonical undirected edge ids, established once at construction
//! - Pod structure (aggregation + access nodes, `fan_out / 2` of each per pod)
//! - Destination-shifting automorphisms (see [`automorphism`])
//!
//! Node id layout for fan-out `k` and pod size `h = k / 2`:
//!
//! ```text
//! [0, h²)                 core
//! [h², h² + k·h)          aggregation
//! [h² + k·h, h² + 2·k·h)  access
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

pub mod automorphism;

pub use automorphism::{AutomorphismMap, Variant};

/// Fabric errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FabricError {
    #[error("Fan-out must be even and at least 2, got {0}")]
    InvalidFanOut(usize),
    #[error("Destination index {target} out of range (access layer has {access_count} nodes)")]
    TargetOutOfRange { target: usize, access_count: usize },
    #[error("Automorphism variant must be 1 or 2, got {0}")]
    InvalidVariant(u8),
    #[error("Unknown node name: {0}")]
    UnknownNode(String),
    #[error("Node id {0} out of range")]
    NodeOutOfRange(u32),
}

pub type Result<T> = std::result::Result<T, FabricError>;

/// Node layers of the fabric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layer {
    Core,
    Aggregation,
    Access,
}

impl Layer {
    /// Name prefix used in adjacency-list files (`core3`, `agg7`, `acc0`)
    pub fn prefix(&self) -> &'static str {
        match self {
            Layer::Core => "core",
            Layer::Aggregation => "agg",
            Layer::Access => "acc",
        }
    }
}

/// Flat node identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Canonical undirected edge identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

impl EdgeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The three-layer Clos fabric. Immutable after construction.
#[derive(Debug, Clone)]
pub struct ClosTopology {
    fan_out: usize,
    pod_size: usize,
    core_count: usize,
    aggregation_count: usize,
    access_count: usize,
    adjacency: Vec<Vec<NodeId>>,
    /// Edge endpoints, lower id first
    edges: Vec<(NodeId, NodeId)>,
    edge_index: HashMap<(NodeId, NodeId), EdgeId>,
}

impl ClosTopology {
    /// Build the fabric for an even fan-out `k`.
    ///
    /// There are `k` pods of `k/2` aggregation and `k/2` access nodes each.
    /// Inside a pod, aggregation and access form a complete bipartite graph.
    /// The `i`-th aggregation node of every pod connects to the `i`-th slice
    /// of `k/2` core nodes.
    pub fn new(fan_out: usize) -> Result<Self> {
        if fan_out < 2 || fan_out % 2 != 0 {
            return Err(FabricError::InvalidFanOut(fan_out));
        }
        let h = fan_out / 2;
        let core_count = h * h;
        let aggregation_count = fan_out * h;
        let access_count = fan_out * h;
        let node_count = core_count + aggregation_count + access_count;

        let mut topology = Self {
            fan_out,
            pod_size: h,
            core_count,
            aggregation_count,
            access_count,
            adjacency: vec![Vec::new(); node_count],
            edges: Vec::with_capacity(2 * fan_out * h * h),
            edge_index: HashMap::with_capacity(2 * fan_out * h * h),
        };

        for pod in 0..fan_out {
            for i in 0..h {
                for j in 0..h {
                    let agg = topology.aggregation(pod * h + i);
                    let acc = topology.access(pod * h + j);
                    topology.add_edge(agg, acc);
                }
            }
        }

        for pod in 0..fan_out {
            for i in 0..h {
                for j in 0..h {
                    let agg = topology.aggregation(pod * h + i);
                    let core = topology.core(i * h + j);
                    topology.add_edge(agg, core);
                }
            }
        }

        tracing::debug!(
            fan_out,
            nodes = topology.node_count(),
            edges = topology.edge_count(),
            "Built Clos fabric"
        );

        Ok(topology)
    }

    fn add_edge(&mut self, u: NodeId, v: NodeId) {
        let key = if u < v { (u, v) } else { (v, u) };
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(key);
        self.edge_index.insert(key, id);
        self.adjacency[u.index()].push(v);
        self.adjacency[v.index()].push(u);
    }

    pub fn fan_out(&self) -> usize {
        self.fan_out
    }

    /// Aggregation (and access) nodes per pod
    pub fn pod_size(&self) -> usize {
        self.pod_size
    }

    pub fn pods(&self) -> usize {
        self.fan_out
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of undirected edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn core_count(&self) -> usize {
        self.core_count
    }

    pub fn aggregation_count(&self) -> usize {
        self.aggregation_count
    }

    pub fn access_count(&self) -> usize {
        self.access_count
    }

    #[inline]
    pub fn core(&self, index: usize) -> NodeId {
        NodeId(index as u32)
    }

    #[inline]
    pub fn aggregation(&self, index: usize) -> NodeId {
        NodeId((self.core_count + index) as u32)
    }

    #[inline]
    pub fn access(&self, index: usize) -> NodeId {
        NodeId((self.core_count + self.aggregation_count + index) as u32)
    }

    /// The access node every precomputed structure is rooted at (`acc0`)
    pub fn reference_destination(&self) -> NodeId {
        self.access(0)
    }

    /// Layer and in-layer index of a node
    pub fn locate(&self, node: NodeId) -> Result<(Layer, usize)> {
        let id = node.index();
        let agg_start = self.core_count;
        let acc_start = agg_start + self.aggregation_count;
        if id < agg_start {
            Ok((Layer::Core, id))
        } else if id < acc_start {
            Ok((Layer::Aggregation, id - agg_start))
        } else if id < self.node_count() {
            Ok((Layer::Access, id - acc_start))
        } else {
            Err(FabricError::NodeOutOfRange(node.0))
        }
    }

    pub fn is_access(&self, node: NodeId) -> bool {
        matches!(self.locate(node), Ok((Layer::Access, _)))
    }

    /// Index of an access node inside the access layer
    pub fn access_index(&self, node: NodeId) -> Option<usize> {
        match self.locate(node) {
            Ok((Layer::Access, index)) => Some(index),
            _ => None,
        }
    }

    /// Node id for a layer and in-layer index
    pub fn node(&self, layer: Layer, index: usize) -> Result<NodeId> {
        let len = match layer {
            Layer::Core => self.core_count,
            Layer::Aggregation => self.aggregation_count,
            Layer::Access => self.access_count,
        };
        if index >= len {
            return Err(FabricError::UnknownNode(format!("{}{}", layer.prefix(), index)));
        }
        Ok(match layer {
            Layer::Core => self.core(index),
            Layer::Aggregation => self.aggregation(index),
            Layer::Access => self.access(index),
        })
    }

    /// Adjacency-list name of a node (`core3`, `agg7`, `acc0`)
    pub fn node_name(&self, node: NodeId) -> String {
        match self.locate(node) {
            Ok((layer, index)) => format!("{}{}", layer.prefix(), index),
            Err(_) => node.to_string(),
        }
    }

    /// Parse an adjacency-list node name
    pub fn parse_node(&self, name: &str) -> Result<NodeId> {
        let name = name.trim();
        for layer in [Layer::Core, Layer::Aggregation, Layer::Access] {
            if let Some(digits) = name.strip_prefix(layer.prefix()) {
                let index: usize = digits
                    .parse()
                    .map_err(|_| FabricError::UnknownNode(name.to_string()))?;
                return self.node(layer, index);
            }
        }
        Err(FabricError::UnknownNode(name.to_string()))
    }

    pub fn neighbors(&self, node: NodeId) -> &[NodeId] {
        self.adjacency
            .get(node.index())
            .map(|n| n.as_slice())
            .unwrap_or(&[])
    }

    /// Canonical id of the undirected edge `{u, v}`, if it exists
    #[inline]
    pub fn edge_id(&self, u: NodeId, v: NodeId) -> Option<EdgeId> {
        let key = if u < v { (u, v) } else { (v, u) };
        self.edge_index.get(&key).copied()
    }

    pub fn contains_edge(&self, u: NodeId, v: NodeId) -> bool {
        self.edge_id(u, v).is_some()
    }

    /// Endpoints of an edge, lower id first
    pub fn endpoints(&self, edge: EdgeId) -> (NodeId, NodeId) {
        self.edges[edge.index()]
    }

    /// All undirected edges, lower id first, in edge-id order
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, NodeId, NodeId)> + '_ {
        self.edges
            .iter()
            .enumerate()
            .map(|(i, &(u, v))| (EdgeId(i as u32), u, v))
    }

    /// Get fabric statistics
    pub fn stats(&self) -> FabricStats {
        FabricStats {
            fan_out: self.fan_out,
            pods: self.pods(),
            pod_size: self.pod_size,
            total_nodes: self.node_count(),
            core_nodes: self.core_count,
            aggregation_nodes: self.aggregation_count,
            access_nodes: self.access_count,
            total_links: self.edge_count(),
        }
    }
}

/// Fabric statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FabricStats {
    pub fan_out: usize,
    pub pods: usize,
    pub pod_size: usize,
    pub total_nodes: usize,
    pub core_nodes: usize,
    pub aggregation_nodes: usize,
    pub access_nodes: usize,
    pub total_links: usize,
}

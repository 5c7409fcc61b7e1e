//! Arborescence sets
//!
//! `k` spanning in-trees rooted at the reference destination. Each tree
//! stores, per node, the parent slot read from the input; malformed input
//! is kept as-is so routing can report it per query instead of guessing a
//! neighbor.

use crate::{Result, RoutingError};
use clos_fabric::{ClosTopology, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Outgoing arc of a node in one tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentSlot {
    Missing,
    One(NodeId),
    /// More than one distinct parent was supplied
    Conflicting(usize),
}

impl ParentSlot {
    pub fn count(&self) -> usize {
        match self {
            ParentSlot::Missing => 0,
            ParentSlot::One(_) => 1,
            ParentSlot::Conflicting(n) => *n,
        }
    }
}

/// One in-tree, indexed by node id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arborescence {
    parents: Vec<ParentSlot>,
}

impl Arborescence {
    fn from_arcs(node_count: usize, arcs: &[(NodeId, NodeId)]) -> Self {
        let mut parents = vec![ParentSlot::Missing; node_count];
        for &(child, parent) in arcs {
            let slot = &mut parents[child.index()];
            *slot = match *slot {
                ParentSlot::Missing => ParentSlot::One(parent),
                ParentSlot::One(p) if p == parent => ParentSlot::One(p),
                ParentSlot::One(_) => ParentSlot::Conflicting(2),
                ParentSlot::Conflicting(n) => ParentSlot::Conflicting(n + 1),
            };
        }
        Self { parents }
    }

    pub fn parent(&self, node: NodeId) -> ParentSlot {
        self.parents
            .get(node.index())
            .copied()
            .unwrap_or(ParentSlot::Missing)
    }

    pub fn node_count(&self) -> usize {
        self.parents.len()
    }

    /// `(child, parent)` arcs in node order
    pub fn arcs(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.parents.iter().enumerate().filter_map(|(i, slot)| match slot {
            ParentSlot::One(p) => Some((NodeId(i as u32), *p)),
            _ => None,
        })
    }
}

/// Ordered set of in-trees sharing one root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArborescenceSet {
    root: NodeId,
    trees: Vec<Arborescence>,
}

/// JSON form: node names, one arc list per tree
#[derive(Debug, Serialize, Deserialize)]
struct TreeFile {
    root: String,
    trees: Vec<Vec<(String, String)>>,
}

impl ArborescenceSet {
    /// Build from per-tree `(child, parent)` arc lists
    pub fn from_arcs(
        topology: &ClosTopology,
        root: NodeId,
        trees: &[Vec<(NodeId, NodeId)>],
    ) -> Result<Self> {
        if trees.is_empty() {
            return Err(RoutingError::EmptyTreeSet);
        }
        topology.locate(root)?;
        for arcs in trees {
            for &(u, v) in arcs {
                topology.locate(u)?;
                topology.locate(v)?;
            }
        }

        let n = topology.node_count();
        Ok(Self {
            root,
            trees: trees.iter().map(|arcs| Arborescence::from_arcs(n, arcs)).collect(),
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of trees `k`
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.trees.first().map(|t| t.node_count()).unwrap_or(0)
    }

    pub fn tree(&self, index: usize) -> Option<&Arborescence> {
        self.trees.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arborescence> {
        self.trees.iter()
    }

    /// Parent of `node` in `tree`; anything but exactly one parent is corrupt
    #[inline]
    pub fn next_hop(&self, tree: usize, node: NodeId) -> Result<NodeId> {
        let slot = self
            .trees
            .get(tree)
            .map(|t| t.parent(node))
            .unwrap_or(ParentSlot::Missing);
        match slot {
            ParentSlot::One(parent) => Ok(parent),
            other => Err(RoutingError::CorruptTree {
                tree,
                node,
                parents: other.count(),
            }),
        }
    }

    /// Full structural check: the root has no parent, every other node has
    /// exactly one, every arc is a fabric link, and following parents from
    /// any node reaches the root without revisiting a node.
    pub fn validate(&self, topology: &ClosTopology) -> Result<()> {
        let n = topology.node_count();

        for (t, tree) in self.trees.iter().enumerate() {
            if tree.node_count() != n {
                return Err(RoutingError::InvalidTree {
                    tree: t,
                    reason: format!("covers {} nodes, fabric has {}", tree.node_count(), n),
                });
            }
            if let ParentSlot::One(p) = tree.parent(self.root) {
                return Err(RoutingError::InvalidTree {
                    tree: t,
                    reason: format!("root {} has parent {}", topology.node_name(self.root), topology.node_name(p)),
                });
            }

            for i in 0..n {
                let node = NodeId(i as u32);
                if node == self.root {
                    continue;
                }
                let parent = self.next_hop(t, node)?;
                if !topology.contains_edge(node, parent) {
                    return Err(RoutingError::ForeignArc {
                        tree: t,
                        from: node,
                        to: parent,
                    });
                }
            }

            // 0 = unseen, 1 = on current chain, 2 = reaches root
            let mut state = vec![0u8; n];
            state[self.root.index()] = 2;
            for i in 0..n {
                let mut chain = Vec::new();
                let mut node = NodeId(i as u32);
                while state[node.index()] == 0 {
                    state[node.index()] = 1;
                    chain.push(node);
                    node = self.next_hop(t, node)?;
                }
                if state[node.index()] == 1 {
                    return Err(RoutingError::InvalidTree {
                        tree: t,
                        reason: format!("cycle through {}", topology.node_name(node)),
                    });
                }
                for c in chain {
                    state[c.index()] = 2;
                }
            }
        }

        debug!(trees = self.len(), "Validated arborescences");
        Ok(())
    }

    // ========================================================================
    // Adjacency-list files
    // ========================================================================

    /// Parse one tree in adjacency-list form: `node succ...` per line, `#`
    /// starts a comment line
    pub fn parse_adjlist(topology: &ClosTopology, text: &str) -> Result<Vec<(NodeId, NodeId)>> {
        let mut arcs = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut tokens = line.split_whitespace();
            let Some(head) = tokens.next() else { continue };
            let child = topology.parse_node(head).map_err(|e| RoutingError::Parse {
                line: i + 1,
                message: e.to_string(),
            })?;
            for token in tokens {
                let parent = topology.parse_node(token).map_err(|e| RoutingError::Parse {
                    line: i + 1,
                    message: e.to_string(),
                })?;
                arcs.push((child, parent));
            }
        }
        Ok(arcs)
    }

    /// Render one tree in adjacency-list form
    pub fn to_adjlist(&self, topology: &ClosTopology, tree: usize) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# arborescence {} rooted at {}", tree, topology.node_name(self.root));
        if let Some(t) = self.trees.get(tree) {
            for i in 0..t.node_count() {
                let node = NodeId(i as u32);
                match t.parent(node) {
                    ParentSlot::One(p) => {
                        let _ = writeln!(out, "{} {}", topology.node_name(node), topology.node_name(p));
                    }
                    _ => {
                        let _ = writeln!(out, "{}", topology.node_name(node));
                    }
                }
            }
        }
        out
    }

    /// Load `arb0.adj`, `arb1.adj`, ... from a directory, stopping at the
    /// first missing index. Trees are rooted at the reference destination.
    pub fn load_adjlist_dir(topology: &ClosTopology, dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut trees = Vec::new();
        loop {
            let path = dir.join(format!("arb{}.adj", trees.len()));
            if !path.exists() {
                break;
            }
            let text = fs::read_to_string(&path)?;
            trees.push(Self::parse_adjlist(topology, &text)?);
        }

        let set = Self::from_arcs(topology, topology.reference_destination(), &trees)?;
        info!(dir = %dir.display(), trees = set.len(), "Loaded arborescences");
        Ok(set)
    }

    /// Write every tree as `arb<i>.adj` into `dir`
    pub fn save_adjlist_dir(&self, topology: &ClosTopology, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        for t in 0..self.len() {
            fs::write(dir.join(format!("arb{}.adj", t)), self.to_adjlist(topology, t))?;
        }
        Ok(())
    }

    // ========================================================================
    // JSON files
    // ========================================================================

    pub fn load_json(topology: &ClosTopology, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file: TreeFile = serde_json::from_str(&fs::read_to_string(path)?)?;

        let root = topology.parse_node(&file.root)?;
        let trees = file
            .trees
            .iter()
            .map(|arcs| {
                arcs.iter()
                    .map(|(u, v)| -> Result<(NodeId, NodeId)> {
                        Ok((topology.parse_node(u)?, topology.parse_node(v)?))
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        let set = Self::from_arcs(topology, root, &trees)?;
        info!(path = %path.display(), trees = set.len(), "Loaded arborescences");
        Ok(set)
    }

    pub fn save_json(&self, topology: &ClosTopology, path: impl AsRef<Path>) -> Result<()> {
        let file = TreeFile {
            root: topology.node_name(self.root),
            trees: self
                .trees
                .iter()
                .map(|t| {
                    t.arcs()
                        .map(|(u, v)| (topology.node_name(u), topology.node_name(v)))
                        .collect()
                })
                .collect(),
        };
        fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }
}

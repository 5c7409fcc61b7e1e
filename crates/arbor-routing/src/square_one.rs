//! Square-One routing over precomputed edge-disjoint paths
//!
//! Each access node carries a length-sorted list of edge-disjoint paths to
//! the reference destination. A walk follows one path; on a failed link it
//! backtracks to the source and restarts on the next path in the list.

use crate::hash::{pair_hash, pick};
use crate::walk::{Trace, WalkContext};
use crate::{Result, RouteOutcome, RoutingError};
use clos_fabric::{ClosTopology, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::info;

/// Edge-disjoint source paths, indexed by canonical node id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTable {
    root: NodeId,
    paths: Vec<Vec<Vec<NodeId>>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(transparent)]
struct PathFile(BTreeMap<String, Vec<Vec<String>>>);

impl PathTable {
    /// Build and validate a table. Paths of each source are sorted by
    /// length, ties keeping input order.
    pub fn from_paths<I>(topology: &ClosTopology, root: NodeId, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (NodeId, Vec<Vec<NodeId>>)>,
    {
        topology.locate(root)?;
        let mut paths = vec![Vec::new(); topology.node_count()];
        for (source, mut list) in entries {
            topology.locate(source)?;
            list.sort_by_key(|p| p.len());
            paths[source.index()] = list;
        }

        let table = Self { root, paths };
        table.validate(topology)?;
        Ok(table)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Paths from `source`, shortest first
    pub fn paths(&self, source: NodeId) -> &[Vec<NodeId>] {
        self.paths
            .get(source.index())
            .map(|p| p.as_slice())
            .unwrap_or(&[])
    }

    /// Number of sources with at least one path
    pub fn sources(&self) -> usize {
        self.paths.iter().filter(|p| !p.is_empty()).count()
    }

    /// Every path starts at its access-node source, ends at the root, walks
    /// fabric links without revisiting a node, and the paths of one source
    /// share no link.
    pub fn validate(&self, topology: &ClosTopology) -> Result<()> {
        for (i, list) in self.paths.iter().enumerate() {
            let source = NodeId(i as u32);
            if list.is_empty() {
                continue;
            }
            let invalid = |index: usize, reason: String| RoutingError::InvalidPath {
                node: source,
                index,
                reason,
            };
            if !topology.is_access(source) {
                return Err(invalid(0, "source is not an access node".into()));
            }

            let mut used = HashSet::new();
            for (p, path) in list.iter().enumerate() {
                if path.first() != Some(&source) || path.last() != Some(&self.root) || path.len() < 2 {
                    return Err(invalid(p, "must run from source to root".into()));
                }
                let mut seen = HashSet::new();
                if !path.iter().all(|n| seen.insert(*n)) {
                    return Err(invalid(p, "revisits a node".into()));
                }
                for pair in path.windows(2) {
                    let edge = topology
                        .edge_id(pair[0], pair[1])
                        .ok_or_else(|| invalid(p, format!("{} is not a link", fmt_pair(topology, pair))))?;
                    if !used.insert(edge) {
                        return Err(invalid(p, format!("reuses link {}", fmt_pair(topology, pair))));
                    }
                }
            }
        }
        Ok(())
    }

    /// Load `{ "acc3": [["acc3", "agg2", ..., "acc0"], ...], ... }`
    pub fn load_json(topology: &ClosTopology, root: NodeId, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file: PathFile = serde_json::from_str(&fs::read_to_string(path)?)?;

        let mut entries = Vec::with_capacity(file.0.len());
        for (source, list) in &file.0 {
            let source = topology.parse_node(source)?;
            let list = list
                .iter()
                .map(|p| {
                    p.iter()
                        .map(|name| topology.parse_node(name))
                        .collect::<clos_fabric::Result<Vec<_>>>()
                })
                .collect::<clos_fabric::Result<Vec<_>>>()?;
            entries.push((source, list));
        }

        let table = Self::from_paths(topology, root, entries)?;
        info!(path = %path.display(), sources = table.sources(), "Loaded square-one paths");
        Ok(table)
    }

    pub fn save_json(&self, topology: &ClosTopology, path: impl AsRef<Path>) -> Result<()> {
        let file = PathFile(
            self.paths
                .iter()
                .enumerate()
                .filter(|(_, list)| !list.is_empty())
                .map(|(i, list)| {
                    let named = list
                        .iter()
                        .map(|p| p.iter().map(|&n| topology.node_name(n)).collect())
                        .collect();
                    (topology.node_name(NodeId(i as u32)), named)
                })
                .collect(),
        );
        fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }
}

fn fmt_pair(topology: &ClosTopology, pair: &[NodeId]) -> String {
    format!("{}-{}", topology.node_name(pair[0]), topology.node_name(pair[1]))
}

/// Square-One walk from canonical node `start`. `destination` is the real
/// destination and only seeds the initial path choice.
pub(crate) fn walk_paths(
    ctx: &WalkContext<'_>,
    table: &PathTable,
    start: NodeId,
    destination: NodeId,
) -> Result<RouteOutcome> {
    let root = table.root();
    let mut trace = Trace::new(ctx.map, start);
    if start == root {
        return Ok(trace.finish(false));
    }

    let paths = table.paths(start);
    if paths.is_empty() {
        return Err(RoutingError::NoPaths { node: start });
    }

    let count = paths.len();
    let n = ctx.topology.node_count();
    let hop_limit = 3 * n;
    let switch_limit = count * n;

    let first = pick(pair_hash(start, destination), count);
    let mut route = &paths[first];
    let mut index = 1;
    let mut current = start;

    while current != root {
        let next = route[index];
        if ctx.is_down(current, next) {
            // back to the source along the links already taken
            for back in route[..index - 1].iter().rev() {
                trace.detour(current, *back);
                current = *back;
                trace.visit(current);
            }
            trace.hops += index - 1;
            trace.switches += 1;
            route = &paths[(first + trace.switches) % count];
            index = 1;
        } else {
            if trace.switches > 0 {
                trace.detour(current, next);
            }
            current = next;
            index += 1;
            trace.hops += 1;
            trace.visit(current);
        }

        if trace.hops > hop_limit || trace.switches >= switch_limit {
            return Ok(trace.finish(true));
        }
    }

    Ok(trace.finish(false))
}

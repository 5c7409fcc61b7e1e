//! Input loading for simulation runs
//!
//! Trees, the design schedule and the square-one path table are read once,
//! checked against the fabric and then shared read-only by every batch.

use crate::Result;
use arbor_routing::{ArborescenceSet, PathTable, RoutingEngine};
use clos_fabric::ClosTopology;
use design_schedule::DesignSchedule;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Load arborescences from a directory of `arb<i>.adj` files or from a JSON
/// tree file, then run the full structural check.
pub fn load_trees(topology: &ClosTopology, path: impl AsRef<Path>) -> Result<ArborescenceSet> {
    let path = path.as_ref();
    let trees = if path.is_dir() {
        ArborescenceSet::load_adjlist_dir(topology, path)?
    } else {
        ArborescenceSet::load_json(topology, path)?
    };
    trees.validate(topology)?;
    Ok(trees)
}

/// Build a routing engine from files. The schedule and path table are
/// optional; algorithms that need them fail at batch start when absent.
pub fn load_engine(
    topology: Arc<ClosTopology>,
    trees: impl AsRef<Path>,
    schedule: Option<&Path>,
    paths: Option<&Path>,
    seed: u64,
) -> Result<RoutingEngine> {
    let trees = Arc::new(load_trees(&topology, trees)?);
    let mut engine = RoutingEngine::new(Arc::clone(&topology), trees)?.with_seed(seed);

    if let Some(path) = schedule {
        engine = engine.with_schedule(Arc::new(DesignSchedule::load(path)?))?;
    }
    if let Some(path) = paths {
        let table = PathTable::load_json(&topology, topology.reference_destination(), path)?;
        engine = engine.with_paths(Arc::new(table))?;
    }

    info!(
        fan_out = topology.fan_out(),
        trees = engine.tree_count(),
        schedule = engine.schedule().is_some(),
        paths = engine.paths().is_some(),
        "Routing engine ready"
    );
    Ok(engine)
}

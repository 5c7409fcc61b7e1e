//! Link-failure scenarios
//!
//! Two models: uniform failures over every link of the fabric, or failures
//! restricted to the uplinks of one destination access node.

use crate::{Result, SimError};
use arbor_routing::FailureSet;
use clos_fabric::{ClosTopology, EdgeId, FabricError};
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which links a scenario may fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FailureModel {
    /// Any link of the fabric
    #[default]
    Random,
    /// Only links incident to the all-to-one destination
    Destination,
}

fn check_rate(rate: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&rate) {
        return Err(SimError::InvalidRate(rate));
    }
    Ok(())
}

/// Fail `⌊rate · |E|⌋` distinct undirected links, chosen uniformly
pub fn inject_failures<R: Rng + ?Sized>(
    topology: &ClosTopology,
    rate: f64,
    rng: &mut R,
) -> Result<FailureSet> {
    check_rate(rate)?;

    let edges = topology.edge_count();
    let count = (edges as f64 * rate) as usize;
    let picked = index::sample(rng, edges, count.min(edges));
    let failures =
        FailureSet::from_edge_ids(topology, picked.into_iter().map(|i| EdgeId(i as u32)))?;

    debug!(rate, failed = failures.len(), of = edges, "Injected link failures");
    Ok(failures)
}

/// Fail `⌊rate · deg⌋` of the links incident to access node `destination`
pub fn inject_destination_failures<R: Rng + ?Sized>(
    topology: &ClosTopology,
    destination: usize,
    rate: f64,
    rng: &mut R,
) -> Result<FailureSet> {
    check_rate(rate)?;
    if destination >= topology.access_count() {
        return Err(FabricError::TargetOutOfRange {
            target: destination,
            access_count: topology.access_count(),
        }
        .into());
    }

    let node = topology.access(destination);
    let uplinks = topology.neighbors(node);
    let count = (uplinks.len() as f64 * rate) as usize;
    let picked = index::sample(rng, uplinks.len(), count.min(uplinks.len()));
    let failures = FailureSet::from_edges(topology, picked.into_iter().map(|i| (node, uplinks[i])))?;

    debug!(
        destination,
        rate,
        failed = failures.len(),
        of = uplinks.len(),
        "Injected destination link failures"
    );
    Ok(failures)
}

/// Draw one scenario under `model`. The destination model needs the
/// destination index of an all-to-one traffic pattern.
pub fn inject<R: Rng + ?Sized>(
    model: FailureModel,
    topology: &ClosTopology,
    destination: Option<usize>,
    rate: f64,
    rng: &mut R,
) -> Result<FailureSet> {
    match model {
        FailureModel::Random => inject_failures(topology, rate, rng),
        FailureModel::Destination => {
            let destination = destination.ok_or_else(|| {
                SimError::Config("destination failures need all-to-one traffic".into())
            })?;
            inject_destination_failures(topology, destination, rate, rng)
        }
    }
}

//! Batch simulation
//!
//! One batch replays every demand of a traffic matrix through one algorithm
//! and one automorphism variant over a fixed failure scenario. Destinations
//! are spread over the rayon pool; each worker folds into its own
//! [`LoadStatistics`] and the partials are merged at the end.

use crate::stats::LoadStatistics;
use crate::traffic::TrafficMatrix;
use crate::{Result, SimError};
use arbor_routing::{Algorithm, FailureSet, RelabelCache, RoutingEngine};
use clos_fabric::Variant;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Identity of one batch in the output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSpec {
    pub algorithm: Algorithm,
    pub variant: Variant,
    /// Traffic label
    pub tag: String,
    /// Failure rate the scenario was drawn with
    pub rate: f64,
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub spec: BatchSpec,
    pub failed_edges: usize,
    pub stats: LoadStatistics,
    pub elapsed: Duration,
}

/// Route every demand of `traffic` and accumulate the resulting load.
///
/// Configuration is checked before any query runs. When `deadline` is set
/// it is checked between queries and the whole batch fails once it passes.
pub fn simulate(
    engine: &RoutingEngine,
    cache: &RelabelCache,
    failures: &FailureSet,
    traffic: &TrafficMatrix,
    spec: BatchSpec,
    deadline: Option<Duration>,
) -> Result<BatchOutcome> {
    let topology = engine.topology();
    if traffic.size() != topology.access_count() {
        return Err(SimError::DimensionMismatch {
            expected: topology.access_count(),
            found: traffic.size(),
        });
    }
    engine.check_ready(spec.algorithm)?;

    info!(
        algorithm = %spec.algorithm,
        variant = spec.variant.number(),
        rate = spec.rate,
        failed = failures.len(),
        "Starting batch"
    );

    let started = Instant::now();
    let expired = AtomicBool::new(false);
    let check_deadline = || -> Result<()> {
        if let Some(limit) = deadline {
            if expired.load(Ordering::Relaxed) || started.elapsed() >= limit {
                expired.store(true, Ordering::Relaxed);
                return Err(SimError::DeadlineExceeded {
                    limit_secs: limit.as_secs_f64(),
                });
            }
        }
        Ok(())
    };

    let stats = (0..traffic.size())
        .into_par_iter()
        .map(|d| -> Result<LoadStatistics> {
            let mut partial = LoadStatistics::new(topology);
            let mut demands = traffic.demands_to(d).peekable();
            if demands.peek().is_none() {
                return Ok(partial);
            }

            let map = cache.get(d, spec.variant)?;
            let destination = topology.access(d);
            for (s, weight) in demands {
                check_deadline()?;
                let outcome =
                    engine.route(spec.algorithm, topology.access(s), destination, failures, &map)?;
                partial.record(topology, &outcome, weight)?;
            }
            debug!(destination = d, loops = partial.loops, "Destination done");
            Ok(partial)
        })
        .try_reduce(|| LoadStatistics::new(topology), |a, b| Ok(a.merge(b)))?;

    let elapsed = started.elapsed();
    info!(
        algorithm = %spec.algorithm,
        routed = stats.routed,
        loops = stats.loops,
        elapsed_ms = elapsed.as_millis() as u64,
        "Batch complete"
    );

    Ok(BatchOutcome {
        spec,
        failed_edges: failures.len(),
        stats,
        elapsed,
    })
}

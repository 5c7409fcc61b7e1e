//! Fabric Simulation
//!
//! Drives the routing engine over whole traffic matrices:
//!
//! - inject a failure scenario, random or aimed at one destination
//!   ([`failures`])
//! - replay every demand of a traffic matrix through one algorithm and one
//!   automorphism variant ([`harness`])
//! - fold routes into per-link and per-node load ([`stats`])
//! - emit one record per batch ([`report`])

use thiserror::Error;

pub mod config;
pub mod failures;
pub mod harness;
pub mod loader;
pub mod report;
pub mod stats;
pub mod traffic;

pub use config::{OutputFormat, SimConfig};
pub use failures::{inject, inject_destination_failures, inject_failures, FailureModel};
pub use harness::{simulate, BatchOutcome, BatchSpec};
pub use report::{BatchRecord, SimReport};
pub use stats::{percentile, LoadStatistics, LoadSummary};
pub use traffic::TrafficMatrix;

#[derive(Error, Debug)]
pub enum SimError {
    #[error(transparent)]
    Routing(#[from] arbor_routing::RoutingError),
    #[error(transparent)]
    Fabric(#[from] clos_fabric::FabricError),
    #[error(transparent)]
    Schedule(#[from] design_schedule::ScheduleError),
    #[error("Traffic matrix is {found}x{found}, fabric has {expected} access nodes")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("Traffic row {row} has {found} entries, expected {expected}")]
    RaggedTraffic { row: usize, expected: usize, found: usize },
    #[error("Invalid traffic entry {token:?} on line {line}")]
    TrafficParse { line: usize, token: String },
    #[error("Unknown traffic spec: {0}")]
    UnknownTraffic(String),
    #[error("Failure rate must be within [0, 1], got {0}")]
    InvalidRate(f64),
    #[error("Batch deadline of {limit_secs}s exceeded")]
    DeadlineExceeded { limit_secs: f64 },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;

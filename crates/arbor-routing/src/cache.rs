//! Memoizing store of destination automorphisms
//!
//! Maps are keyed by the full `(destination, variant)` pair and built at most
//! once per process. Lookups are safe from any number of worker threads.

use crate::Result;
use clos_fabric::{AutomorphismMap, ClosTopology, Variant};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

pub struct RelabelCache {
    topology: Arc<ClosTopology>,
    maps: DashMap<(usize, Variant), Arc<AutomorphismMap>>,
}

impl std::fmt::Debug for RelabelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelabelCache")
            .field("fan_out", &self.topology.fan_out())
            .field("maps", &self.maps.len())
            .finish()
    }
}

impl RelabelCache {
    pub fn new(topology: Arc<ClosTopology>) -> Self {
        Self {
            topology,
            maps: DashMap::new(),
        }
    }

    /// Map sending the reference destination to access node `target`
    pub fn get(&self, target: usize, variant: Variant) -> Result<Arc<AutomorphismMap>> {
        let key = (target, variant);
        if let Some(map) = self.maps.get(&key) {
            return Ok(Arc::clone(map.value()));
        }

        let built = Arc::new(self.topology.relabel(target, variant)?);
        let entry = self.maps.entry(key).or_insert(built);
        debug!(target, variant = variant.number(), "Cached automorphism");
        Ok(Arc::clone(entry.value()))
    }

    /// Build the maps for every destination up front
    pub fn warm(&self, variant: Variant) -> Result<()> {
        for target in 0..self.topology.access_count() {
            self.get(target, variant)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn clear(&self) {
        self.maps.clear();
    }
}

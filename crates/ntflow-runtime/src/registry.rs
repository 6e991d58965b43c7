//! Explicit PV registry
//!
//! An owning name-to-handle map, created by the embedding application and
//! passed to whatever needs lookups. There is no ambient global; two
//! registries in one process are two disjoint namespaces.

use std::collections::HashMap;

use ntflow_core::{NtError, NtResult};
use parking_lot::RwLock;
use tracing::info;

use crate::SharedPv;

#[derive(Default)]
pub struct PvRegistry {
    pvs: RwLock<HashMap<String, SharedPv>>,
}

impl PvRegistry {
    pub fn new() -> Self {
        PvRegistry::default()
    }

    /// Register a PV under its own name.
    pub fn register(&self, pv: SharedPv) -> NtResult<()> {
        let mut pvs = self.pvs.write();
        let name = pv.name().to_string();
        if pvs.contains_key(&name) {
            return Err(NtError::DuplicatePv(name));
        }
        info!(pv = %name, "registered");
        pvs.insert(name, pv);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> NtResult<SharedPv> {
        self.pvs
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| NtError::UnknownPv(name.to_string()))
    }

    pub fn remove(&self, name: &str) -> NtResult<SharedPv> {
        self.pvs
            .write()
            .remove(name)
            .ok_or_else(|| NtError::UnknownPv(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.pvs.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.pvs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pvs.read().is_empty()
    }
}

//! Per-identity module records
//!
//! Every distinct module identity gets its own record, even when two
//! identities share an underlying file path and differ only in query
//! suffix. Records are created once and never replaced: a concurrent
//! create for the same identity observes the earlier record.

use std::collections::HashMap;
use std::rc::Rc;

use lode_resolve::format::ModuleFormat;
use lode_sourcemap::PositionMap;

use crate::identity::ModuleIdentity;

/// The outcome of intercepting one module identity
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub identity: ModuleIdentity,
    pub format: ModuleFormat,
    pub source: String,
    pub compiled: String,
    pub position_map: Rc<PositionMap>,
    pub backend_stamp: String,
}

/// Keyed store of module records, first writer wins
#[derive(Debug, Default)]
pub struct RecordStore {
    records: HashMap<String, Rc<ModuleRecord>>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identity: &ModuleIdentity) -> Option<Rc<ModuleRecord>> {
        self.records.get(identity.as_str()).cloned()
    }

    /// Insert a record unless one already exists for the same identity. The
    /// stored record is returned either way, so racing creators converge on
    /// one instance.
    pub fn insert_if_absent(&mut self, record: ModuleRecord) -> Rc<ModuleRecord> {
        self.records
            .entry(record.identity.as_str().to_string())
            .or_insert_with(|| Rc::new(record))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

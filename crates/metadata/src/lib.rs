//! Metadata-store collaborator: the durable catalog of names and rescue
//! points that `TreeRegistry::sync_with_metadata_storage` drains into.
//! Treated as opaque by the registry; this crate supplies an in-memory
//! reference implementation for tests and the demo binary.

use std::collections::HashMap;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use tsingest_core::{Addr, CanonicalName, Id};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("metadata store unavailable: {0}")]
    Unavailable(String),
}

/// Durable catalog of series names and rescue points.
///
/// Only ever touched under the registry's `metadata_lock`, so
/// implementations do not need to provide their own synchronization
/// beyond what's needed to be `Send + Sync` for sharing the handle.
pub trait MetadataStore: Send + Sync {
    fn insert_new_names(&self, names: Vec<(CanonicalName, Id)>) -> Result<(), MetadataError>;
    fn upsert_rescue_points(
        &self,
        points: HashMap<Id, Vec<Addr>>,
    ) -> Result<(), MetadataError>;
}

/// In-memory metadata store. Useful for tests and for the demo binary;
/// a production deployment would back this with a real durable catalog,
/// which is out of scope here.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    names: Mutex<Vec<(CanonicalName, Id)>>,
    rescue_points: Mutex<HashMap<Id, Vec<Addr>>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names_snapshot(&self) -> Vec<(CanonicalName, Id)> {
        self.names.lock().clone()
    }

    pub fn rescue_points_snapshot(&self) -> HashMap<Id, Vec<Addr>> {
        self.rescue_points.lock().clone()
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn insert_new_names(&self, names: Vec<(CanonicalName, Id)>) -> Result<(), MetadataError> {
        debug!(count = names.len(), "inserting new names into metadata store");
        self.names.lock().extend(names);
        Ok(())
    }

    fn upsert_rescue_points(
        &self,
        points: HashMap<Id, Vec<Addr>>,
    ) -> Result<(), MetadataError> {
        debug!(count = points.len(), "upserting rescue points into metadata store");
        self.rescue_points.lock().extend(points);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_upsert_accumulate() {
        let store = InMemoryMetadataStore::new();
        store
            .insert_new_names(vec![(CanonicalName::from(b"cpu".to_vec()), 1)])
            .unwrap();
        store
            .upsert_rescue_points(HashMap::from([(1, vec![100, 200])]))
            .unwrap();

        assert_eq!(store.names_snapshot().len(), 1);
        assert_eq!(store.rescue_points_snapshot().get(&1), Some(&vec![100, 200]));
    }

    #[test]
    fn upsert_overwrites_existing_id() {
        let store = InMemoryMetadataStore::new();
        store
            .upsert_rescue_points(HashMap::from([(1, vec![100])]))
            .unwrap();
        store
            .upsert_rescue_points(HashMap::from([(1, vec![200, 300])]))
            .unwrap();
        assert_eq!(store.rescue_points_snapshot().get(&1), Some(&vec![200, 300]));
    }
}

//! Bidirectional name↔id catalog, guarded by the registry's
//! `metadata_lock`.

use hashbrown::HashMap;

use tsingest_core::{CanonicalName, Id};

#[derive(Default)]
pub(crate) struct NameCatalog {
    name_to_id: HashMap<CanonicalName, Id>,
    id_to_name: HashMap<Id, CanonicalName>,
    next_id: Id,
    /// Names registered since the last call to
    /// `TreeRegistry::sync_with_metadata_storage`, drained into that
    /// sync's `insert_new_names` batch.
    pub(crate) pending_new_names: Vec<(CanonicalName, Id)>,
}

impl NameCatalog {
    pub(crate) fn new() -> Self {
        Self {
            name_to_id: HashMap::new(),
            id_to_name: HashMap::new(),
            // Id 0 is reserved as "no match".
            next_id: 1,
            pending_new_names: Vec::new(),
        }
    }

    pub(crate) fn lookup_id(&self, name: &CanonicalName) -> Option<Id> {
        self.name_to_id.get(name).copied()
    }

    pub(crate) fn lookup_name(&self, id: Id) -> Option<&CanonicalName> {
        self.id_to_name.get(&id)
    }

    /// Allocates a fresh id for `name` and inserts it both ways. Caller
    /// must have already confirmed `name` is absent.
    pub(crate) fn insert_new(&mut self, name: CanonicalName) -> Id {
        let id = self.next_id;
        self.next_id += 1;
        self.name_to_id.insert(name.clone(), id);
        self.id_to_name.insert(id, name.clone());
        self.pending_new_names.push((name, id));
        id
    }

    pub(crate) fn drain_pending(&mut self) -> Vec<(CanonicalName, Id)> {
        std::mem::take(&mut self.pending_new_names)
    }

    /// Puts names back after a failed sync so the next sync retries them.
    pub(crate) fn restore_pending(&mut self, mut names: Vec<(CanonicalName, Id)>) {
        names.append(&mut self.pending_new_names);
        self.pending_new_names = names;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_start_at_one_and_increment() {
        let mut cat = NameCatalog::new();
        let a = cat.insert_new(CanonicalName::from(b"a".to_vec()));
        let b = cat.insert_new(CanonicalName::from(b"b".to_vec()));
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[test]
    fn lookup_roundtrips_both_directions() {
        let mut cat = NameCatalog::new();
        let name = CanonicalName::from(b"cpu,host=a".to_vec());
        let id = cat.insert_new(name.clone());
        assert_eq!(cat.lookup_id(&name), Some(id));
        assert_eq!(cat.lookup_name(id), Some(&name));
    }

    #[test]
    fn pending_drains_exactly_once() {
        let mut cat = NameCatalog::new();
        cat.insert_new(CanonicalName::from(b"a".to_vec()));
        cat.insert_new(CanonicalName::from(b"b".to_vec()));
        assert_eq!(cat.drain_pending().len(), 2);
        assert!(cat.drain_pending().is_empty());
    }
}

//! Registry Entry: the per-series single-writer token.

use std::sync::Arc;

use parking_lot::Mutex;

use tsingest_core::{Addr, AppendOutcome, Status};
use tsingest_extent::ExtentList;

use crate::SessionToken;

struct EntryInner {
    extent: Box<dyn ExtentList>,
    owner: Option<SessionToken>,
}

/// Single-writer token wrapping one series' extent list.
///
/// Availability means no session currently holds this entry's write
/// grant. Rust does not give a race-free way to distinguish "the
/// registry's own `Arc`" from "a session's `Arc`" via strong-count alone,
/// so this uses an explicit `owner` field instead: set under this entry's
/// own mutex on acquire, cleared when the returned `EntryHandle` is
/// dropped.
pub struct RegistryEntry {
    inner: Mutex<EntryInner>,
}

impl RegistryEntry {
    pub fn new(extent: Box<dyn ExtentList>) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(EntryInner {
                extent,
                owner: None,
            }),
        })
    }

    /// True iff the entry's handle is not currently shared with any
    /// session.
    pub fn is_available(&self) -> bool {
        self.inner.lock().owner.is_none()
    }

    /// Atomically grants ownership if available. Never blocks waiting
    /// for availability — `Busy` is an expected, non-fatal signal used
    /// to trigger broadcast.
    pub fn try_acquire(self: &Arc<Self>, token: SessionToken) -> (Status, Option<EntryHandle>) {
        let mut inner = self.inner.lock();
        if inner.owner.is_some() {
            return (Status::Busy, None);
        }
        inner.owner = Some(token);
        drop(inner);
        (
            Status::Ok,
            Some(EntryHandle {
                entry: Arc::clone(self),
                token,
            }),
        )
    }

    fn release(&self, token: SessionToken) {
        let mut inner = self.inner.lock();
        if inner.owner == Some(token) {
            inner.owner = None;
        }
    }
}

/// A session's single-writer grant on one series' extent list. Dropping
/// this handle (session close, eviction, or replacement) returns the
/// entry to the available state automatically — that is the entire
/// release mechanism.
pub struct EntryHandle {
    entry: Arc<RegistryEntry>,
    token: SessionToken,
}

impl EntryHandle {
    pub fn append(&self, ts: i64, value: f64) -> AppendOutcome {
        self.entry.inner.lock().extent.append(ts, value)
    }

    pub fn get_roots(&self) -> Vec<Addr> {
        self.entry.inner.lock().extent.get_roots()
    }
}

impl Drop for EntryHandle {
    fn drop(&mut self) {
        self.entry.release(self.token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;
    use tsingest_extent::BufferedExtentList;
    use tsingest_store::{BlockStore, InMemoryBlockStore};

    fn entry() -> Arc<RegistryEntry> {
        let store: StdArc<dyn BlockStore> = StdArc::new(InMemoryBlockStore::new());
        RegistryEntry::new(Box::new(BufferedExtentList::new(store, 1024)))
    }

    #[test]
    fn second_acquire_is_busy_until_first_handle_drops() {
        let e = entry();
        assert!(e.is_available());

        let (status_a, handle_a) = e.try_acquire(1);
        assert_eq!(status_a, Status::Ok);
        assert!(!e.is_available());

        let (status_b, handle_b) = e.try_acquire(2);
        assert_eq!(status_b, Status::Busy);
        assert!(handle_b.is_none());

        drop(handle_a);
        assert!(e.is_available());

        let (status_c, handle_c) = e.try_acquire(2);
        assert_eq!(status_c, Status::Ok);
        assert!(handle_c.is_some());
    }

    #[test]
    fn try_acquire_never_blocks() {
        let e = entry();
        let _handle = e.try_acquire(1).1.unwrap();
        // Must return immediately with Busy, not block.
        let (status, handle) = e.try_acquire(2);
        assert_eq!(status, Status::Busy);
        assert!(handle.is_none());
    }
}

//! Tree Registry: the per-database catalog of series and the
//! single-writer extent-list table sessions acquire against.
//!
//! Lock hierarchy, acquired in this order and never reversed:
//! 1. a session's own `state` lock (session_lock)
//! 2. `metadata` (metadata_lock): catalog, rescue points, session roster
//! 3. `entry_table` (table_lock)
//! 4. a `RegistryEntry`'s own inner mutex
//!
//! `broadcast_sample` holds metadata_lock for the whole fan-out and calls
//! into other sessions' `receive_broadcast`, which only ever takes that
//! session's own state lock and never calls back into the registry — so
//! the chain session_lock -> metadata_lock -> (other) session_lock never
//! cycles back to metadata_lock and cannot deadlock.

mod catalog;
mod entry;
mod session;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use hashbrown::HashMap;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use tsingest_config::IngestConfig;
use tsingest_core::{Addr, AppendOutcome, CanonicalName, Id, Sample, Status};
use tsingest_extent::BufferedExtentList;
use tsingest_metadata::{MetadataError, MetadataStore};
use tsingest_store::BlockStore;

use catalog::NameCatalog;
use entry::RegistryEntry;

pub use entry::EntryHandle;
pub use session::IngestionSession;

/// Opaque per-session identity, used as the `owner` token on registry
/// entries and as the key in the active-session roster.
pub type SessionToken = u64;

/// Everything guarded by metadata_lock: the name/id catalog, the
/// in-memory rescue-point buffer awaiting sync, and weak handles to the
/// sessions currently attached.
struct MetadataState {
    catalog: NameCatalog,
    rescue_points: HashMap<Id, Vec<Addr>>,
    active_sessions: HashMap<SessionToken, Weak<IngestionSession>>,
}

impl MetadataState {
    fn new() -> Self {
        Self {
            catalog: NameCatalog::new(),
            rescue_points: HashMap::new(),
            active_sessions: HashMap::new(),
        }
    }
}

/// Result of delivering one sample to a non-owning session during
/// broadcast.
pub(crate) struct BroadcastDelivery {
    handled: bool,
    outcome: AppendOutcome,
    /// Populated only when `outcome == OkFlushNeeded`: `get_roots()` is a
    /// call on the session's own owned handle, not a call back into the
    /// registry, so it's safe to fetch here while the caller still holds
    /// metadata_lock.
    flush_roots: Option<Vec<Addr>>,
}

impl BroadcastDelivery {
    pub(crate) fn not_handled() -> Self {
        Self {
            handled: false,
            outcome: AppendOutcome::Ok,
            flush_roots: None,
        }
    }

    pub(crate) fn handled(outcome: AppendOutcome, flush_roots: Option<Vec<Addr>>) -> Self {
        Self {
            handled: true,
            outcome,
            flush_roots,
        }
    }
}

/// The ingestion registry: name/id catalog plus the table of per-series
/// single-writer entries.
pub struct TreeRegistry {
    metadata: Mutex<MetadataState>,
    sync_cvar: Condvar,
    entry_table: Mutex<HashMap<Id, Arc<RegistryEntry>>>,
    block_store: Arc<dyn BlockStore>,
    metadata_store: Arc<dyn MetadataStore>,
    config: IngestConfig,
    closed: AtomicBool,
    next_session_token: AtomicU64,
}

impl TreeRegistry {
    pub fn new(
        block_store: Arc<dyn BlockStore>,
        metadata_store: Arc<dyn MetadataStore>,
        config: IngestConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            metadata: Mutex::new(MetadataState::new()),
            sync_cvar: Condvar::new(),
            entry_table: Mutex::new(HashMap::new()),
            block_store,
            metadata_store,
            config,
            closed: AtomicBool::new(false),
            next_session_token: AtomicU64::new(1),
        })
    }

    pub(crate) fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Resolves `name` to its id, registering a fresh entry if this is
    /// the first time the registry has seen it.
    pub fn resolve_or_create_id(&self, name: &CanonicalName) -> Id {
        let mut meta = self.metadata.lock();
        if let Some(id) = meta.catalog.lookup_id(name) {
            return id;
        }

        let id = meta.catalog.insert_new(name.clone());
        let extent = Box::new(BufferedExtentList::new(
            Arc::clone(&self.block_store),
            self.config.flush_threshold,
        ));
        self.entry_table.lock().insert(id, RegistryEntry::new(extent));
        meta.rescue_points.insert(id, Vec::new());

        self.sync_cvar.notify_all();
        info!(id, "registered new series");
        id
    }

    /// Copies the canonical name for `id` into `buf`. Returns the number
    /// of bytes written, `0` if `id` is unknown, or the negated required
    /// length if `buf` is too small.
    pub fn get_series_name(&self, id: Id, buf: &mut [u8]) -> i32 {
        let meta = self.metadata.lock();
        match meta.catalog.lookup_name(id) {
            None => 0,
            Some(name) => write_name_into(name.as_bytes(), buf),
        }
    }

    pub(crate) fn lookup_name(&self, id: Id) -> Option<CanonicalName> {
        self.metadata.lock().catalog.lookup_name(id).cloned()
    }

    /// Attempts to grant single-writer ownership of `id`'s entry to
    /// `token`.
    pub fn try_acquire(&self, id: Id, token: SessionToken) -> (Status, Option<EntryHandle>) {
        let table = self.entry_table.lock();
        match table.get(&id) {
            None => (Status::NotFound, None),
            Some(entry) => entry.try_acquire(token),
        }
    }

    /// Delivers `sample` to whichever active session (other than
    /// `source`) currently owns `sample.id`'s entry.
    pub fn broadcast_sample(&self, sample: Sample, source: SessionToken) -> AppendOutcome {
        let mut meta = self.metadata.lock();

        let candidates: Vec<Weak<IngestionSession>> = meta
            .active_sessions
            .iter()
            .filter(|(&token, _)| token != source)
            .map(|(_, weak)| weak.clone())
            .collect();

        for weak in candidates {
            let Some(session) = weak.upgrade() else {
                continue;
            };
            let delivery = session.receive_broadcast(sample);
            if delivery.handled {
                if let Some(roots) = delivery.flush_roots {
                    meta.rescue_points.insert(sample.id, roots);
                }
                return delivery.outcome;
            }
        }

        if self.config.broadcast_log_misses {
            warn!(id = sample.id, source, "broadcast found no owning session");
        }
        AppendOutcome::FailBadId
    }

    /// Replaces (not merges) the buffered rescue points for `id`: callers
    /// always supply the full current root set, so a merge would be
    /// redundant at best and wrong if roots were ever pruned.
    pub fn update_rescue_points(&self, id: Id, roots: Vec<Addr>) {
        let mut meta = self.metadata.lock();
        meta.rescue_points.insert(id, roots);
        self.sync_cvar.notify_all();
    }

    /// Blocks until a rescue-point update has been published or
    /// `timeout` elapses.
    pub fn wait_for_sync_request(&self, timeout: Duration) -> Status {
        let mut meta = self.metadata.lock();
        if !meta.rescue_points.is_empty() {
            return Status::Ok;
        }
        let result = self.sync_cvar.wait_for(&mut meta, timeout);
        if result.timed_out() {
            Status::Timeout
        } else if meta.rescue_points.is_empty() {
            Status::Retry
        } else {
            Status::Ok
        }
    }

    /// Drains pending names and rescue points into the metadata store
    /// under metadata_lock, held for the duration so the snapshot handed
    /// to the store is atomic. On failure the rescue-point buffer (and
    /// any drained names) are restored so a retry can pick them back up.
    pub fn sync_with_metadata_storage(&self) -> Result<(), MetadataError> {
        let mut meta = self.metadata.lock();

        let names = meta.catalog.drain_pending();
        if !names.is_empty() {
            if let Err(err) = self.metadata_store.insert_new_names(names.clone()) {
                meta.catalog.restore_pending(names);
                return Err(err);
            }
        }

        let points = std::mem::take(&mut meta.rescue_points);
        if !points.is_empty() {
            if let Err(err) = self.metadata_store.upsert_rescue_points(points.clone()) {
                meta.rescue_points = points;
                return Err(err);
            }
        }

        debug!("metadata sync complete");
        Ok(())
    }

    /// Creates a new session and registers it in the active roster.
    pub fn create_session(self: &Arc<Self>) -> Arc<IngestionSession> {
        let token = self.next_session_token.fetch_add(1, Ordering::Relaxed);
        let session = Arc::new(IngestionSession::new(token, Arc::clone(self)));
        self.metadata
            .lock()
            .active_sessions
            .insert(token, Arc::downgrade(&session));
        info!(token, "session created");
        session
    }

    pub(crate) fn remove_dispatcher(&self, token: SessionToken) {
        self.metadata.lock().active_sessions.remove(&token);
        debug!(token, "session removed from broadcast roster");
    }

    /// Number of sessions currently attached.
    pub fn session_count(&self) -> usize {
        self.metadata.lock().active_sessions.len()
    }

    /// Number of series registered so far.
    pub fn series_count(&self) -> usize {
        self.entry_table.lock().len()
    }

    /// Marks the registry closed and wakes any thread blocked in
    /// `wait_for_sync_request` so it can observe `Status::Closed` paths
    /// upstream.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.sync_cvar.notify_all();
        info!("registry shut down");
    }
}

fn write_name_into(bytes: &[u8], buf: &mut [u8]) -> i32 {
    if bytes.len() > buf.len() {
        return -(bytes.len() as i32);
    }
    buf[..bytes.len()].copy_from_slice(bytes);
    bytes.len() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsingest_metadata::InMemoryMetadataStore;
    use tsingest_store::InMemoryBlockStore;

    fn registry() -> Arc<TreeRegistry> {
        TreeRegistry::new(
            Arc::new(InMemoryBlockStore::new()),
            Arc::new(InMemoryMetadataStore::new()),
            IngestConfig::default(),
        )
    }

    #[test]
    fn resolve_or_create_id_is_stable() {
        let reg = registry();
        let name = CanonicalName::from(b"cpu,host=a".to_vec());
        let a = reg.resolve_or_create_id(&name);
        let b = reg.resolve_or_create_id(&name);
        assert_eq!(a, b);
        assert_eq!(reg.series_count(), 1);
    }

    #[test]
    fn get_series_name_reports_required_length() {
        let reg = registry();
        let name = CanonicalName::from(b"cpu,host=a".to_vec());
        let id = reg.resolve_or_create_id(&name);

        let mut small = [0u8; 2];
        assert_eq!(reg.get_series_name(id, &mut small), -10);

        let mut big = [0u8; 32];
        let n = reg.get_series_name(id, &mut big);
        assert_eq!(n, 10);
        assert_eq!(&big[..10], name.as_bytes());
    }

    #[test]
    fn get_series_name_unknown_id_is_zero() {
        let reg = registry();
        let mut buf = [0u8; 8];
        assert_eq!(reg.get_series_name(9999, &mut buf), 0);
    }

    #[test]
    fn try_acquire_unknown_id_is_not_found() {
        let reg = registry();
        let (status, handle) = reg.try_acquire(9999, 1);
        assert_eq!(status, Status::NotFound);
        assert!(handle.is_none());
    }

    #[test]
    fn wait_for_sync_request_times_out_with_no_pending_points() {
        let reg = registry();
        assert_eq!(
            reg.wait_for_sync_request(Duration::from_millis(20)),
            Status::Timeout
        );
    }

    #[test]
    fn wait_for_sync_request_sees_new_series_immediately() {
        let reg = registry();
        reg.resolve_or_create_id(&CanonicalName::from(b"cpu".to_vec()));
        assert_eq!(
            reg.wait_for_sync_request(Duration::from_millis(20)),
            Status::Ok
        );
    }

    #[test]
    fn sync_drains_pending_names_and_rescue_points() {
        let reg = registry();
        reg.resolve_or_create_id(&CanonicalName::from(b"cpu".to_vec()));
        reg.sync_with_metadata_storage().unwrap();
        assert_eq!(
            reg.wait_for_sync_request(Duration::from_millis(20)),
            Status::Timeout
        );
    }

    #[test]
    fn shutdown_wakes_waiters() {
        let reg = registry();
        reg.shutdown();
        assert!(reg.is_closed());
        assert_eq!(
            reg.wait_for_sync_request(Duration::from_millis(20)),
            Status::Timeout
        );
    }
}

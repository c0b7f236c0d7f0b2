//! Ingestion Session: the per-connection front end that mirrors id/name
//! lookups locally and owns whichever entries it has acquired.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::debug;

use tsingest_core::{AppendOutcome, CanonicalName, Id, Sample, Status};

use crate::entry::EntryHandle;
use crate::{BroadcastDelivery, SessionToken, TreeRegistry};

#[derive(Default)]
struct SessionState {
    local_names: HashMap<CanonicalName, Id>,
    local_ids: HashMap<Id, CanonicalName>,
    owned_entries: HashMap<Id, EntryHandle>,
}

/// One ingestion connection's view onto a [`TreeRegistry`]: a local
/// name/id mirror plus whatever series entries it currently owns.
///
/// Every public method here takes the session's own `state` lock first,
/// calling into the registry only while holding it — this is the
/// `session_lock` at the top of the hierarchy documented on
/// [`TreeRegistry`].
pub struct IngestionSession {
    token: SessionToken,
    registry: Arc<TreeRegistry>,
    state: Mutex<SessionState>,
    closed: AtomicBool,
}

impl IngestionSession {
    pub(crate) fn new(token: SessionToken, registry: Arc<TreeRegistry>) -> Self {
        Self {
            token,
            registry,
            state: Mutex::new(SessionState::default()),
            closed: AtomicBool::new(false),
        }
    }

    /// The token this session presents to the registry as its owner id.
    pub fn id(&self) -> SessionToken {
        self.token
    }

    /// Resolves `raw_name` to its series id, normalizing first and
    /// checking the local mirror before asking the registry.
    pub fn init_series_id(&self, raw_name: &str) -> Result<Id, Status> {
        let max_len = self.registry.config().max_series_name_len;
        let mut scratch = vec![0u8; max_len];
        let len = tsingest_normalize::normalize(raw_name, &mut scratch).map_err(|_| Status::BadArg)?;
        scratch.truncate(len);
        let name = CanonicalName::from(scratch);

        if let Some(&id) = self.state.lock().local_names.get(name.as_bytes()) {
            return Ok(id);
        }

        let id = self.registry.resolve_or_create_id(&name);
        let mut state = self.state.lock();
        state.local_ids.insert(id, name.clone());
        state.local_names.insert(name, id);
        Ok(id)
    }

    /// Copies the canonical name for `id` into `buf`, consulting the
    /// local mirror before falling back to the registry. Same return
    /// convention as `TreeRegistry::get_series_name`. The local mirror is
    /// populated whenever the registry knows `id`, even if `buf` turns out
    /// to be too small to hold the name — only the byte copy is
    /// conditional on the buffer size, not the caching.
    pub fn get_series_name(&self, id: Id, buf: &mut [u8]) -> i32 {
        {
            let state = self.state.lock();
            if let Some(name) = state.local_ids.get(&id) {
                return write_name(name.as_bytes(), buf);
            }
        }

        let Some(name) = self.registry.lookup_name(id) else {
            return 0;
        };
        {
            let mut state = self.state.lock();
            state.local_ids.insert(id, name.clone());
            state.local_names.insert(name.clone(), id);
        }
        write_name(name.as_bytes(), buf)
    }

    /// Writes one sample, acquiring the series' entry on first touch and
    /// broadcasting to its owner if another session already holds it.
    pub fn write(&self, sample: Sample) -> Status {
        if self.registry.is_closed() {
            return Status::Closed;
        }
        let Some(value) = sample.payload.as_float() else {
            return Status::BadArg;
        };

        let mut state = self.state.lock();

        if let Some(handle) = state.owned_entries.get(&sample.id) {
            let outcome = handle.append(sample.timestamp, value);
            return self.finish_owned_append(sample.id, outcome, handle);
        }

        match self.registry.try_acquire(sample.id, self.token) {
            (Status::Ok, Some(handle)) => {
                let outcome = handle.append(sample.timestamp, value);
                let status = self.finish_owned_append(sample.id, outcome, &handle);
                state.owned_entries.insert(sample.id, handle);
                status
            }
            (Status::Busy, _) => {
                debug!(id = sample.id, token = self.token, "series busy, broadcasting");
                self.registry.broadcast_sample(sample, self.token).to_status()
            }
            (other, _) => other,
        }
    }

    fn finish_owned_append(&self, id: Id, outcome: AppendOutcome, handle: &EntryHandle) -> Status {
        if outcome == AppendOutcome::OkFlushNeeded {
            self.registry.update_rescue_points(id, handle.get_roots());
        }
        outcome.to_status()
    }

    /// Delivers a broadcast sample if this session owns `sample.id`'s
    /// entry. Only ever takes this session's own `state` lock — never
    /// calls back into the registry, which is what lets
    /// `TreeRegistry::broadcast_sample` call this while holding
    /// metadata_lock without deadlocking.
    pub(crate) fn receive_broadcast(&self, sample: Sample) -> BroadcastDelivery {
        let state = self.state.lock();
        let Some(handle) = state.owned_entries.get(&sample.id) else {
            return BroadcastDelivery::not_handled();
        };
        let Some(value) = sample.payload.as_float() else {
            return BroadcastDelivery::not_handled();
        };

        let outcome = handle.append(sample.timestamp, value);
        let flush_roots = (outcome == AppendOutcome::OkFlushNeeded).then(|| handle.get_roots());
        BroadcastDelivery::handled(outcome, flush_roots)
    }

    /// Releases every owned entry and detaches from the broadcast
    /// roster. Idempotent — safe to call explicitly and again from
    /// `Drop`.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.state.lock().owned_entries.clear();
        self.registry.remove_dispatcher(self.token);
    }
}

impl Drop for IngestionSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn write_name(bytes: &[u8], buf: &mut [u8]) -> i32 {
    if bytes.len() > buf.len() {
        return -(bytes.len() as i32);
    }
    buf[..bytes.len()].copy_from_slice(bytes);
    bytes.len() as i32
}

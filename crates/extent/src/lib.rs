//! Extent-list collaborator: the persistent, single-writer append
//! structure backing one series. The handle itself is not thread-safe —
//! single-writer discipline is enforced by the registry, never by this
//! crate.

mod encoding;

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use tsingest_core::{Addr, AppendOutcome};
use tsingest_store::{BlockStore, StoreError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtentError {
    #[error("failed to recover extent list: {0}")]
    Recovery(#[from] StoreError),
}

/// Persistent, single-writer append structure for one series.
///
/// `append` is `&mut self` to make the single-writer contract visible
/// at the type level: only whoever holds the handle (i.e. whoever's
/// `owned_entries` it lives in) can call it.
pub trait ExtentList: Send {
    fn append(&mut self, ts: i64, value: f64) -> AppendOutcome;
    fn get_roots(&self) -> Vec<Addr>;
}

/// Reference extent-list implementation: buffers samples in memory and
/// flushes them as a single block to the backing `BlockStore` once
/// `flush_threshold` samples have accumulated, reporting
/// `OkFlushNeeded` on the append that triggers a flush so the caller
/// knows to publish the new root set as a rescue point.
///
/// `FailBadId` is part of the `AppendOutcome` contract for test doubles
/// but this implementation never produces it: id validity is established
/// once by the registry before a handle is ever handed to a session.
pub struct BufferedExtentList {
    store: Arc<dyn BlockStore>,
    flush_threshold: usize,
    watermark: i64,
    buffer: Vec<(i64, f64)>,
    roots: Vec<Addr>,
}

impl BufferedExtentList {
    /// Creates a new, empty extent list with no rescue points yet.
    pub fn new(store: Arc<dyn BlockStore>, flush_threshold: usize) -> Self {
        Self {
            store,
            flush_threshold,
            watermark: i64::MIN,
            buffer: Vec::new(),
            roots: Vec::new(),
        }
    }

    /// Recovers an extent list from a list of root block addresses,
    /// reconstructing the append watermark from the most recent sample
    /// in each block.
    pub fn recover(
        store: Arc<dyn BlockStore>,
        flush_threshold: usize,
        roots: Vec<Addr>,
    ) -> Result<Self, ExtentError> {
        let mut watermark = i64::MIN;
        for addr in &roots {
            let block = store.read(*addr)?;
            if let Some((ts, _)) = encoding::decode_block(&block).last() {
                watermark = watermark.max(*ts);
            }
        }
        Ok(Self {
            store,
            flush_threshold,
            watermark,
            buffer: Vec::new(),
            roots,
        })
    }

    fn flush(&mut self) {
        let block = encoding::encode_block(&self.buffer);
        match self.store.append(block) {
            Ok(addr) => {
                self.roots.push(addr);
                self.buffer.clear();
                debug!(addr, roots = self.roots.len(), "flushed extent list buffer");
            }
            Err(err) => {
                // The block store is assumed infallible for in-memory use;
                // keep the buffer intact so a later flush can retry.
                debug!(?err, "extent list flush failed, buffer retained");
            }
        }
    }
}

impl ExtentList for BufferedExtentList {
    fn append(&mut self, ts: i64, value: f64) -> AppendOutcome {
        if ts < self.watermark {
            return AppendOutcome::FailLateWrite;
        }
        self.watermark = ts;
        self.buffer.push((ts, value));

        if self.buffer.len() >= self.flush_threshold {
            self.flush();
            AppendOutcome::OkFlushNeeded
        } else {
            AppendOutcome::Ok
        }
    }

    fn get_roots(&self) -> Vec<Addr> {
        self.roots.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsingest_store::InMemoryBlockStore;

    #[test]
    fn appends_below_threshold_stay_ok() {
        let store: Arc<dyn BlockStore> = Arc::new(InMemoryBlockStore::new());
        let mut extent = BufferedExtentList::new(store, 10);
        assert_eq!(extent.append(1, 1.0), AppendOutcome::Ok);
        assert!(extent.get_roots().is_empty());
    }

    #[test]
    fn flush_triggers_on_threshold() {
        let store: Arc<dyn BlockStore> = Arc::new(InMemoryBlockStore::new());
        let mut extent = BufferedExtentList::new(store, 2);
        assert_eq!(extent.append(1, 1.0), AppendOutcome::Ok);
        assert_eq!(extent.append(2, 2.0), AppendOutcome::OkFlushNeeded);
        assert_eq!(extent.get_roots().len(), 1);
    }

    #[test]
    fn late_write_is_rejected() {
        let store: Arc<dyn BlockStore> = Arc::new(InMemoryBlockStore::new());
        let mut extent = BufferedExtentList::new(store, 10);
        assert_eq!(extent.append(10, 1.0), AppendOutcome::Ok);
        assert_eq!(extent.append(5, 2.0), AppendOutcome::FailLateWrite);
    }

    #[test]
    fn recover_reconstructs_watermark() {
        let store: Arc<dyn BlockStore> = Arc::new(InMemoryBlockStore::new());
        let mut extent = BufferedExtentList::new(store.clone(), 2);
        extent.append(1, 1.0);
        extent.append(2, 2.0);
        let roots = extent.get_roots();

        let mut recovered = BufferedExtentList::recover(store, 2, roots).unwrap();
        assert_eq!(recovered.append(1, 3.0), AppendOutcome::FailLateWrite);
        assert_eq!(recovered.append(3, 3.0), AppendOutcome::Ok);
    }
}

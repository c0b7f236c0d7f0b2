//! Block store collaborator: `append(block) -> addr` / `read(addr) ->
//! block`. Treated as opaque and externally thread-safe by the rest of
//! the registry; this crate supplies a concrete, content-addressed,
//! in-memory reference implementation so `tsingest-extent` and the rest
//! of the workspace compile and are testable without an on-disk engine
//! (on-disk block layout is out of scope here).

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use thiserror::Error;
use tracing::trace;

use tsingest_core::Addr;

pub type Block = Vec<u8>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("no block at address {0}")]
    NotFound(Addr),
}

/// Opaque, thread-safe block store. Implementations must be safe to
/// share across every session and the registry without external
/// synchronization.
pub trait BlockStore: Send + Sync {
    fn append(&self, block: Block) -> Result<Addr, StoreError>;
    fn read(&self, addr: Addr) -> Result<Block, StoreError>;
}

/// In-memory, content-addressed block store. The address is derived
/// from a BLAKE3 hash of the block's contents plus an insertion
/// sequence number folded in, so repeated `append` calls with distinct
/// content never collide and identical content is safe to re-append
/// (idempotent, as a real content-addressed store would be).
#[derive(Default)]
pub struct InMemoryBlockStore {
    blocks: DashMap<Addr, Block>,
    sequence: AtomicU64,
}

impl InMemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    fn compute_addr(&self, block: &[u8]) -> Addr {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let mut hasher = blake3::Hasher::new();
        hasher.update(block);
        hasher.update(&seq.to_le_bytes());
        let hash = hasher.finalize();
        let bytes: [u8; 8] = hash.as_bytes()[..8].try_into().expect("8 bytes");
        u64::from_le_bytes(bytes)
    }
}

impl BlockStore for InMemoryBlockStore {
    fn append(&self, block: Block) -> Result<Addr, StoreError> {
        let addr = self.compute_addr(&block);
        trace!(addr, bytes = block.len(), "appended block");
        self.blocks.insert(addr, block);
        Ok(addr)
    }

    fn read(&self, addr: Addr) -> Result<Block, StoreError> {
        self.blocks
            .get(&addr)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_read_roundtrips() {
        let store = InMemoryBlockStore::new();
        let addr = store.append(vec![1, 2, 3]).unwrap();
        assert_eq!(store.read(addr).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn distinct_appends_get_distinct_addresses() {
        let store = InMemoryBlockStore::new();
        let a = store.append(vec![1]).unwrap();
        let b = store.append(vec![1]).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn read_missing_address_errors() {
        let store = InMemoryBlockStore::new();
        assert_eq!(store.read(42), Err(StoreError::NotFound(42)));
    }
}

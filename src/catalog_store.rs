//! Shared catalog snapshot store.
//!
//! The loader is the single writer; every other component reads. A load
//! obtains a generation token up front and may only publish while its token
//! is still the newest issued, so a slow load finishing after a newer one
//! started is discarded rather than overwriting fresher data.

use std::sync::{Arc, Mutex};

use crate::catalog::CatalogSnapshot;

struct StoreState {
    snapshot: CatalogSnapshot,
    issued_generation: u64,
    published_generation: u64,
}

/// Handle to the process-wide catalog snapshot. Cheap to clone.
#[derive(Clone)]
pub struct CatalogStore {
    inner: Arc<Mutex<StoreState>>,
}

impl CatalogStore {
    pub fn new() -> CatalogStore {
        CatalogStore {
            inner: Arc::new(Mutex::new(StoreState {
                snapshot: CatalogSnapshot::empty(),
                issued_generation: 0,
                published_generation: 0,
            })),
        }
    }

    /// Registers a new load and returns its generation token. Issuing a
    /// token immediately de-authorizes every older in-flight load.
    pub fn begin_load(&self) -> u64 {
        let mut state = self.inner.lock().expect("catalog store lock poisoned");
        state.issued_generation += 1;
        state.issued_generation
    }

    /// Swaps in a completed snapshot. Returns `false` when the token is no
    /// longer the newest issued; the caller must drop the snapshot.
    pub fn publish(&self, generation: u64, snapshot: CatalogSnapshot) -> bool {
        let mut state = self.inner.lock().expect("catalog store lock poisoned");
        if generation != state.issued_generation {
            return false;
        }
        state.snapshot = snapshot;
        state.published_generation = generation;
        true
    }

    /// Current published snapshot. Readers always observe a complete load,
    /// never a partially built one.
    pub fn snapshot(&self) -> CatalogSnapshot {
        let state = self.inner.lock().expect("catalog store lock poisoned");
        state.snapshot.clone()
    }

    pub fn published_generation(&self) -> u64 {
        let state = self.inner.lock().expect("catalog store lock poisoned");
        state.published_generation
    }
}

impl Default for CatalogStore {
    fn default() -> CatalogStore {
        CatalogStore::new()
    }
}

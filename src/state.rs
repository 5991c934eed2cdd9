//! Shared per-index writer state.
//!
//! [`SharedCoreState`] owns what every coordinator instance of the same index
//! must agree on: the commit lock (one hard commit or writer-lifecycle
//! operation at a time), the update lock (serializes multi-step
//! read-modify-append sequences against a commit's searcher swap), the
//! lease-counted writer handle, and the searcher generations.

use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crossbeam_channel::Receiver;
use parking_lot::{Mutex, RwLock};

use crate::engine::IndexEngine;
use crate::error::Result;

/// A scoped lease on the index writer.
///
/// Dereferences to the engine; the lease is released when the guard drops, on
/// every exit path.
pub struct WriterLease {
    engine: Arc<dyn IndexEngine>,
    leases: Arc<AtomicUsize>,
}

impl Deref for WriterLease {
    type Target = dyn IndexEngine;

    fn deref(&self) -> &Self::Target {
        self.engine.as_ref()
    }
}

impl Drop for WriterLease {
    fn drop(&mut self) {
        self.leases.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A waitable handle for a searcher registration.
///
/// The handle resolves once the searcher is registered and warmed; for the
/// in-memory core that is immediate.
pub struct SearcherWarmup {
    ready: Receiver<()>,
}

impl SearcherWarmup {
    fn ready_now() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let _ = tx.send(());
        SearcherWarmup { ready: rx }
    }

    /// Block until the searcher is registered.
    pub fn wait(self) {
        let _ = self.ready.recv();
    }
}

/// State shared across coordinator instances of one index.
pub struct SharedCoreState {
    engine: RwLock<Arc<dyn IndexEngine>>,
    leases: Arc<AtomicUsize>,
    commit_lock: Mutex<()>,
    update_lock: Mutex<()>,
    searcher_gen: AtomicU64,
    realtime_gen: AtomicU64,
}

impl std::fmt::Debug for SharedCoreState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedCoreState")
            .field("active_leases", &self.active_leases())
            .field("searcher_gen", &self.searcher_gen.load(Ordering::SeqCst))
            .field("realtime_gen", &self.realtime_gen.load(Ordering::SeqCst))
            .finish()
    }
}

impl SharedCoreState {
    /// Create shared state over an index engine.
    pub fn new(engine: Arc<dyn IndexEngine>) -> Self {
        SharedCoreState {
            engine: RwLock::new(engine),
            leases: Arc::new(AtomicUsize::new(0)),
            commit_lock: Mutex::new(()),
            update_lock: Mutex::new(()),
            searcher_gen: AtomicU64::new(0),
            realtime_gen: AtomicU64::new(0),
        }
    }

    /// Acquire a lease on the index writer.
    pub fn acquire_writer(&self) -> WriterLease {
        self.leases.fetch_add(1, Ordering::SeqCst);
        WriterLease {
            engine: self.engine.read().clone(),
            leases: self.leases.clone(),
        }
    }

    /// Number of outstanding writer leases.
    pub fn active_leases(&self) -> usize {
        self.leases.load(Ordering::SeqCst)
    }

    /// The lock serializing hard commits and writer-lifecycle operations.
    pub fn commit_lock(&self) -> &Mutex<()> {
        &self.commit_lock
    }

    /// The lock serializing multi-step update sequences against a commit's
    /// searcher-swap phase.
    pub fn update_lock(&self) -> &Mutex<()> {
        &self.update_lock
    }

    /// Retire the current writer and continue over the same committed state.
    /// With `rollback`, uncommitted writer state is discarded first.
    pub fn new_index_writer(&self, rollback: bool) -> Result<()> {
        let _guard = self.commit_lock.lock();
        let engine = self.engine.read().clone();
        if rollback {
            engine.rollback()?;
        }
        Ok(())
    }

    /// Discard the writer's uncommitted state.
    pub fn rollback_index_writer(&self) -> Result<()> {
        self.new_index_writer(true)
    }

    /// Open and register a new searcher visible to client queries. The
    /// realtime view is refreshed along with it.
    pub fn open_registered_searcher(&self) -> SearcherWarmup {
        self.searcher_gen.fetch_add(1, Ordering::SeqCst);
        self.realtime_gen.fetch_add(1, Ordering::SeqCst);
        SearcherWarmup::ready_now()
    }

    /// Refresh the realtime view without registering a searcher for client
    /// queries.
    pub fn open_realtime_searcher(&self) {
        self.realtime_gen.fetch_add(1, Ordering::SeqCst);
    }

    /// Generation of the registered searcher.
    pub fn searcher_generation(&self) -> u64 {
        self.searcher_gen.load(Ordering::SeqCst)
    }

    /// Generation of the realtime view.
    pub fn realtime_generation(&self) -> u64 {
        self.realtime_gen.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::MemoryIndexEngine;

    fn make_state() -> SharedCoreState {
        SharedCoreState::new(Arc::new(MemoryIndexEngine::new()))
    }

    #[test]
    fn test_lease_released_on_drop() {
        let state = make_state();
        assert_eq!(state.active_leases(), 0);

        {
            let _lease = state.acquire_writer();
            assert_eq!(state.active_leases(), 1);
            let _second = state.acquire_writer();
            assert_eq!(state.active_leases(), 2);
        }

        assert_eq!(state.active_leases(), 0);
    }

    #[test]
    fn test_lease_released_on_error_path() {
        let state = make_state();

        let result: crate::Result<()> = (|| {
            let lease = state.acquire_writer();
            lease.delete_all()?;
            Err(crate::ArnicaError::index("simulated failure"))
        })();

        assert!(result.is_err());
        assert_eq!(state.active_leases(), 0);
    }

    #[test]
    fn test_searcher_generations() {
        let state = make_state();
        assert_eq!(state.searcher_generation(), 0);
        assert_eq!(state.realtime_generation(), 0);

        state.open_realtime_searcher();
        assert_eq!(state.searcher_generation(), 0);
        assert_eq!(state.realtime_generation(), 1);

        let warmup = state.open_registered_searcher();
        warmup.wait();
        assert_eq!(state.searcher_generation(), 1);
        assert_eq!(state.realtime_generation(), 2);
    }

    #[test]
    fn test_rollback_index_writer() {
        let engine = Arc::new(MemoryIndexEngine::new());
        let state = SharedCoreState::new(engine.clone());

        engine
            .add_document(crate::Document::new_with_id("a"))
            .unwrap();
        assert!(engine.has_uncommitted_changes());

        state.rollback_index_writer().unwrap();
        assert!(!engine.has_uncommitted_changes());
        assert_eq!(engine.num_live_docs(), 0);
    }
}

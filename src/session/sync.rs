//! Persistence synchronizer: the flush paths between a live session and its store.

use crate::core::state::{MeditationSnapshot, PlayerRecord, ProgressionState};
use crate::persistence::{ProgressionStore, StorageError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Writes session state out without blocking the tick loop.
///
/// - `flush_record` is the synchronous path used by stop, breakthrough and
///   method operations. The caller waits for it, but the write itself runs
///   on the blocking pool.
/// - `flush_snapshot` is the periodic/visibility path; it returns at once
///   and the write happens on the blocking pool.
/// - `emergency_flush` is the send-and-forget path for abrupt termination.
///
/// Every write is numbered when it is issued. A background write that only
/// reaches the store after a later write has landed is dropped, so storage
/// never goes backwards.
///
/// None of these retry. Failures are logged; the caller decides what to
/// remember about them.
#[derive(Clone)]
pub struct PersistenceSynchronizer {
    store: Arc<dyn ProgressionStore>,
    order: Arc<WriteOrder>,
}

#[derive(Default)]
struct WriteOrder {
    issued: AtomicU64,
    /// Sequence number of the newest write that reached the store
    landed: Mutex<u64>,
}

impl WriteOrder {
    fn issue(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Run `write` unless something newer than `seq` already landed.
    /// Returns `None` for a skipped write.
    fn apply(
        &self,
        seq: u64,
        write: impl FnOnce() -> Result<(), StorageError>,
    ) -> Option<Result<(), StorageError>> {
        let mut landed = self
            .landed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *landed > seq {
            return None;
        }
        let result = write();
        if result.is_ok() {
            *landed = seq;
        }
        Some(result)
    }
}

impl PersistenceSynchronizer {
    pub fn new(store: Arc<dyn ProgressionStore>) -> Self {
        Self {
            store,
            order: Arc::new(WriteOrder::default()),
        }
    }

    pub async fn flush_record(&self, record: &PlayerRecord) -> Result<(), StorageError> {
        let seq = self.order.issue();
        let store = Arc::clone(&self.store);
        let order = Arc::clone(&self.order);
        let owned = record.clone();
        let result = tokio::task::spawn_blocking(move || {
            order
                .apply(seq, || store.save_record(&owned))
                .unwrap_or(Ok(()))
        })
        .await
        .unwrap_or_else(|e| Err(StorageError::Unavailable(format!("save task failed: {e}"))));
        match &result {
            Ok(()) => debug!(user_id = %record.user_id(), "record saved"),
            Err(e) => warn!(user_id = %record.user_id(), error = %e, "record save failed"),
        }
        result
    }

    pub fn flush_snapshot(&self, snapshot: MeditationSnapshot) {
        self.spawn_snapshot(snapshot, "snapshot");
    }

    /// Last-chance write with `is_meditating` forced off, so a dead session
    /// is never resumed from storage as still meditating.
    pub fn emergency_flush(&self, state: &ProgressionState) {
        let mut snapshot = state.snapshot();
        snapshot.is_meditating = false;
        self.spawn_snapshot(snapshot, "emergency snapshot");
    }

    fn spawn_snapshot(&self, snapshot: MeditationSnapshot, kind: &'static str) {
        let seq = self.order.issue();
        let store = Arc::clone(&self.store);
        let order = Arc::clone(&self.order);
        spawn_detached(move || {
            match order.apply(seq, || store.write_snapshot(&snapshot)) {
                Some(Ok(())) => debug!(
                    user_id = %snapshot.user_id,
                    spirit_power = snapshot.spirit_power,
                    "{} saved",
                    kind
                ),
                Some(Err(e)) => warn!(user_id = %snapshot.user_id, error = %e, "{} failed", kind),
                None => debug!(user_id = %snapshot.user_id, "stale {} skipped", kind),
            }
        });
    }
}

/// Run `job` off the async workers: on the blocking pool inside a runtime,
/// on a plain thread outside one.
fn spawn_detached<F>(job: F)
where
    F: FnOnce() + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(job);
        }
        Err(_) => {
            std::thread::spawn(job);
        }
    }
}

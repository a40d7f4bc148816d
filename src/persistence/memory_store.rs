use super::{ProgressionStore, StorageError};
use crate::core::state::{MeditationSnapshot, PlayerRecord};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-process store. Counts writes and can be told to fail them.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, PlayerRecord>>,
    record_writes: AtomicUsize,
    snapshot_writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record without counting it as a write.
    pub fn insert(&self, record: PlayerRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.insert(record.user_id().to_string(), record);
        }
    }

    pub fn get(&self, user_id: &str) -> Option<PlayerRecord> {
        self.records.lock().ok()?.get(user_id).cloned()
    }

    pub fn record_writes(&self) -> usize {
        self.record_writes.load(Ordering::SeqCst)
    }

    pub fn snapshot_writes(&self) -> usize {
        self.snapshot_writes.load(Ordering::SeqCst)
    }

    pub fn total_writes(&self) -> usize {
        self.record_writes() + self.snapshot_writes()
    }

    /// While set, every write returns `Unavailable` and changes nothing.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable("writes disabled".to_string()))
        } else {
            Ok(())
        }
    }

    fn records(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, PlayerRecord>>, StorageError> {
        self.records
            .lock()
            .map_err(|_| StorageError::Unavailable("store lock poisoned".to_string()))
    }
}

impl ProgressionStore for MemoryStore {
    fn load(&self, user_id: &str) -> Result<Option<PlayerRecord>, StorageError> {
        Ok(self.records()?.get(user_id).cloned())
    }

    fn save_record(&self, record: &PlayerRecord) -> Result<(), StorageError> {
        self.check_writable()?;
        self.records()?
            .insert(record.user_id().to_string(), record.clone());
        self.record_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn write_snapshot(&self, snapshot: &MeditationSnapshot) -> Result<(), StorageError> {
        self.check_writable()?;
        let mut records = self.records()?;
        let record = records
            .get_mut(&snapshot.user_id)
            .ok_or_else(|| StorageError::MissingRecord(snapshot.user_id.clone()))?;
        snapshot.apply_to(&mut record.progression);
        self.snapshot_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use tracing::warn;

use crate::error::StorageError;
use crate::idempotency::{BeginOutcome, CommandResult, IdempotencyRecord, IdempotencyStore};

/// In-memory [`IdempotencyStore`]. The compare-and-set runs under one mutex.
#[derive(Clone, Default)]
pub struct HashMapIdempotencyStore {
    records: Arc<Mutex<HashMap<String, IdempotencyRecord>>>,
}

impl HashMapIdempotencyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held, expired ones included.
    pub fn len(&self) -> Result<usize, StorageError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, IdempotencyRecord>>, StorageError> {
        self.records
            .lock()
            .map_err(|_| StorageError::Poisoned("idempotency records"))
    }
}

impl IdempotencyStore for HashMapIdempotencyStore {
    fn get(&self, key: &str) -> Result<Option<IdempotencyRecord>, StorageError> {
        let now = SystemTime::now();
        Ok(self
            .lock()?
            .get(key)
            .filter(|record| !record.is_expired_at(now))
            .cloned())
    }

    fn try_begin(&self, key: &str, lease: Option<Duration>) -> Result<BeginOutcome, StorageError> {
        let mut records = self.lock()?;
        let now = SystemTime::now();

        if let Some(record) = records.get(key) {
            if !record.is_expired_at(now) {
                return Ok(record.outcome());
            }
        }

        records.insert(
            key.to_string(),
            IdempotencyRecord::processing(key, lease, now),
        );
        Ok(BeginOutcome::Acquired)
    }

    fn complete(
        &self,
        key: &str,
        result: CommandResult,
        ttl: Duration,
    ) -> Result<CommandResult, StorageError> {
        let mut records = self.lock()?;
        let record = records.get_mut(key).ok_or(StorageError::NoRows)?;
        if !record.complete(result, ttl, SystemTime::now()) {
            warn!(key, "idempotency key already completed, keeping first result");
        }
        record.result.clone().ok_or(StorageError::NoRows)
    }

    fn purge_expired(&self) -> Result<usize, StorageError> {
        let mut records = self.lock()?;
        let now = SystemTime::now();
        let before = records.len();
        records.retain(|_, record| !record.is_expired_at(now));
        Ok(before - records.len())
    }
}

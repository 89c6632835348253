//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use geo_refdata::{
    Country, DomainEvent, EntityKind, EntityStore, EventPayload, HashMapStore, OutboxPublisher,
    RowWrite, StorageError, StoredRow,
};

pub fn united_states() -> Country {
    Country::new("US", "United States")
        .with_iso3("USA")
        .with_continent("NA")
        .with_phone_prefix("+1")
}

/// Wraps a [`HashMapStore`] and fails the next N reads with a connection
/// error.
#[derive(Clone, Default)]
pub struct FlakyStore {
    inner: HashMapStore,
    failing_reads: Arc<AtomicU32>,
    reads: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn new(inner: HashMapStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn fail_next_reads(&self, count: u32) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &HashMapStore {
        &self.inner
    }

    fn maybe_fail(&self) -> Result<(), StorageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            Err(StorageError::Connection("connection reset by peer".into()))
        } else {
            Ok(())
        }
    }
}

impl EntityStore for FlakyStore {
    fn find(
        &self,
        kind: EntityKind,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<StoredRow>, StorageError> {
        self.maybe_fail()?;
        self.inner.find(kind, tenant_id, id)
    }

    fn find_by_code(
        &self,
        kind: EntityKind,
        tenant_id: &str,
        code: &str,
    ) -> Result<Option<StoredRow>, StorageError> {
        self.maybe_fail()?;
        self.inner.find_by_code(kind, tenant_id, code)
    }

    fn list(&self, kind: EntityKind, tenant_id: &str) -> Result<Vec<StoredRow>, StorageError> {
        self.maybe_fail()?;
        self.inner.list(kind, tenant_id)
    }

    fn write(&self, write: RowWrite, events: Vec<DomainEvent>) -> Result<u64, StorageError> {
        self.inner.write(write, events)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub event_type: String,
    pub payload: EventPayload,
    pub metadata: HashMap<String, String>,
}

/// Records every delivery; can be told to fail the next N publishes.
#[derive(Clone, Default)]
pub struct RecordingPublisher {
    published: Arc<Mutex<Vec<Published>>>,
    failures_left: Arc<AtomicU32>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(times: u32) -> Self {
        let publisher = Self::default();
        publisher.failures_left.store(times, Ordering::SeqCst);
        publisher
    }

    pub fn published(&self) -> Vec<Published> {
        self.published.lock().unwrap().clone()
    }

    pub fn event_types(&self) -> Vec<String> {
        self.published()
            .into_iter()
            .map(|p| p.event_type)
            .collect()
    }
}

impl OutboxPublisher for RecordingPublisher {
    type Error = String;

    fn publish(
        &mut self,
        event_type: &str,
        payload: &[u8],
        metadata: &HashMap<String, String>,
    ) -> Result<(), Self::Error> {
        let fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err("broker unavailable".to_string());
        }

        let payload = DomainEvent::decode_payload(payload).map_err(|e| e.to_string())?;
        self.published.lock().unwrap().push(Published {
            event_type: event_type.to_string(),
            payload,
            metadata: metadata.clone(),
        });
        Ok(())
    }
}

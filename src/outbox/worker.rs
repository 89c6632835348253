use tracing::{debug, error, warn};

use super::entry::{OutboxEntry, OutboxStatus};
use super::publisher::OutboxPublisher;
use super::store::{OutboxStore, PendingDrain};
use crate::config::OutboxConfig;
use crate::error::StorageError;

/// Result of one drain cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainResult {
    pub published: usize,
    /// Publish failed, entry stays pending for the next cycle.
    pub retried: usize,
    /// Publish failed and the entry ran out of retries.
    pub failed: usize,
}

impl DrainResult {
    /// Total entries handled in the cycle.
    pub fn processed(&self) -> usize {
        self.published + self.retried + self.failed
    }
}

/// What happened to a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Published,
    Retried,
    Failed,
    /// Entry was no longer pending (or vanished) by the time we got to it.
    Skipped,
}

/// Publishes pending outbox entries and records the outcome in the store.
///
/// Delivery is at-least-once: an entry is marked published only after the
/// publisher returns `Ok`, so a crash in between republishes it next cycle.
pub struct OutboxWorker<P> {
    publisher: P,
    batch_size: usize,
    max_retries: u32,
}

impl<P> OutboxWorker<P> {
    /// Create a new worker with the given publisher.
    pub fn new(publisher: P) -> Self {
        let defaults = OutboxConfig::default();
        Self {
            publisher,
            batch_size: defaults.batch_size,
            max_retries: defaults.max_retries,
        }
    }

    /// Create a worker with the batch size and retry limit of `config`.
    pub fn from_config(publisher: P, config: &OutboxConfig) -> Self {
        Self {
            publisher,
            batch_size: config.batch_size,
            max_retries: config.max_retries,
        }
    }

    /// Entries fetched per store query.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Failed publishes tolerated before an entry is marked failed.
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Get the batch size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Get the retry limit.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Get a reference to the publisher.
    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Get a mutable reference to the publisher.
    pub fn publisher_mut(&mut self) -> &mut P {
        &mut self.publisher
    }

    /// Consume the worker, returning the publisher.
    pub fn into_publisher(self) -> P {
        self.publisher
    }
}

impl<P: OutboxPublisher> OutboxWorker<P> {
    /// Publish one entry and persist the outcome.
    pub fn process_entry<S>(
        &mut self,
        store: &S,
        entry: &OutboxEntry,
    ) -> Result<ProcessOutcome, StorageError>
    where
        S: OutboxStore + ?Sized,
    {
        if !entry.is_pending() {
            return Ok(ProcessOutcome::Skipped);
        }

        let published = match entry.event.encode_payload() {
            Ok(payload) => self
                .publisher
                .publish(entry.event_type(), &payload, &entry.event.metadata())
                .map_err(|err| err.to_string()),
            Err(err) => Err(format!("payload encoding failed: {}", err)),
        };

        match published {
            Ok(()) => {
                store.mark_published(&entry.id)?;
                debug!(
                    entry_id = %entry.id,
                    event_type = entry.event_type(),
                    aggregate_id = entry.aggregate_id(),
                    "outbox entry published"
                );
                Ok(ProcessOutcome::Published)
            }
            Err(reason) => {
                let status = store.record_failure(&entry.id, &reason, self.max_retries)?;
                Ok(match status {
                    Some(OutboxStatus::Failed) => {
                        error!(
                            entry_id = %entry.id,
                            event_type = entry.event_type(),
                            error = %reason,
                            "outbox entry failed permanently"
                        );
                        ProcessOutcome::Failed
                    }
                    Some(OutboxStatus::Pending) => {
                        warn!(
                            entry_id = %entry.id,
                            event_type = entry.event_type(),
                            error = %reason,
                            "outbox publish failed, will retry"
                        );
                        ProcessOutcome::Retried
                    }
                    Some(OutboxStatus::Published) | None => ProcessOutcome::Skipped,
                })
            }
        }
    }

    /// Walk every entry that was pending when the cycle started, oldest
    /// first. Stops at the first store error; entries already handled keep
    /// their new status.
    pub fn drain_once<S>(&mut self, store: &S) -> Result<DrainResult, StorageError>
    where
        S: OutboxStore + ?Sized,
    {
        let mut result = DrainResult::default();
        for entry in PendingDrain::new(store, self.batch_size) {
            let entry = entry?;
            match self.process_entry(store, &entry)? {
                ProcessOutcome::Published => result.published += 1,
                ProcessOutcome::Retried => result.retried += 1,
                ProcessOutcome::Failed => result.failed += 1,
                ProcessOutcome::Skipped => {}
            }
        }
        if result.processed() > 0 {
            debug!(
                published = result.published,
                retried = result.retried,
                failed = result.failed,
                "outbox drain finished"
            );
        }
        Ok(result)
    }
}

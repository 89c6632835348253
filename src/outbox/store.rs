use std::collections::VecDeque;

use super::entry::{OutboxEntry, OutboxStatus};
use super::event::DomainEvent;
use crate::error::StorageError;

/// Durable queue of domain events.
///
/// Appends that accompany an entity mutation go through
/// [`EntityStore::write`](crate::store::EntityStore::write) so both land in
/// one atomic unit; [`append`](Self::append) is for events with no paired
/// mutation.
pub trait OutboxStore: Send + Sync {
    /// Append a pending entry with `retry_count = 0`.
    fn append(&self, event: DomainEvent) -> Result<OutboxEntry, StorageError>;

    fn get(&self, id: &str) -> Result<Option<OutboxEntry>, StorageError>;

    /// Pending entries with `after < sequence <= up_to`, oldest first.
    fn pending_after(
        &self,
        after: Option<u64>,
        up_to: u64,
        limit: usize,
    ) -> Result<Vec<OutboxEntry>, StorageError>;

    /// Highest sequence assigned so far (0 when empty).
    fn high_water_mark(&self) -> Result<u64, StorageError>;

    /// Pending → published. Unknown or already-published ids are a no-op.
    fn mark_published(&self, id: &str) -> Result<(), StorageError>;

    /// Record a failed publish. Returns the entry's resulting status, or
    /// `None` when the id is unknown.
    fn record_failure(
        &self,
        id: &str,
        error: &str,
        max_retries: u32,
    ) -> Result<Option<OutboxStatus>, StorageError>;

    fn by_status(&self, status: OutboxStatus) -> Result<Vec<OutboxEntry>, StorageError>;

    /// Entries that exhausted their retries.
    fn failed(&self) -> Result<Vec<OutboxEntry>, StorageError> {
        self.by_status(OutboxStatus::Failed)
    }

    /// Start a fresh drain cycle over the pending entries.
    fn drain_pending(&self, batch_size: usize) -> PendingDrain<'_, Self>
    where
        Self: Sized,
    {
        PendingDrain::new(self, batch_size)
    }
}

/// Lazy, finite walk over pending entries, oldest first.
///
/// The drain pins the high-water mark on its first query, so entries
/// appended while it runs wait for the next cycle. Each batch is re-queried
/// from the store; dropping the drain and starting another resumes from the
/// oldest entry that is still pending.
pub struct PendingDrain<'a, S: ?Sized> {
    store: &'a S,
    batch_size: usize,
    cursor: Option<u64>,
    ceiling: Option<u64>,
    buffer: VecDeque<OutboxEntry>,
    done: bool,
}

impl<'a, S: OutboxStore + ?Sized> PendingDrain<'a, S> {
    /// Start a drain over `store`, fetching `batch_size` entries at a time.
    pub fn new(store: &'a S, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            cursor: None,
            ceiling: None,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    fn fetch(&mut self) -> Result<(), StorageError> {
        let ceiling = match self.ceiling {
            Some(ceiling) => ceiling,
            None => {
                let ceiling = self.store.high_water_mark()?;
                self.ceiling = Some(ceiling);
                ceiling
            }
        };

        let batch = self
            .store
            .pending_after(self.cursor, ceiling, self.batch_size)?;
        if batch.len() < self.batch_size {
            self.done = true;
        }
        if let Some(last) = batch.last() {
            self.cursor = Some(last.sequence);
        }
        self.buffer.extend(batch);
        Ok(())
    }
}

impl<S: OutboxStore + ?Sized> Iterator for PendingDrain<'_, S> {
    type Item = Result<OutboxEntry, StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(entry) = self.buffer.pop_front() {
            return Some(Ok(entry));
        }
        if self.done {
            return None;
        }
        if let Err(err) = self.fetch() {
            self.done = true;
            return Some(Err(err));
        }
        self.buffer.pop_front().map(Ok)
    }
}

//! Transactional outbox.
//!
//! Two phases, kept apart:
//! 1. **Commit** - every entity mutation appends a [`DomainEvent`] in the
//!    same atomic write as the row (see
//!    [`EntityStore::write`](crate::store::EntityStore::write)).
//! 2. **Drain** - an [`OutboxWorker`] walks pending entries oldest first,
//!    hands them to an [`OutboxPublisher`] and records the outcome.
//!
//! Entries move `pending → published` or `pending → failed` once the retry
//! budget is spent. Failed entries are never retried automatically.

mod entry;
mod event;
mod publisher;
mod store;
mod thread;
mod worker;

pub use entry::{OutboxEntry, OutboxStatus};
pub use event::{DedupKey, DomainEvent, EventAction, EventPayload};
#[cfg(feature = "emitter")]
pub use publisher::LocalEmitterPublisher;
pub use publisher::{LogPublisher, LogPublisherError, OutboxPublisher};
pub use store::{OutboxStore, PendingDrain};
pub use thread::{OutboxWorkerThread, WorkerStats};
pub use worker::{DrainResult, OutboxWorker, ProcessOutcome};

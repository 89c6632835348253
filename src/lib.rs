//! Reliability layer for geopolitical reference data (countries, regions,
//! languages).
//!
//! - [`IdempotencyCoordinator`] runs each command at most once per key.
//! - [`TenantRepository`] gives tenant-scoped, version-checked CRUD with
//!   soft deletes over any [`EntityStore`].
//! - Every mutation appends a [`DomainEvent`] to the outbox in the same
//!   atomic write; an [`OutboxWorker`] drains and publishes them.
//! - [`RetryExecutor`] wraps operations that fail `TRANSIENT`.
//! - [`ReferenceService`] composes the pieces.

mod config;
mod entity_kind;

pub mod domain;
pub mod error;
pub mod hashmap;
pub mod idempotency;
pub mod outbox;
pub mod retry;
pub mod service;
pub mod store;

pub use config::{IdempotencyConfig, OutboxConfig, ReliabilityConfig};
pub use entity_kind::EntityKind;

pub use domain::{Country, Language, Region, TextDirection};
pub use error::{
    classify, ClassifiedError, ErrorClassifier, ErrorCode, ErrorResponse, Severity, StorageError,
};
pub use hashmap::{HashMapIdempotencyStore, HashMapStore};
pub use idempotency::{
    BeginOutcome, Command, CommandResult, IdempotencyCoordinator, IdempotencyError,
    IdempotencyRecord, IdempotencyStore, RecordState,
};
#[cfg(feature = "emitter")]
pub use outbox::LocalEmitterPublisher;
pub use outbox::{
    DedupKey, DomainEvent, DrainResult, EventAction, EventPayload, LogPublisher,
    LogPublisherError, OutboxEntry, OutboxPublisher, OutboxStatus, OutboxStore, OutboxWorker,
    OutboxWorkerThread, PendingDrain, ProcessOutcome, WorkerStats,
};
pub use retry::{
    execute_with_retry, CancellationToken, Cancelled, RetryError, RetryExecutor, RetryPolicy,
};
pub use service::{Receipt, ReferenceService};
pub use store::{
    EntityStore, FieldSpec, ReferenceEntity, RowReference, RowWrite, StoredRow, TenantExt,
    TenantRepository, Validate, VersionedEntity,
};

#[cfg(feature = "emitter")]
pub use event_emitter_rs::EventEmitter;

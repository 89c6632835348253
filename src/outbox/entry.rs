use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::DomainEvent;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboxStatus {
    #[default]
    Pending,
    Published,
    /// Terminal. Needs operator attention; never retried by the worker.
    Failed,
}

/// Durable record of a domain event awaiting delivery.
///
/// Persisted flat: the event's envelope fields (`eventType`, `aggregateId`,
/// `tenantId`, `payload`, ...) sit next to the delivery state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEntry {
    pub id: String,
    /// Monotonic append order; drains walk entries by this value. Assigned
    /// by the owning store and not part of the persisted shape.
    #[serde(skip)]
    pub sequence: u64,
    #[serde(flatten)]
    pub event: DomainEvent,
    pub status: OutboxStatus,
    pub retry_count: u32,
    pub created_at: SystemTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<SystemTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl OutboxEntry {
    /// Create a pending entry for `event`.
    pub fn new(sequence: u64, event: DomainEvent) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sequence,
            event,
            status: OutboxStatus::Pending,
            retry_count: 0,
            created_at: SystemTime::now(),
            published_at: None,
            error_message: None,
        }
    }

    /// Get the event type, e.g. `CountryCreated`.
    pub fn event_type(&self) -> &str {
        &self.event.event_type
    }

    pub fn aggregate_id(&self) -> &str {
        &self.event.aggregate_id
    }

    pub fn tenant_id(&self) -> &str {
        &self.event.tenant_id
    }

    pub fn is_pending(&self) -> bool {
        self.status == OutboxStatus::Pending
    }

    pub fn is_published(&self) -> bool {
        self.status == OutboxStatus::Published
    }

    /// Whether the entry has given up for good.
    pub fn is_failed(&self) -> bool {
        self.status == OutboxStatus::Failed
    }

    /// Pending → Published. Returns false (and changes nothing) otherwise.
    pub fn mark_published(&mut self) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.status = OutboxStatus::Published;
        self.published_at = Some(SystemTime::now());
        true
    }

    /// Count a failed publish attempt; the entry fails for good once
    /// `retry_count` reaches `max_retries`. Non-pending entries are untouched.
    pub fn record_failure(&mut self, error: &str, max_retries: u32) -> OutboxStatus {
        if !self.is_pending() {
            return self.status;
        }
        self.retry_count = self.retry_count.saturating_add(1);
        self.error_message = Some(error.to_string());
        if self.retry_count >= max_retries {
            self.status = OutboxStatus::Failed;
        }
        self.status
    }
}

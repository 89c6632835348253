use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use super::command::CommandResult;
use crate::error::StorageError;

// Keeps expiry arithmetic inside SystemTime's range.
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

fn expiry(now: SystemTime, ttl: Duration) -> SystemTime {
    now.checked_add(ttl.min(MAX_TTL)).unwrap_or(now)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    Processing,
    Completed,
}

/// Per-key execution record. An absent key has no record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdempotencyRecord {
    pub key: String,
    pub state: RecordState,
    pub result: Option<CommandResult>,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
}

impl IdempotencyRecord {
    /// A freshly claimed key. Without a `lease` the record never expires
    /// while processing.
    pub fn processing(key: impl Into<String>, lease: Option<Duration>, now: SystemTime) -> Self {
        Self {
            key: key.into(),
            state: RecordState::Processing,
            result: None,
            created_at: now,
            expires_at: expiry(now, lease.unwrap_or(MAX_TTL)),
        }
    }

    /// Whether the record counts as absent at `now`.
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        now >= self.expires_at
    }

    pub fn is_completed(&self) -> bool {
        self.state == RecordState::Completed
    }

    /// processing → completed, retained for `ttl` from `now`. A completed
    /// record keeps its first result and returns false.
    pub fn complete(&mut self, result: CommandResult, ttl: Duration, now: SystemTime) -> bool {
        if self.is_completed() {
            return false;
        }
        self.state = RecordState::Completed;
        self.result = Some(result);
        self.expires_at = expiry(now, ttl);
        true
    }

    /// How a concurrent `try_begin` should see this record.
    pub fn outcome(&self) -> BeginOutcome {
        match (&self.state, &self.result) {
            (RecordState::Completed, Some(result)) => BeginOutcome::Completed(result.clone()),
            _ => BeginOutcome::InProgress,
        }
    }
}

/// Result of the absent → processing compare-and-set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BeginOutcome {
    /// The caller now owns the key and must execute and complete it.
    Acquired,
    /// Someone else holds the key.
    InProgress,
    /// The key already ran; here is its stored result.
    Completed(CommandResult),
}

/// Durable map from idempotency key to [`IdempotencyRecord`].
///
/// [`try_begin`](Self::try_begin) is the only cross-call synchronization
/// point of the reliability layer and must be atomic: for a given key,
/// exactly one concurrent caller observes [`BeginOutcome::Acquired`].
/// Expired records are treated as absent. A processing record only expires
/// through an explicit lease, never through the result TTL.
pub trait IdempotencyStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<IdempotencyRecord>, StorageError>;

    /// absent → processing. `lease` bounds how long the claim holds; `None`
    /// holds it until [`complete`](Self::complete).
    fn try_begin(&self, key: &str, lease: Option<Duration>) -> Result<BeginOutcome, StorageError>;

    /// Mark the key completed with `result`, retained for `ttl`, and return
    /// the stored result. If another caller completed the key first, its
    /// result is kept and returned instead. Unknown keys are
    /// `StorageError::NoRows`.
    fn complete(
        &self,
        key: &str,
        result: CommandResult,
        ttl: Duration,
    ) -> Result<CommandResult, StorageError>;

    /// Drop expired records; returns how many were removed.
    fn purge_expired(&self) -> Result<usize, StorageError>;
}

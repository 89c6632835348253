use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::command::{Command, CommandResult};
use super::record::{BeginOutcome, IdempotencyStore};
use crate::config::IdempotencyConfig;
use crate::error::{ClassifiedError, ErrorCode, StorageError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdempotencyError {
    #[error("idempotency key must not be empty")]
    EmptyKey,

    #[error("request {key} is already being processed")]
    ProcessingInProgress { key: String },

    #[error("idempotency store failed: {0}")]
    Store(#[from] StorageError),
}

impl IdempotencyError {
    /// Map to the caller-facing error taxonomy.
    pub fn to_classified(&self) -> ClassifiedError {
        match self {
            IdempotencyError::EmptyKey => {
                ClassifiedError::validation("idempotency_key", "idempotency key is required")
            }
            IdempotencyError::ProcessingInProgress { key } => {
                ClassifiedError::processing_in_progress(key)
            }
            IdempotencyError::Store(err) if err.is_transient() => {
                ClassifiedError::new(ErrorCode::Transient, "idempotency store unavailable")
            }
            IdempotencyError::Store(_) => {
                ClassifiedError::new(ErrorCode::Unknown, "idempotency store failed")
            }
        }
    }
}

impl From<IdempotencyError> for ClassifiedError {
    fn from(err: IdempotencyError) -> Self {
        err.to_classified()
    }
}

/// Runs each command at most once per idempotency key.
///
/// | Record state | Behaviour                                              |
/// |--------------|--------------------------------------------------------|
/// | completed    | stored result returned, operation not invoked          |
/// | processing   | `ProcessingInProgress`, no waiting                     |
/// | absent       | CAS to processing, run operation, store outcome        |
///
/// A failing operation is stored too, so the failure replays verbatim. The
/// result TTL only starts once the operation completes; a slow operation
/// keeps its key in processing however long it runs, unless
/// [`IdempotencyConfig::processing_lease`] says otherwise.
pub struct IdempotencyCoordinator<I> {
    store: I,
    config: IdempotencyConfig,
}

impl<I: IdempotencyStore> IdempotencyCoordinator<I> {
    /// Create a coordinator with default configuration.
    pub fn new(store: I) -> Self {
        Self::with_config(store, IdempotencyConfig::default())
    }

    /// Create a coordinator with the given TTL and processing lease.
    pub fn with_config(store: I, config: IdempotencyConfig) -> Self {
        Self { store, config }
    }

    /// Get a reference to the record store.
    pub fn store(&self) -> &I {
        &self.store
    }

    pub fn config(&self) -> &IdempotencyConfig {
        &self.config
    }

    /// Run `op` unless `key` already ran or is running.
    pub fn execute<F>(&self, key: &str, op: F) -> Result<CommandResult, IdempotencyError>
    where
        F: FnOnce() -> Result<CommandResult, ClassifiedError>,
    {
        if key.trim().is_empty() {
            return Err(IdempotencyError::EmptyKey);
        }

        match self.store.try_begin(key, self.config.processing_lease)? {
            BeginOutcome::Completed(result) => {
                debug!(key, success = result.success, "replaying stored result");
                return Ok(result);
            }
            BeginOutcome::InProgress => {
                debug!(key, "command already in progress");
                return Err(IdempotencyError::ProcessingInProgress {
                    key: key.to_string(),
                });
            }
            BeginOutcome::Acquired => {}
        }

        let result = match op() {
            Ok(result) => result,
            Err(err) => {
                info!(key, code = %err.code, "command failed, storing failure");
                CommandResult::failure(key, err)
            }
        };

        // The operation already ran. If this fails the key stays processing
        // until a configured lease runs out, or for good without one.
        match self.store.complete(key, result.clone(), self.config.ttl) {
            Ok(stored) => {
                if stored != result {
                    warn!(key, "another caller completed this key first");
                }
                Ok(stored)
            }
            Err(err) => {
                error!(key, error = %err, "could not persist command result");
                Err(IdempotencyError::Store(err))
            }
        }
    }

    /// [`execute`](Self::execute) keyed by `command.id`.
    pub fn execute_command<F>(
        &self,
        command: &Command,
        op: F,
    ) -> Result<CommandResult, IdempotencyError>
    where
        F: FnOnce() -> Result<CommandResult, ClassifiedError>,
    {
        debug!(
            command_id = %command.id,
            correlation_id = %command.correlation_id,
            requested_by = %command.requested_by,
            "executing command"
        );
        self.execute(&command.id, op)
    }

    /// Drop expired records from the store.
    pub fn purge_expired(&self) -> Result<usize, IdempotencyError> {
        let purged = self.store.purge_expired()?;
        if purged > 0 {
            info!(purged, "purged expired idempotency records");
        }
        Ok(purged)
    }
}

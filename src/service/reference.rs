use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ReliabilityConfig;
use crate::error::{ClassifiedError, ErrorCode};
use crate::idempotency::{CommandResult, IdempotencyCoordinator, IdempotencyError, IdempotencyStore};
use crate::outbox::EventAction;
use crate::retry::{CancellationToken, RetryError, RetryExecutor};
use crate::store::{EntityStore, ReferenceEntity, TenantRepository, VersionedEntity};

/// Payload of a successful mutation, stored as JSON in the [`CommandResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: String,
    pub code: String,
    pub version: u64,
    pub event_type: String,
}

impl Receipt {
    fn of<T: ReferenceEntity>(entity: &VersionedEntity<T>, action: EventAction) -> Self {
        Self {
            id: entity.id.clone(),
            code: entity.data.code().to_string(),
            version: entity.version,
            event_type: format!("{}{}", T::KIND.name(), action.as_str()),
        }
    }
}

/// Idempotent create/update/delete over a tenant-scoped entity store.
///
/// Every mutation runs through the [`IdempotencyCoordinator`]: domain errors
/// (validation, conflicts, missing references) become stored failure results
/// and replay verbatim. Reads go through the [`RetryExecutor`], retrying
/// only `TRANSIENT` failures.
///
/// Mutations are not retried here. A `TRANSIENT` failure is stored under its
/// key like any other outcome and replays, `retryable: true` and all, until
/// the record's TTL runs out. Retry a transient mutation with a fresh key.
pub struct ReferenceService<S, I> {
    store: S,
    coordinator: IdempotencyCoordinator<I>,
    retry: RetryExecutor,
}

impl<S, I> ReferenceService<S, I>
where
    S: EntityStore,
    I: IdempotencyStore,
{
    /// Create a service with default configuration.
    pub fn new(store: S, idempotency: I) -> Self {
        Self::with_config(store, idempotency, &ReliabilityConfig::default())
    }

    /// Create a service using the retry and idempotency settings of `config`.
    pub fn with_config(store: S, idempotency: I, config: &ReliabilityConfig) -> Self {
        Self {
            store,
            coordinator: IdempotencyCoordinator::with_config(
                idempotency,
                config.idempotency.clone(),
            ),
            retry: RetryExecutor::new(config.retry.clone()),
        }
    }

    /// Get a reference to the entity store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get a reference to the idempotency coordinator.
    pub fn coordinator(&self) -> &IdempotencyCoordinator<I> {
        &self.coordinator
    }

    /// Tenant-scoped repository for `T`, bypassing idempotency and retries.
    pub fn repository<T: ReferenceEntity>(&self, tenant_id: &str) -> TenantRepository<'_, S, T> {
        TenantRepository::new(&self.store, tenant_id)
    }

    /// Create `data` in the tenant at most once per `key`.
    pub fn create<T: ReferenceEntity>(
        &self,
        tenant_id: &str,
        key: &str,
        data: T,
    ) -> Result<CommandResult, IdempotencyError> {
        self.coordinator.execute(key, || {
            let entity = self.repository::<T>(tenant_id).create(data)?;
            CommandResult::encode(key, &Receipt::of(&entity, EventAction::Created))
        })
    }

    /// Replace the data of entity `id`, which must still be at
    /// `expected_version`.
    pub fn update<T: ReferenceEntity>(
        &self,
        tenant_id: &str,
        key: &str,
        id: &str,
        expected_version: u64,
        data: T,
    ) -> Result<CommandResult, IdempotencyError> {
        self.coordinator.execute(key, || {
            let repo = self.repository::<T>(tenant_id);
            let current = repo.get(id)?;
            let entity = repo.update(&current.with_data(data), expected_version)?;
            CommandResult::encode(key, &Receipt::of(&entity, EventAction::Updated))
        })
    }

    /// Soft-delete entity `id`, which must still be at `expected_version`.
    pub fn delete<T: ReferenceEntity>(
        &self,
        tenant_id: &str,
        key: &str,
        id: &str,
        expected_version: u64,
    ) -> Result<CommandResult, IdempotencyError> {
        self.coordinator.execute(key, || {
            let repo = self.repository::<T>(tenant_id);
            let current = repo.get(id)?;
            let entity = repo.delete(&current, expected_version)?;
            CommandResult::encode(key, &Receipt::of(&entity, EventAction::Deleted))
        })
    }

    /// Fetch a live entity, retrying transient failures.
    pub fn get<T: ReferenceEntity>(
        &self,
        tenant_id: &str,
        id: &str,
        token: &CancellationToken,
    ) -> Result<VersionedEntity<T>, ClassifiedError> {
        let repo = self.repository::<T>(tenant_id);
        self.read_with_retry(token, || repo.get(id))
    }

    /// List live entities of the tenant, retrying transient failures.
    pub fn list<T: ReferenceEntity>(
        &self,
        tenant_id: &str,
        token: &CancellationToken,
    ) -> Result<Vec<VersionedEntity<T>>, ClassifiedError> {
        let repo = self.repository::<T>(tenant_id);
        self.read_with_retry(token, || repo.list())
    }

    fn read_with_retry<V, F>(
        &self,
        token: &CancellationToken,
        mut read: F,
    ) -> Result<V, ClassifiedError>
    where
        F: FnMut() -> Result<V, ClassifiedError>,
    {
        // Outer Err is retried; inner Err stops immediately.
        let outcome = self.retry.run(token, || match read() {
            Err(err) if err.is_retryable() => Err(err),
            other => Ok(other),
        });

        match outcome {
            Ok(result) => result,
            Err(RetryError::Exhausted { attempts, last }) => {
                debug!(attempts, code = %last.code, "read gave up after retries");
                Err(last)
            }
            Err(RetryError::Cancelled(reason)) => {
                Err(ClassifiedError::new(ErrorCode::Transient, reason.to_string()))
            }
        }
    }
}

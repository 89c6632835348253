use std::marker::PhantomData;
use std::time::SystemTime;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::backend::{EntityStore, RowWrite, StoredRow};
use super::entity::{ReferenceEntity, VersionedEntity};
use crate::error::{classify, ClassifiedError, StorageError};
use crate::outbox::{DomainEvent, EventAction};

/// Versioned CRUD for one entity kind, pinned to one tenant.
///
/// The tenant is fixed at construction; every read and write is scoped to
/// it. Mutations are optimistic: callers pass the version they last read
/// and lose with `VERSION_CONFLICT` if anyone got there first.
pub struct TenantRepository<'s, S: ?Sized, T> {
    store: &'s S,
    tenant_id: String,
    _marker: PhantomData<fn() -> T>,
}

impl<'s, S, T> TenantRepository<'s, S, T>
where
    S: EntityStore + ?Sized,
    T: ReferenceEntity,
{
    /// Create a repository for `tenant_id` over `store`.
    pub fn new(store: &'s S, tenant_id: impl Into<String>) -> Self {
        Self {
            store,
            tenant_id: tenant_id.into(),
            _marker: PhantomData,
        }
    }

    /// Get the tenant this repository is pinned to.
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Validate and insert `data` at version 1, with a `<Kind>Created` event.
    pub fn create(&self, data: T) -> Result<VersionedEntity<T>, ClassifiedError> {
        data.validate()?;

        let now = SystemTime::now();
        let entity = VersionedEntity {
            id: Uuid::new_v4().to_string(),
            tenant_id: self.tenant_id.clone(),
            version: 1,
            is_active: true,
            is_deleted: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            data,
        };

        let row = self.encode_row(&entity)?;
        let event = self.event(EventAction::Created, &entity);
        self.store
            .write(RowWrite::Insert(row), vec![event])
            .map_err(|err| self.classify(&err))?;

        info!(
            entity = %T::KIND,
            tenant_id = %self.tenant_id,
            id = %entity.id,
            code = entity.data.code(),
            "entity created"
        );
        Ok(entity)
    }

    /// Replace the entity's data if the stored version still equals
    /// `expected_version`. The returned entity is at `expected_version + 1`.
    pub fn update(
        &self,
        entity: &VersionedEntity<T>,
        expected_version: u64,
    ) -> Result<VersionedEntity<T>, ClassifiedError> {
        entity.data.validate()?;

        let mut updated = entity.clone();
        updated.tenant_id = self.tenant_id.clone();
        updated.version = expected_version.saturating_add(1);
        updated.is_deleted = false;
        updated.deleted_at = None;
        updated.updated_at = SystemTime::now();

        self.apply(EventAction::Updated, updated, expected_version)
    }

    /// Soft delete: the row is kept with `is_deleted` set and disappears
    /// from reads. Same version rules as [`update`](Self::update).
    pub fn delete(
        &self,
        entity: &VersionedEntity<T>,
        expected_version: u64,
    ) -> Result<VersionedEntity<T>, ClassifiedError> {
        let now = SystemTime::now();
        let mut deleted = entity.clone();
        deleted.tenant_id = self.tenant_id.clone();
        deleted.version = expected_version.saturating_add(1);
        deleted.is_deleted = true;
        deleted.deleted_at = Some(now);
        deleted.updated_at = now;

        self.apply(EventAction::Deleted, deleted, expected_version)
    }

    /// Look up a live entity by id.
    pub fn find(&self, id: &str) -> Result<Option<VersionedEntity<T>>, ClassifiedError> {
        self.store
            .find(T::KIND, &self.tenant_id, id)
            .map_err(|err| self.classify(&err))?
            .map(|row| self.decode_row(row))
            .transpose()
    }

    /// Like [`find`](Self::find), but a missing entity is `NOT_FOUND`.
    pub fn get(&self, id: &str) -> Result<VersionedEntity<T>, ClassifiedError> {
        self.find(id)?
            .ok_or_else(|| ClassifiedError::not_found(format!("{} {}", T::KIND, id)))
    }

    /// Look up a live entity by its natural code.
    pub fn get_by_code(&self, code: &str) -> Result<VersionedEntity<T>, ClassifiedError> {
        self.store
            .find_by_code(T::KIND, &self.tenant_id, code)
            .map_err(|err| self.classify(&err))?
            .map(|row| self.decode_row(row))
            .transpose()?
            .ok_or_else(|| ClassifiedError::not_found(format!("{} with code {}", T::KIND, code)))
    }

    /// All live entities of the tenant.
    pub fn list(&self) -> Result<Vec<VersionedEntity<T>>, ClassifiedError> {
        self.store
            .list(T::KIND, &self.tenant_id)
            .map_err(|err| self.classify(&err))?
            .into_iter()
            .map(|row| self.decode_row(row))
            .collect()
    }

    fn apply(
        &self,
        action: EventAction,
        next: VersionedEntity<T>,
        expected_version: u64,
    ) -> Result<VersionedEntity<T>, ClassifiedError> {
        let row = self.encode_row(&next)?;
        let event = self.event(action, &next);
        let affected = self
            .store
            .write(
                RowWrite::Update {
                    expected_version,
                    row,
                },
                vec![event],
            )
            .map_err(|err| self.classify(&err))?;

        if affected == 0 {
            warn!(
                entity = %T::KIND,
                tenant_id = %self.tenant_id,
                id = %next.id,
                expected_version,
                "optimistic concurrency check failed"
            );
            return Err(ClassifiedError::version_conflict(
                T::KIND,
                &next.id,
                expected_version,
            ));
        }

        debug!(
            entity = %T::KIND,
            id = %next.id,
            version = next.version,
            action = action.as_str(),
            "entity version advanced"
        );
        Ok(next)
    }

    fn event(&self, action: EventAction, entity: &VersionedEntity<T>) -> DomainEvent {
        DomainEvent::new(
            action,
            entity.id.clone(),
            entity.version,
            self.tenant_id.clone(),
            entity.data.clone().into_payload(),
        )
    }

    fn encode_row(&self, entity: &VersionedEntity<T>) -> Result<StoredRow, ClassifiedError> {
        let data = serde_json::to_vec(&entity.data)
            .map_err(|err| self.classify(&StorageError::from(err)))?;
        Ok(StoredRow {
            kind: T::KIND,
            id: entity.id.clone(),
            tenant_id: entity.tenant_id.clone(),
            code: entity.data.code().to_string(),
            version: entity.version,
            is_active: entity.is_active,
            is_deleted: entity.is_deleted,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
            deleted_at: entity.deleted_at,
            references: entity.data.references(),
            data,
        })
    }

    fn decode_row(&self, row: StoredRow) -> Result<VersionedEntity<T>, ClassifiedError> {
        let data: T = serde_json::from_slice(&row.data)
            .map_err(|err| self.classify(&StorageError::from(err)))?;
        Ok(VersionedEntity {
            id: row.id,
            tenant_id: row.tenant_id,
            version: row.version,
            is_active: row.is_active,
            is_deleted: row.is_deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
            data,
        })
    }

    fn classify(&self, err: &StorageError) -> ClassifiedError {
        classify(err, T::KIND)
    }
}

/// `store.tenant::<Country>("acme")`
pub trait TenantExt: EntityStore {
    fn tenant<T: ReferenceEntity>(
        &self,
        tenant_id: impl Into<String>,
    ) -> TenantRepository<'_, Self, T> {
        TenantRepository::new(self, tenant_id)
    }
}

impl<S: EntityStore + ?Sized> TenantExt for S {}

use std::sync::Arc;
use std::time::SystemTime;

use super::entity::RowReference;
use crate::entity_kind::EntityKind;
use crate::error::StorageError;
use crate::outbox::DomainEvent;

/// Row as the backend persists it. `data` is the entity serialized as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub kind: EntityKind,
    pub id: String,
    pub tenant_id: String,
    pub code: String,
    pub version: u64,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
    pub deleted_at: Option<SystemTime>,
    pub references: Vec<RowReference>,
    pub data: Vec<u8>,
}

/// A single-row mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum RowWrite {
    Insert(StoredRow),
    /// Replace the row matching `(kind, tenant_id, id)` only if it is not
    /// deleted and still at `expected_version`. The stored `created_at` is
    /// kept.
    Update {
        expected_version: u64,
        row: StoredRow,
    },
}

impl RowWrite {
    /// Get the row being written.
    pub fn row(&self) -> &StoredRow {
        match self {
            RowWrite::Insert(row) => row,
            RowWrite::Update { row, .. } => row,
        }
    }
}

/// Persistence for reference entities with an attached outbox.
///
/// Reads never return soft-deleted rows. Constraint failures are reported
/// as structured [`StorageError`] variants:
/// - duplicate id, or duplicate code among live rows of a kind in a tenant:
///   `UniqueViolation`
/// - a reference to a missing or deleted row in the same tenant:
///   `ForeignKeyViolation` (constraint `fk_<collection>_<column>`)
pub trait EntityStore: Send + Sync {
    fn find(
        &self,
        kind: EntityKind,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<StoredRow>, StorageError>;

    fn find_by_code(
        &self,
        kind: EntityKind,
        tenant_id: &str,
        code: &str,
    ) -> Result<Option<StoredRow>, StorageError>;

    /// Live rows of `kind` in the tenant, oldest first.
    fn list(&self, kind: EntityKind, tenant_id: &str) -> Result<Vec<StoredRow>, StorageError>;

    /// Apply `write` and append `events` to the outbox as one atomic unit:
    /// either both become visible or neither does.
    ///
    /// Returns the number of rows affected. A conditional update whose
    /// condition does not hold affects 0 rows, appends nothing and is not an
    /// error.
    fn write(&self, write: RowWrite, events: Vec<DomainEvent>) -> Result<u64, StorageError>;
}

impl<S: EntityStore + ?Sized> EntityStore for Arc<S> {
    fn find(
        &self,
        kind: EntityKind,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<StoredRow>, StorageError> {
        (**self).find(kind, tenant_id, id)
    }

    fn find_by_code(
        &self,
        kind: EntityKind,
        tenant_id: &str,
        code: &str,
    ) -> Result<Option<StoredRow>, StorageError> {
        (**self).find_by_code(kind, tenant_id, code)
    }

    fn list(&self, kind: EntityKind, tenant_id: &str) -> Result<Vec<StoredRow>, StorageError> {
        (**self).list(kind, tenant_id)
    }

    fn write(&self, write: RowWrite, events: Vec<DomainEvent>) -> Result<u64, StorageError> {
        (**self).write(write, events)
    }
}

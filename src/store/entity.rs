use std::time::SystemTime;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::validation::Validate;
use crate::entity_kind::EntityKind;
use crate::outbox::EventPayload;

/// A column on a row that must name a live row of another kind in the same
/// tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowReference {
    pub column: &'static str,
    pub kind: EntityKind,
    pub id: String,
}

impl RowReference {
    /// A reference from `column` to entity `id` of `kind`.
    pub fn new(column: &'static str, kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            column,
            kind,
            id: id.into(),
        }
    }
}

/// Entity data managed by a [`TenantRepository`](super::TenantRepository).
pub trait ReferenceEntity:
    Validate + Serialize + DeserializeOwned + Clone + Send + Sync + 'static
{
    const KIND: EntityKind;

    /// Business code, unique per tenant among live rows of this kind.
    fn code(&self) -> &str;

    /// Outgoing references, checked by the store on every write.
    fn references(&self) -> Vec<RowReference> {
        Vec::new()
    }

    fn into_payload(self) -> EventPayload;
}

/// Entity data plus the metadata the store maintains for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedEntity<T> {
    pub id: String,
    pub tenant_id: String,
    /// Starts at 1 and grows by exactly one per accepted update or delete.
    pub version: u64,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
    pub deleted_at: Option<SystemTime>,
    pub data: T,
}

impl<T> VersionedEntity<T> {
    /// Get the entity id.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Same metadata, new data. Used to prepare an update.
    pub fn with_data(&self, data: T) -> Self {
        Self {
            id: self.id.clone(),
            tenant_id: self.tenant_id.clone(),
            version: self.version,
            is_active: self.is_active,
            is_deleted: self.is_deleted,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
            data,
        }
    }
}

use std::collections::HashMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Country, Language, Region};
use crate::entity_kind::EntityKind;

/// What happened to the aggregate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventAction {
    Created,
    Updated,
    Deleted,
}

impl EventAction {
    /// Suffix used in event type names.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventAction::Created => "Created",
            EventAction::Updated => "Updated",
            EventAction::Deleted => "Deleted",
        }
    }
}

/// Snapshot of the aggregate after the mutation, tagged by entity kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    Country(Country),
    Region(Region),
    Language(Language),
}

impl EventPayload {
    pub fn kind(&self) -> EntityKind {
        match self {
            EventPayload::Country(_) => EntityKind::Country,
            EventPayload::Region(_) => EntityKind::Region,
            EventPayload::Language(_) => EntityKind::Language,
        }
    }
}

/// Key consumers use to drop redelivered events.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub aggregate_id: String,
    pub aggregate_version: u64,
    pub schema_version: u32,
}

/// Immutable announcement of an accepted entity mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    #[serde(rename = "eventId")]
    pub id: String,
    pub event_type: String,
    pub aggregate_id: String,
    /// Entity version produced by the mutation.
    pub aggregate_version: u64,
    pub tenant_id: String,
    pub payload: EventPayload,
    pub schema_version: u32,
    pub occurred_at: SystemTime,
}

impl DomainEvent {
    pub const SCHEMA_VERSION: u32 = 1;

    /// Create an event; its type is derived from the payload kind and `action`.
    pub fn new(
        action: EventAction,
        aggregate_id: impl Into<String>,
        aggregate_version: u64,
        tenant_id: impl Into<String>,
        payload: EventPayload,
    ) -> Self {
        let event_type = format!("{}{}", payload.kind().name(), action.as_str());
        Self {
            id: Uuid::new_v4().to_string(),
            event_type,
            aggregate_id: aggregate_id.into(),
            aggregate_version,
            tenant_id: tenant_id.into(),
            payload,
            schema_version: Self::SCHEMA_VERSION,
            occurred_at: SystemTime::now(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.payload.kind()
    }

    /// Encode the payload for the wire (bitcode binary).
    pub fn encode_payload(&self) -> Result<Vec<u8>, bitcode::Error> {
        bitcode::serialize(&self.payload)
    }

    /// Decode a payload produced by [`encode_payload`](Self::encode_payload).
    pub fn decode_payload(bytes: &[u8]) -> Result<EventPayload, bitcode::Error> {
        bitcode::deserialize(bytes)
    }

    /// Envelope fields handed to publishers next to the payload.
    pub fn metadata(&self) -> HashMap<String, String> {
        HashMap::from([
            ("event_id".to_string(), self.id.clone()),
            ("aggregate_id".to_string(), self.aggregate_id.clone()),
            (
                "aggregate_version".to_string(),
                self.aggregate_version.to_string(),
            ),
            ("tenant_id".to_string(), self.tenant_id.clone()),
            ("schema_version".to_string(), self.schema_version.to_string()),
        ])
    }

    /// Key consumers use to drop redelivered events.
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            aggregate_id: self.aggregate_id.clone(),
            aggregate_version: self.aggregate_version,
            schema_version: self.schema_version,
        }
    }
}

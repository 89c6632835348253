use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::entity_kind::EntityKind;
use crate::error::StorageError;
use crate::outbox::{DomainEvent, OutboxEntry, OutboxStatus, OutboxStore};
use crate::store::{EntityStore, RowWrite, StoredRow};

/// In-memory [`EntityStore`] + [`OutboxStore`].
///
/// Clones share storage. Writes take the row lock, then the outbox lock, and
/// check every constraint before touching either map, so a rejected write
/// leaves no trace.
#[derive(Clone, Default)]
pub struct HashMapStore {
    rows: Arc<RwLock<HashMap<String, StoredRow>>>,
    outbox: Arc<RwLock<Vec<OutboxEntry>>>,
    outbox_seq: Arc<AtomicU64>,
}

fn row_key(kind: EntityKind, tenant_id: &str, id: &str) -> String {
    format!("{}:{}:{}", kind.collection(), tenant_id, id)
}

impl HashMapStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every outbox entry regardless of status, in append order.
    pub fn peek_outbox(&self) -> Result<Vec<OutboxEntry>, StorageError> {
        Ok(self.read_outbox()?.clone())
    }

    /// Stored row including soft-deleted ones.
    pub fn raw_row(
        &self,
        kind: EntityKind,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<StoredRow>, StorageError> {
        Ok(self.read_rows()?.get(&row_key(kind, tenant_id, id)).cloned())
    }

    fn read_rows(&self) -> Result<RwLockReadGuard<'_, HashMap<String, StoredRow>>, StorageError> {
        self.rows.read().map_err(|_| StorageError::Poisoned("rows read"))
    }

    fn write_rows(
        &self,
    ) -> Result<RwLockWriteGuard<'_, HashMap<String, StoredRow>>, StorageError> {
        self.rows.write().map_err(|_| StorageError::Poisoned("rows write"))
    }

    fn read_outbox(&self) -> Result<RwLockReadGuard<'_, Vec<OutboxEntry>>, StorageError> {
        self.outbox
            .read()
            .map_err(|_| StorageError::Poisoned("outbox read"))
    }

    fn write_outbox(&self) -> Result<RwLockWriteGuard<'_, Vec<OutboxEntry>>, StorageError> {
        self.outbox
            .write()
            .map_err(|_| StorageError::Poisoned("outbox write"))
    }

    fn append_locked(&self, outbox: &mut Vec<OutboxEntry>, event: DomainEvent) -> OutboxEntry {
        let sequence = self.outbox_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let entry = OutboxEntry::new(sequence, event);
        outbox.push(entry.clone());
        entry
    }

    fn update_entry<F, R>(&self, id: &str, f: F) -> Result<Option<R>, StorageError>
    where
        F: FnOnce(&mut OutboxEntry) -> R,
    {
        let mut outbox = self.write_outbox()?;
        Ok(outbox.iter_mut().find(|e| e.id == id).map(f))
    }
}

fn check_unique_code(
    rows: &HashMap<String, StoredRow>,
    key: &str,
    row: &StoredRow,
) -> Result<(), StorageError> {
    let taken = rows.iter().any(|(other_key, other)| {
        other_key != key
            && other.kind == row.kind
            && other.tenant_id == row.tenant_id
            && !other.is_deleted
            && other.code == row.code
    });
    if taken {
        return Err(StorageError::UniqueViolation {
            constraint: format!("uq_{}_tenant_code", row.kind.collection()),
            column: Some(row.kind.code_field().to_string()),
        });
    }
    Ok(())
}

fn check_references(
    rows: &HashMap<String, StoredRow>,
    row: &StoredRow,
) -> Result<(), StorageError> {
    for reference in &row.references {
        let target = rows.get(&row_key(reference.kind, &row.tenant_id, &reference.id));
        if !matches!(target, Some(target) if !target.is_deleted) {
            return Err(StorageError::ForeignKeyViolation {
                constraint: format!("fk_{}_{}", row.kind.collection(), reference.column),
                column: Some(reference.column.to_string()),
            });
        }
    }
    Ok(())
}

impl EntityStore for HashMapStore {
    fn find(
        &self,
        kind: EntityKind,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<StoredRow>, StorageError> {
        let rows = self.read_rows()?;
        Ok(rows
            .get(&row_key(kind, tenant_id, id))
            .filter(|row| !row.is_deleted)
            .cloned())
    }

    fn find_by_code(
        &self,
        kind: EntityKind,
        tenant_id: &str,
        code: &str,
    ) -> Result<Option<StoredRow>, StorageError> {
        let rows = self.read_rows()?;
        Ok(rows
            .values()
            .find(|row| {
                row.kind == kind
                    && row.tenant_id == tenant_id
                    && !row.is_deleted
                    && row.code == code
            })
            .cloned())
    }

    fn list(&self, kind: EntityKind, tenant_id: &str) -> Result<Vec<StoredRow>, StorageError> {
        let rows = self.read_rows()?;
        let mut live: Vec<StoredRow> = rows
            .values()
            .filter(|row| row.kind == kind && row.tenant_id == tenant_id && !row.is_deleted)
            .cloned()
            .collect();
        live.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(live)
    }

    fn write(&self, write: RowWrite, events: Vec<DomainEvent>) -> Result<u64, StorageError> {
        let mut rows = self.write_rows()?;
        let mut outbox = self.write_outbox()?;

        match write {
            RowWrite::Insert(row) => {
                let key = row_key(row.kind, &row.tenant_id, &row.id);
                if rows.contains_key(&key) {
                    return Err(StorageError::UniqueViolation {
                        constraint: format!("{}_pkey", row.kind.collection()),
                        column: Some("id".to_string()),
                    });
                }
                check_unique_code(&rows, &key, &row)?;
                check_references(&rows, &row)?;
                rows.insert(key, row);
            }
            RowWrite::Update {
                expected_version,
                mut row,
            } => {
                let key = row_key(row.kind, &row.tenant_id, &row.id);
                let created_at = match rows.get(&key) {
                    Some(current) if !current.is_deleted && current.version == expected_version => {
                        current.created_at
                    }
                    _ => return Ok(0),
                };
                // A soft delete only flips flags, so it cannot break constraints.
                if !row.is_deleted {
                    check_unique_code(&rows, &key, &row)?;
                    check_references(&rows, &row)?;
                }
                row.created_at = created_at;
                rows.insert(key, row);
            }
        }

        for event in events {
            self.append_locked(&mut outbox, event);
        }
        Ok(1)
    }
}

impl OutboxStore for HashMapStore {
    fn append(&self, event: DomainEvent) -> Result<OutboxEntry, StorageError> {
        let mut outbox = self.write_outbox()?;
        Ok(self.append_locked(&mut outbox, event))
    }

    fn get(&self, id: &str) -> Result<Option<OutboxEntry>, StorageError> {
        let outbox = self.read_outbox()?;
        Ok(outbox.iter().find(|e| e.id == id).cloned())
    }

    fn pending_after(
        &self,
        after: Option<u64>,
        up_to: u64,
        limit: usize,
    ) -> Result<Vec<OutboxEntry>, StorageError> {
        let outbox = self.read_outbox()?;
        let after = after.unwrap_or(0);
        Ok(outbox
            .iter()
            .filter(|e| e.is_pending() && e.sequence > after && e.sequence <= up_to)
            .take(limit)
            .cloned()
            .collect())
    }

    fn high_water_mark(&self) -> Result<u64, StorageError> {
        let outbox = self.read_outbox()?;
        Ok(outbox.last().map(|e| e.sequence).unwrap_or(0))
    }

    fn mark_published(&self, id: &str) -> Result<(), StorageError> {
        self.update_entry(id, |entry| entry.mark_published())?;
        Ok(())
    }

    fn record_failure(
        &self,
        id: &str,
        error: &str,
        max_retries: u32,
    ) -> Result<Option<OutboxStatus>, StorageError> {
        self.update_entry(id, |entry| entry.record_failure(error, max_retries))
    }

    fn by_status(&self, status: OutboxStatus) -> Result<Vec<OutboxEntry>, StorageError> {
        let outbox = self.read_outbox()?;
        Ok(outbox
            .iter()
            .filter(|e| e.status == status)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Country, Region};
    use crate::outbox::EventAction;
    use crate::store::{ReferenceEntity, RowReference};
    use std::time::SystemTime;

    fn row(kind: EntityKind, id: &str, code: &str, refs: Vec<RowReference>) -> StoredRow {
        let now = SystemTime::now();
        StoredRow {
            kind,
            id: id.to_string(),
            tenant_id: "t1".to_string(),
            code: code.to_string(),
            version: 1,
            is_active: true,
            is_deleted: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            references: refs,
            data: b"{}".to_vec(),
        }
    }

    fn event(id: &str, version: u64) -> DomainEvent {
        DomainEvent::new(
            EventAction::Created,
            id,
            version,
            "t1",
            Country::new("US", "United States").into_payload(),
        )
    }

    #[test]
    fn insert_appends_outbox_in_same_write() {
        let store = HashMapStore::new();
        let affected = store
            .write(
                RowWrite::Insert(row(EntityKind::Country, "c1", "US", vec![])),
                vec![event("c1", 1)],
            )
            .unwrap();

        assert_eq!(affected, 1);
        assert!(store.find(EntityKind::Country, "t1", "c1").unwrap().is_some());
        let outbox = store.peek_outbox().unwrap();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].sequence, 1);
    }

    #[test]
    fn rejected_insert_leaves_no_trace() {
        let store = HashMapStore::new();
        let refs = vec![RowReference::new("region_id", EntityKind::Region, "missing")];
        let err = store
            .write(
                RowWrite::Insert(row(EntityKind::Country, "c1", "US", refs)),
                vec![event("c1", 1)],
            )
            .unwrap_err();

        assert_eq!(
            err,
            StorageError::ForeignKeyViolation {
                constraint: "fk_countries_region_id".to_string(),
                column: Some("region_id".to_string()),
            }
        );
        assert!(store.raw_row(EntityKind::Country, "t1", "c1").unwrap().is_none());
        assert!(store.peek_outbox().unwrap().is_empty());
    }

    #[test]
    fn code_unique_per_kind_and_tenant() {
        let store = HashMapStore::new();
        store
            .write(RowWrite::Insert(row(EntityKind::Country, "c1", "US", vec![])), vec![])
            .unwrap();
        store
            .write(RowWrite::Insert(row(EntityKind::Region, "r1", "US", vec![])), vec![])
            .unwrap();

        let err = store
            .write(RowWrite::Insert(row(EntityKind::Country, "c2", "US", vec![])), vec![])
            .unwrap_err();
        assert!(matches!(err, StorageError::UniqueViolation { .. }));

        let mut other_tenant = row(EntityKind::Country, "c3", "US", vec![]);
        other_tenant.tenant_id = "t2".to_string();
        store.write(RowWrite::Insert(other_tenant), vec![]).unwrap();
    }

    #[test]
    fn stale_update_affects_nothing() {
        let store = HashMapStore::new();
        store
            .write(RowWrite::Insert(row(EntityKind::Region, "r1", "EU", vec![])), vec![])
            .unwrap();

        let mut next = row(EntityKind::Region, "r1", "EU", vec![]);
        next.version = 3;
        let affected = store
            .write(
                RowWrite::Update {
                    expected_version: 2,
                    row: next,
                },
                vec![event("r1", 3)],
            )
            .unwrap();

        assert_eq!(affected, 0);
        assert!(store.peek_outbox().unwrap().is_empty());
        assert_eq!(
            store.find(EntityKind::Region, "t1", "r1").unwrap().unwrap().version,
            1
        );
    }

    #[test]
    fn deleted_rows_hidden_from_reads() {
        let store = HashMapStore::new();
        store
            .write(RowWrite::Insert(row(EntityKind::Region, "r1", "EU", vec![])), vec![])
            .unwrap();

        let mut deleted = row(EntityKind::Region, "r1", "EU", vec![]);
        deleted.version = 2;
        deleted.is_deleted = true;
        store
            .write(
                RowWrite::Update {
                    expected_version: 1,
                    row: deleted,
                },
                vec![],
            )
            .unwrap();

        assert!(store.find(EntityKind::Region, "t1", "r1").unwrap().is_none());
        assert!(store.find_by_code(EntityKind::Region, "t1", "EU").unwrap().is_none());
        assert!(store.list(EntityKind::Region, "t1").unwrap().is_empty());
        assert!(store.raw_row(EntityKind::Region, "t1", "r1").unwrap().unwrap().is_deleted);

        // The code is free again.
        store
            .write(RowWrite::Insert(row(EntityKind::Region, "r2", "EU", vec![])), vec![])
            .unwrap();
    }

    #[test]
    fn outbox_status_transitions() {
        let store = HashMapStore::new();
        let entry = store.append(event("c1", 1)).unwrap();

        store.mark_published("unknown").unwrap();
        store.mark_published(&entry.id).unwrap();
        let published = store.get(&entry.id).unwrap().unwrap();
        assert!(published.is_published());

        store.mark_published(&entry.id).unwrap();
        assert_eq!(store.get(&entry.id).unwrap().unwrap(), published);

        assert_eq!(store.record_failure("unknown", "x", 3).unwrap(), None);
    }

    #[test]
    fn pending_after_respects_cursor_and_ceiling() {
        let store = HashMapStore::new();
        for i in 0..5 {
            store.append(event(&format!("c{}", i), 1)).unwrap();
        }
        assert_eq!(store.high_water_mark().unwrap(), 5);

        let batch = store.pending_after(Some(1), 4, 2).unwrap();
        let seqs: Vec<u64> = batch.iter().map(|e| e.sequence).collect();
        assert_eq!(seqs, vec![2, 3]);

        let batch = store.pending_after(Some(3), 4, 10).unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn parent_region_must_exist() {
        let store = HashMapStore::new();
        let parent = Region::new("EU", "Europe");
        store
            .write(RowWrite::Insert(row(EntityKind::Region, "eu", parent.code(), vec![])), vec![])
            .unwrap();

        let refs = vec![RowReference::new("parent_region_id", EntityKind::Region, "eu")];
        store
            .write(RowWrite::Insert(row(EntityKind::Region, "eu-w", "EU-W", refs)), vec![])
            .unwrap();
    }
}

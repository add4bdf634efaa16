//! In-process `RecordRepository` adapter.
//!
//! Holds records in a mutex-guarded map and applies the same ownership
//! predicate and ordering as the warehouse adapter. Used by tests and by local
//! runs without a warehouse.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::ports::{RecordRepository, RecordRepositoryError};
use crate::domain::{Identity, Record, RecordFilter, RecordId};

/// Mutex-backed record repository.
#[derive(Debug, Default)]
pub struct InMemoryRecordRepository {
    rows: Mutex<BTreeMap<RecordId, Record>>,
}

impl InMemoryRecordRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows across all owners.
    pub fn len(&self) -> usize {
        self.lock().map(|rows| rows.len()).unwrap_or_default()
    }

    /// Whether no rows are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<RecordId, Record>>, RecordRepositoryError> {
        self.rows
            .lock()
            .map_err(|_| RecordRepositoryError::query("record map lock poisoned"))
    }
}

fn owned_by(record: &Record, owner: &Identity) -> bool {
    &record.owner_user == owner
}

#[async_trait]
impl RecordRepository for InMemoryRecordRepository {
    async fn list_owned(
        &self,
        owner: &Identity,
        filter: &RecordFilter,
    ) -> Result<Vec<Record>, RecordRepositoryError> {
        let rows = self.lock()?;
        let mut records: Vec<Record> = rows
            .values()
            .filter(|record| owned_by(record, owner) && filter.matches(record))
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(records)
    }

    async fn find_owned(
        &self,
        owner: &Identity,
        id: RecordId,
    ) -> Result<Option<Record>, RecordRepositoryError> {
        let rows = self.lock()?;
        Ok(rows
            .get(&id)
            .filter(|record| owned_by(record, owner))
            .cloned())
    }

    async fn insert(&self, record: &Record) -> Result<(), RecordRepositoryError> {
        let mut rows = self.lock()?;
        if rows.contains_key(&record.id) {
            return Err(RecordRepositoryError::query(format!(
                "duplicate record id {}",
                record.id
            )));
        }
        rows.insert(record.id, record.clone());
        Ok(())
    }

    async fn update_owned(&self, record: &Record) -> Result<bool, RecordRepositoryError> {
        let mut rows = self.lock()?;
        match rows.get_mut(&record.id) {
            Some(existing) if owned_by(existing, &record.owner_user) => {
                existing.name.clone_from(&record.name);
                existing.email.clone_from(&record.email);
                existing.department.clone_from(&record.department);
                existing.status.clone_from(&record.status);
                existing.notes.clone_from(&record.notes);
                existing.updated_at = record.updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_owned(
        &self,
        owner: &Identity,
        id: RecordId,
    ) -> Result<bool, RecordRepositoryError> {
        let mut rows = self.lock()?;
        let owned = rows.get(&id).is_some_and(|record| owned_by(record, owner));
        if owned {
            rows.remove(&id);
        }
        Ok(owned)
    }
}

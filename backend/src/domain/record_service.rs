//! Record domain service.
//!
//! Implements the [`RecordStore`] driving port over a [`RecordRepository`].
//! Validation, ownership stamping and timestamps live here; the repository only
//! translates to statements.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use mockable::Clock;
use serde_json::json;
use tracing::{debug, info};

use crate::domain::ports::{RecordRepository, RecordRepositoryError, RecordStore};
use crate::domain::{
    Error, Identity, NewRecordFields, Record, RecordContent, RecordFilter, RecordId, RecordPatch,
    RecordValidationError,
};

/// Warehouse timestamps keep microsecond precision.
const TIMESTAMP_DIGITS: u16 = 6;

/// Record service implementing the [`RecordStore`] port.
#[derive(Clone)]
pub struct RecordService<R> {
    repo: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<R> RecordService<R> {
    /// Create a new service over the given repository and clock.
    pub fn new(repo: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.utc().trunc_subsecs(TIMESTAMP_DIGITS)
    }

    /// Next `updated_at`, strictly after `previous` even if the clock stalls.
    fn next_timestamp(&self, previous: DateTime<Utc>) -> DateTime<Utc> {
        let now = self.now();
        if now > previous {
            now
        } else {
            previous + TimeDelta::microseconds(1)
        }
    }
}

fn map_repository_error(error: RecordRepositoryError) -> Error {
    match error {
        RecordRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("record store unavailable: {message}"))
        }
        RecordRepositoryError::Query { message } => {
            Error::internal(format!("record store error: {message}"))
        }
    }
}

pub(crate) fn map_validation_error(error: RecordValidationError) -> Error {
    Error::invalid_request(error.to_string()).with_details(json!({
        "field": error.field(),
        "code": error.code(),
    }))
}

fn record_not_found(id: RecordId) -> Error {
    Error::not_found(format!("record {id} not found"))
}

fn build_record(
    id: RecordId,
    owner: Identity,
    content: RecordContent,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> Record {
    let RecordContent {
        name,
        email,
        department,
        status,
        notes,
    } = content;
    Record {
        id,
        name,
        email,
        department,
        status,
        notes,
        owner_user: owner,
        created_at,
        updated_at,
    }
}

#[async_trait]
impl<R> RecordStore for RecordService<R>
where
    R: RecordRepository,
{
    async fn list(&self, identity: &Identity, filter: &RecordFilter) -> Result<Vec<Record>, Error> {
        let records = self
            .repo
            .list_owned(identity, filter)
            .await
            .map_err(map_repository_error)?;
        debug!(owner = %identity, count = records.len(), "listed records");
        Ok(records)
    }

    async fn get(&self, identity: &Identity, id: RecordId) -> Result<Record, Error> {
        self.repo
            .find_owned(identity, id)
            .await
            .map_err(map_repository_error)?
            .ok_or_else(|| record_not_found(id))
    }

    async fn create(&self, identity: &Identity, fields: NewRecordFields) -> Result<Record, Error> {
        let content = RecordContent::from(fields)
            .validate()
            .map_err(map_validation_error)?;
        let now = self.now();
        let record = build_record(RecordId::generate(), identity.clone(), content, now, now);

        self.repo
            .insert(&record)
            .await
            .map_err(map_repository_error)?;
        info!(owner = %identity, record_id = %record.id, "record created");
        Ok(record)
    }

    async fn update(
        &self,
        identity: &Identity,
        id: RecordId,
        patch: RecordPatch,
    ) -> Result<Record, Error> {
        let existing = self.get(identity, id).await?;
        let content = patch
            .apply(existing.content())
            .validate()
            .map_err(map_validation_error)?;
        let updated_at = self.next_timestamp(existing.updated_at);
        let record = build_record(
            existing.id,
            existing.owner_user,
            content,
            existing.created_at,
            updated_at,
        );

        let matched = self
            .repo
            .update_owned(&record)
            .await
            .map_err(map_repository_error)?;
        if !matched {
            return Err(record_not_found(id));
        }
        info!(owner = %identity, record_id = %id, "record updated");
        Ok(record)
    }

    async fn delete(&self, identity: &Identity, id: RecordId) -> Result<(), Error> {
        let matched = self
            .repo
            .delete_owned(identity, id)
            .await
            .map_err(map_repository_error)?;
        if !matched {
            return Err(record_not_found(id));
        }
        info!(owner = %identity, record_id = %id, "record deleted");
        Ok(())
    }
}

#[cfg(test)]
#[path = "record_service_tests.rs"]
mod tests;

//! Driving port for record use-cases.
//!
//! Inbound adapters depend on this trait only. The acting identity is an
//! explicit argument of every operation.

use async_trait::async_trait;

use crate::domain::{Error, Identity, NewRecordFields, Record, RecordFilter, RecordId, RecordPatch};

/// Use-case port for owner-scoped record management.
///
/// "Not found" and "owned by someone else" both surface as
/// [`crate::domain::ErrorCode::NotFound`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// List records owned by `identity` that match `filter`.
    async fn list(&self, identity: &Identity, filter: &RecordFilter) -> Result<Vec<Record>, Error>;

    /// Fetch one owned record.
    async fn get(&self, identity: &Identity, id: RecordId) -> Result<Record, Error>;

    /// Create a record owned by `identity`.
    async fn create(&self, identity: &Identity, fields: NewRecordFields) -> Result<Record, Error>;

    /// Apply a partial update to an owned record.
    async fn update(
        &self,
        identity: &Identity,
        id: RecordId,
        patch: RecordPatch,
    ) -> Result<Record, Error>;

    /// Delete an owned record.
    async fn delete(&self, identity: &Identity, id: RecordId) -> Result<(), Error>;
}

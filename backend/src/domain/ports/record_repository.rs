//! Port for owner-scoped record persistence.
//!
//! Every method takes the owning identity (directly or through the record) and
//! adapters must include it in the statement predicate. Adapters never decide
//! ownership on their own; a row owned by someone else simply does not match.

use async_trait::async_trait;

use crate::domain::{Identity, Record, RecordFilter, RecordId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by record repository adapters.
    pub enum RecordRepositoryError {
        /// The warehouse could not be reached or rejected the credentials.
        Connection { message: String } =>
            "record repository connection failed: {message}",
        /// A statement failed during execution or returned an unreadable result.
        Query { message: String } =>
            "record repository query failed: {message}",
    }
}

/// Port for record storage.
///
/// Mutating methods issue exactly one statement each. Reads reflect the
/// current warehouse state; adapters keep no cache.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// List records owned by `owner` that match `filter`, newest first.
    ///
    /// Ordering is `updated_at` descending with `id` descending as the
    /// tie-break, so repeated calls without writes return the same sequence.
    async fn list_owned(
        &self,
        owner: &Identity,
        filter: &RecordFilter,
    ) -> Result<Vec<Record>, RecordRepositoryError>;

    /// Fetch one record when it exists and is owned by `owner`.
    async fn find_owned(
        &self,
        owner: &Identity,
        id: RecordId,
    ) -> Result<Option<Record>, RecordRepositoryError>;

    /// Insert a fully populated record.
    async fn insert(&self, record: &Record) -> Result<(), RecordRepositoryError>;

    /// Overwrite the editable columns and `updated_at` of the row matching
    /// `record.id` and `record.owner_user`.
    ///
    /// Returns `false` when no row matched.
    async fn update_owned(&self, record: &Record) -> Result<bool, RecordRepositoryError>;

    /// Delete the row matching `id` and `owner`.
    ///
    /// Returns `false` when no row matched.
    async fn delete_owned(&self, owner: &Identity, id: RecordId)
    -> Result<bool, RecordRepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_error_names_the_failure() {
        let error = RecordRepositoryError::connection("status 401");
        assert_eq!(
            error.to_string(),
            "record repository connection failed: status 401"
        );
    }
}

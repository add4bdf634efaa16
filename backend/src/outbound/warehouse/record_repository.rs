//! Warehouse-backed `RecordRepository` adapter.
//!
//! Every statement carries the `owner_user = :owner` predicate, so row scoping
//! holds even if the domain layer were bypassed. The table name is
//! interpolated from a validated identifier; all values travel as named
//! parameters.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

use super::client::{Statement, StatementError, StatementExecutor, StatementResult};
use super::dto::StatementParameter;
use crate::domain::ports::{RecordRepository, RecordRepositoryError};
use crate::domain::{Identity, Record, RecordFilter, RecordId};

const COLUMNS: &str =
    "id, name, email, department, status, notes, owner_user, created_at, updated_at";
const COLUMN_COUNT: usize = 9;

/// Record repository issuing parameterised SQL through a [`StatementExecutor`].
pub struct WarehouseRecordRepository<E> {
    executor: Arc<E>,
    table: String,
}

impl<E> WarehouseRecordRepository<E> {
    /// Create a repository over the fully qualified `table`.
    pub fn new(executor: Arc<E>, table: impl Into<String>) -> Self {
        Self {
            executor,
            table: table.into(),
        }
    }

    fn list_statement(&self, owner: &Identity, filter: &RecordFilter) -> Statement {
        let mut sql = format!("SELECT {COLUMNS} FROM {} WHERE owner_user = :owner", self.table);
        let mut statement_params = vec![StatementParameter::string("owner", owner.as_str())];
        if let Some(name) = filter.name() {
            sql.push_str(" AND contains(lower(name), lower(:name))");
            statement_params.push(StatementParameter::string("name", name));
        }
        if let Some(email) = filter.email() {
            sql.push_str(" AND contains(lower(email), lower(:email))");
            statement_params.push(StatementParameter::string("email", email));
        }
        sql.push_str(" ORDER BY updated_at DESC, id DESC");

        statement_params
            .into_iter()
            .fold(Statement::new(sql), Statement::bind)
    }

    fn find_statement(&self, owner: &Identity, id: RecordId) -> Statement {
        Statement::new(format!(
            "SELECT {COLUMNS} FROM {} WHERE owner_user = :owner AND id = :id",
            self.table
        ))
        .bind(StatementParameter::string("owner", owner.as_str()))
        .bind(StatementParameter::bigint("id", id.get()))
    }

    fn insert_statement(&self, record: &Record) -> Statement {
        Statement::new(format!(
            "INSERT INTO {} ({COLUMNS}) VALUES \
             (:id, :name, :email, :department, :status, :notes, :owner, :created_at, :updated_at)",
            self.table
        ))
        .bind(StatementParameter::bigint("id", record.id.get()))
        .bind(StatementParameter::string("name", record.name.as_str()))
        .bind(StatementParameter::string("email", record.email.as_str()))
        .bind(StatementParameter::string("department", record.department.as_str()))
        .bind(StatementParameter::string("status", record.status.as_str()))
        .bind(StatementParameter::nullable_string("notes", record.notes.clone()))
        .bind(StatementParameter::string("owner", record.owner_user.as_str()))
        .bind(StatementParameter::timestamp("created_at", record.created_at))
        .bind(StatementParameter::timestamp("updated_at", record.updated_at))
    }

    fn update_statement(&self, record: &Record) -> Statement {
        Statement::new(format!(
            "UPDATE {} SET name = :name, email = :email, department = :department, \
             status = :status, notes = :notes, updated_at = :updated_at \
             WHERE id = :id AND owner_user = :owner",
            self.table
        ))
        .bind(StatementParameter::string("name", record.name.as_str()))
        .bind(StatementParameter::string("email", record.email.as_str()))
        .bind(StatementParameter::string("department", record.department.as_str()))
        .bind(StatementParameter::string("status", record.status.as_str()))
        .bind(StatementParameter::nullable_string("notes", record.notes.clone()))
        .bind(StatementParameter::timestamp("updated_at", record.updated_at))
        .bind(StatementParameter::bigint("id", record.id.get()))
        .bind(StatementParameter::string("owner", record.owner_user.as_str()))
    }

    fn delete_statement(&self, owner: &Identity, id: RecordId) -> Statement {
        Statement::new(format!(
            "DELETE FROM {} WHERE id = :id AND owner_user = :owner",
            self.table
        ))
        .bind(StatementParameter::bigint("id", id.get()))
        .bind(StatementParameter::string("owner", owner.as_str()))
    }
}

impl<E> WarehouseRecordRepository<E>
where
    E: StatementExecutor,
{
    async fn run(&self, statement: Statement) -> Result<StatementResult, RecordRepositoryError> {
        self.executor
            .execute(&statement)
            .await
            .map_err(map_statement_error)
    }

    async fn run_mutation(&self, statement: Statement) -> Result<bool, RecordRepositoryError> {
        let result = self.run(statement).await?;
        let affected = result.affected_rows().ok_or_else(|| {
            RecordRepositoryError::query("mutation response lacks num_affected_rows")
        })?;
        Ok(affected > 0)
    }
}

/// Map statement failures onto the repository port.
///
/// Anything that means "could not talk to the warehouse" becomes a connection
/// error; everything else is a query error.
pub(crate) fn map_statement_error(error: StatementError) -> RecordRepositoryError {
    match error {
        StatementError::Unavailable { .. }
        | StatementError::Transport { .. }
        | StatementError::Timeout { .. }
        | StatementError::Unauthorized { .. } => RecordRepositoryError::connection(error.to_string()),
        StatementError::Rejected { .. }
        | StatementError::Failed { .. }
        | StatementError::Decode { .. } => RecordRepositoryError::query(error.to_string()),
    }
}

fn decode_rows(result: StatementResult) -> Result<Vec<Record>, RecordRepositoryError> {
    result
        .into_rows()
        .into_iter()
        .map(|row| decode_row(row).map_err(RecordRepositoryError::query))
        .collect()
}

fn decode_row(row: Vec<Option<String>>) -> Result<Record, String> {
    let cells: [Option<String>; COLUMN_COUNT] = row
        .try_into()
        .map_err(|row: Vec<_>| format!("expected {COLUMN_COUNT} columns, got {}", row.len()))?;
    let [id, name, email, department, status, notes, owner_user, created_at, updated_at] = cells;

    let id = required("id", id)?;
    let id = id
        .parse::<i64>()
        .ok()
        .and_then(|raw| RecordId::new(raw).ok())
        .ok_or_else(|| format!("invalid id '{id}'"))?;
    let owner_user = Identity::new(required("owner_user", owner_user)?)
        .map_err(|error| format!("invalid owner_user: {error}"))?;

    Ok(Record {
        id,
        name: required("name", name)?,
        email: required("email", email)?,
        department: required("department", department)?,
        status: required("status", status)?,
        notes,
        owner_user,
        created_at: parse_timestamp("created_at", &required("created_at", created_at)?)?,
        updated_at: parse_timestamp("updated_at", &required("updated_at", updated_at)?)?,
    })
}

fn required(column: &str, value: Option<String>) -> Result<String, String> {
    value.ok_or_else(|| format!("column {column} is NULL"))
}

fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|error| format!("invalid {column} '{raw}': {error}"))
}

#[async_trait]
impl<E> RecordRepository for WarehouseRecordRepository<E>
where
    E: StatementExecutor,
{
    async fn list_owned(
        &self,
        owner: &Identity,
        filter: &RecordFilter,
    ) -> Result<Vec<Record>, RecordRepositoryError> {
        let result = self.run(self.list_statement(owner, filter)).await?;
        let records = decode_rows(result)?;
        debug!(count = records.len(), "decoded record rows");
        Ok(records)
    }

    async fn find_owned(
        &self,
        owner: &Identity,
        id: RecordId,
    ) -> Result<Option<Record>, RecordRepositoryError> {
        let result = self.run(self.find_statement(owner, id)).await?;
        Ok(decode_rows(result)?.into_iter().next())
    }

    async fn insert(&self, record: &Record) -> Result<(), RecordRepositoryError> {
        self.run(self.insert_statement(record)).await?;
        Ok(())
    }

    async fn update_owned(&self, record: &Record) -> Result<bool, RecordRepositoryError> {
        self.run_mutation(self.update_statement(record)).await
    }

    async fn delete_owned(
        &self,
        owner: &Identity,
        id: RecordId,
    ) -> Result<bool, RecordRepositoryError> {
        self.run_mutation(self.delete_statement(owner, id)).await
    }
}

#[cfg(test)]
#[path = "record_repository_tests.rs"]
mod tests;

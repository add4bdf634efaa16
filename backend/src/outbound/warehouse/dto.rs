//! Wire types for the SQL Statement Execution API.
//!
//! Requests always ask for `JSON_ARRAY` rows with `INLINE` disposition, so
//! every cell arrives as an optional string and decoding happens in the
//! repository.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Type tag attached to a named parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParameterType {
    /// Text value.
    String,
    /// 64-bit integer.
    Bigint,
    /// Timestamp in RFC 3339 form.
    Timestamp,
}

/// Named parameter bound to a `:name` marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementParameter {
    name: String,
    value: Option<String>,
    #[serde(rename = "type")]
    kind: ParameterType,
}

impl StatementParameter {
    /// Bind a string.
    pub fn string(name: &str, value: impl Into<String>) -> Self {
        Self::nullable_string(name, Some(value.into()))
    }

    /// Bind a string or SQL `NULL`.
    pub fn nullable_string(name: &str, value: Option<String>) -> Self {
        Self {
            name: name.to_owned(),
            value,
            kind: ParameterType::String,
        }
    }

    /// Bind a 64-bit integer.
    pub fn bigint(name: &str, value: i64) -> Self {
        Self {
            name: name.to_owned(),
            value: Some(value.to_string()),
            kind: ParameterType::Bigint,
        }
    }

    /// Bind a UTC timestamp with microsecond precision.
    pub fn timestamp(name: &str, value: DateTime<Utc>) -> Self {
        Self {
            name: name.to_owned(),
            value: Some(value.to_rfc3339_opts(SecondsFormat::Micros, true)),
            kind: ParameterType::Timestamp,
        }
    }

    /// Marker name without the leading colon.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bound value; `None` is SQL `NULL`.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Declared parameter type.
    pub fn kind(&self) -> ParameterType {
        self.kind
    }
}

#[derive(Debug, Serialize)]
pub(super) struct StatementRequestDto<'a> {
    pub(super) statement: &'a str,
    pub(super) warehouse_id: &'a str,
    pub(super) catalog: &'a str,
    pub(super) schema: &'a str,
    pub(super) parameters: &'a [StatementParameter],
    pub(super) wait_timeout: String,
    pub(super) on_wait_timeout: &'static str,
    pub(super) format: &'static str,
    pub(super) disposition: &'static str,
}

/// Lifecycle state reported by the warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementState {
    /// Queued for execution.
    Pending,
    /// Executing.
    Running,
    /// Completed with results.
    Succeeded,
    /// Failed with an error.
    Failed,
    /// Cancelled before completion.
    Canceled,
    /// Results were closed.
    Closed,
}

impl StatementState {
    pub(super) fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct StatementResponseDto {
    pub(super) statement_id: Option<String>,
    pub(super) status: StatementStatusDto,
    pub(super) manifest: Option<ManifestDto>,
    pub(super) result: Option<ResultDto>,
}

#[derive(Debug, Deserialize)]
pub(super) struct StatementStatusDto {
    pub(super) state: StatementState,
    pub(super) error: Option<ServiceErrorDto>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ServiceErrorDto {
    pub(super) error_code: Option<String>,
    pub(super) message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ManifestDto {
    pub(super) schema: Option<SchemaDto>,
    /// Set when the warehouse dropped rows beyond its inline byte limit.
    #[serde(default)]
    pub(super) truncated: bool,
    pub(super) total_row_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SchemaDto {
    #[serde(default)]
    pub(super) columns: Vec<ColumnDto>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ColumnDto {
    pub(super) name: String,
}

/// One chunk of inline rows. The first chunk is embedded in the statement
/// response; later chunks are fetched from `next_chunk_internal_link`.
#[derive(Debug, Default, Deserialize)]
pub(super) struct ResultDto {
    pub(super) data_array: Option<Vec<Vec<Option<String>>>>,
    pub(super) next_chunk_index: Option<u64>,
    pub(super) next_chunk_internal_link: Option<String>,
}

impl ServiceErrorDto {
    pub(super) fn describe(&self) -> String {
        match (self.error_code.as_deref(), self.message.as_deref()) {
            (Some(code), Some(message)) => format!("{code}: {message}"),
            (None, Some(message)) => message.to_owned(),
            (Some(code), None) => code.to_owned(),
            (None, None) => "statement failed".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn parameters_serialise_with_type_tags() {
        let at = Utc
            .with_ymd_and_hms(2026, 1, 2, 3, 4, 5)
            .single()
            .expect("valid timestamp");
        let params = [
            StatementParameter::string("owner", "a@example.com"),
            StatementParameter::bigint("id", 42),
            StatementParameter::timestamp("updated_at", at),
            StatementParameter::nullable_string("notes", None),
        ];

        let value = serde_json::to_value(params).expect("serialise");
        assert_eq!(
            value,
            json!([
                { "name": "owner", "value": "a@example.com", "type": "STRING" },
                { "name": "id", "value": "42", "type": "BIGINT" },
                { "name": "updated_at", "value": "2026-01-02T03:04:05.000000Z", "type": "TIMESTAMP" },
                { "name": "notes", "value": null, "type": "STRING" },
            ])
        );
    }

    #[test]
    fn decodes_failed_statement_status() {
        let body = json!({
            "statement_id": "01ef",
            "status": {
                "state": "FAILED",
                "error": { "error_code": "BAD_REQUEST", "message": "TABLE_OR_VIEW_NOT_FOUND" }
            }
        });

        let decoded: StatementResponseDto = serde_json::from_value(body).expect("decode");
        assert_eq!(decoded.status.state, StatementState::Failed);
        let error = decoded.status.error.expect("error present");
        assert_eq!(error.describe(), "BAD_REQUEST: TABLE_OR_VIEW_NOT_FOUND");
    }
}

//! Reqwest-backed client for the SQL Statement Execution API.
//!
//! This client owns transport details only: request serialisation, bearer
//! authentication, polling of long-running statements, following result
//! chunks, bounded retries and HTTP error mapping. It knows nothing about
//! records.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use super::dto::{
    ResultDto, StatementParameter, StatementRequestDto, StatementResponseDto, StatementState,
};
use crate::config::{AccessToken, ConnectionDescriptor};
use crate::domain::ports::define_port_error;

const STATEMENTS_PATH: &str = "api/2.0/sql/statements/";
const MIN_WAIT_SECS: u64 = 5;
const MAX_WAIT_SECS: u64 = 50;
const REQUEST_SLACK: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(500);
const BACKOFF_BASE_MS: u64 = 250;
const BACKOFF_CAP_MS: u64 = 4_000;
const BACKOFF_JITTER_MS: u64 = 100;

define_port_error! {
    /// Failures raised while executing a statement.
    pub enum StatementError {
        /// The warehouse could not accept the request; safe to retry.
        Unavailable { message: String } => "warehouse unavailable: {message}",
        /// The request may have reached the warehouse but no answer arrived.
        Transport { message: String } => "warehouse transport error: {message}",
        /// The statement did not finish in time.
        Timeout { message: String } => "warehouse statement timed out: {message}",
        /// Credentials were rejected.
        Unauthorized { message: String } => "warehouse rejected credentials: {message}",
        /// The request was malformed.
        Rejected { message: String } => "warehouse rejected request: {message}",
        /// The statement ran and failed.
        Failed { message: String } => "statement failed: {message}",
        /// The response could not be decoded.
        Decode { message: String } => "invalid warehouse response: {message}",
    }
}

impl StatementError {
    /// Whether the failure happened before the warehouse accepted the work.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// SQL text with its named parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    sql: String,
    parameters: Vec<StatementParameter>,
}

impl Statement {
    /// Start a statement with no parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            parameters: Vec::new(),
        }
    }

    /// Bind another named parameter.
    #[must_use]
    pub fn bind(mut self, parameter: StatementParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// SQL text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bound parameters in binding order.
    pub fn parameters(&self) -> &[StatementParameter] {
        &self.parameters
    }

    /// Value bound to `name`, if any.
    pub fn parameter(&self, name: &str) -> Option<&StatementParameter> {
        self.parameters.iter().find(|p| p.name() == name)
    }
}

/// Inline rows returned by a successful statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementResult {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl StatementResult {
    /// Build a result from column names and rows.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { columns, rows }
    }

    /// Column names from the result manifest.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in warehouse order.
    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    /// Consume the result, yielding its rows.
    pub fn into_rows(self) -> Vec<Vec<Option<String>>> {
        self.rows
    }

    /// `num_affected_rows` reported by a DML statement.
    pub fn affected_rows(&self) -> Option<u64> {
        let index = self
            .columns
            .iter()
            .position(|column| column == "num_affected_rows")?;
        self.rows
            .first()?
            .get(index)?
            .as_deref()?
            .parse()
            .ok()
    }
}

/// Executes SQL statements against the warehouse.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    /// Run `statement` and return its inline rows.
    async fn execute(&self, statement: &Statement) -> Result<StatementResult, StatementError>;
}

/// HTTP statement client bound to one warehouse, catalog and schema.
pub struct StatementClient {
    http: Client,
    endpoint: Url,
    token: AccessToken,
    warehouse_id: String,
    catalog: String,
    schema: String,
    timeout: Duration,
    max_retries: u32,
}

impl StatementClient {
    /// Build a client for the workspace named in `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns an error when the endpoint URL or the reqwest client cannot be
    /// constructed.
    pub fn new(descriptor: &ConnectionDescriptor) -> Result<Self, StatementError> {
        let base = Url::parse(&format!("https://{}/", descriptor.hostname()))
            .map_err(|error| StatementError::rejected(format!("invalid hostname: {error}")))?;
        Self::with_base_url(base, descriptor)
    }

    /// Build a client against an explicit base URL.
    ///
    /// # Errors
    ///
    /// Returns an error when the endpoint URL or the reqwest client cannot be
    /// constructed.
    pub fn with_base_url(base: Url, descriptor: &ConnectionDescriptor) -> Result<Self, StatementError> {
        let endpoint = base
            .join(STATEMENTS_PATH)
            .map_err(|error| StatementError::rejected(format!("invalid endpoint: {error}")))?;
        let http = Client::builder()
            .timeout(descriptor.connection_timeout() + REQUEST_SLACK)
            .build()
            .map_err(|error| StatementError::transport(error.to_string()))?;
        Ok(Self {
            http,
            endpoint,
            token: descriptor.access_token().clone(),
            warehouse_id: descriptor.warehouse_id().to_owned(),
            catalog: descriptor.catalog().to_owned(),
            schema: descriptor.schema().to_owned(),
            timeout: descriptor.connection_timeout(),
            max_retries: descriptor.max_retries(),
        })
    }

    /// Statements endpoint this client posts to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn execute_once(&self, statement: &Statement) -> Result<StatementResult, StatementError> {
        let request = StatementRequestDto {
            statement: statement.sql(),
            warehouse_id: &self.warehouse_id,
            catalog: &self.catalog,
            schema: &self.schema,
            parameters: statement.parameters(),
            wait_timeout: wait_timeout(self.timeout),
            on_wait_timeout: "CONTINUE",
            format: "JSON_ARRAY",
            disposition: "INLINE",
        };
        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(self.token.expose())
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;
        let mut decoded: StatementResponseDto = decode_response(response).await?;

        let deadline = Instant::now() + self.timeout;
        while !decoded.status.state.is_terminal() {
            let Some(statement_id) = decoded.statement_id.as_deref() else {
                return Err(StatementError::decode("pending statement without an id"));
            };
            if Instant::now() >= deadline {
                return Err(StatementError::timeout(format!(
                    "statement {statement_id} still {:?} after {}s",
                    decoded.status.state,
                    self.timeout.as_secs()
                )));
            }
            sleep(POLL_INTERVAL).await;
            let url = self
                .endpoint
                .join(statement_id)
                .map_err(|error| StatementError::decode(format!("invalid statement id: {error}")))?;
            let response = self
                .http
                .get(url)
                .bearer_auth(self.token.expose())
                .send()
                .await
                .map_err(map_transport_error)?;
            decoded = decode_response(response).await?;
        }

        let pending = into_result(decoded)?;
        collect_chunks(self, pending).await
    }
}

#[async_trait]
impl ChunkSource for StatementClient {
    async fn fetch_chunk(&self, link: &str) -> Result<ResultDto, StatementError> {
        let url = self
            .endpoint
            .join(link)
            .map_err(|error| StatementError::decode(format!("invalid chunk link: {error}")))?;
        if url.origin() != self.endpoint.origin() {
            return Err(StatementError::decode(format!(
                "chunk link {link} points outside the workspace"
            )));
        }
        let response = self
            .http
            .get(url)
            .bearer_auth(self.token.expose())
            .send()
            .await
            .map_err(map_transport_error)?;
        decode_response(response).await
    }
}

/// Source of the result chunks that follow the first inline one.
#[async_trait]
trait ChunkSource: Sync {
    async fn fetch_chunk(&self, link: &str) -> Result<ResultDto, StatementError>;
}

/// Rows received so far and the link to the next chunk, if any.
#[derive(Debug)]
struct PendingResult {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
    next_link: Option<String>,
    total_rows: Option<u64>,
}

#[async_trait]
impl StatementExecutor for StatementClient {
    async fn execute(&self, statement: &Statement) -> Result<StatementResult, StatementError> {
        let mut attempt: u32 = 0;
        loop {
            match self.execute_once(statement).await {
                Ok(result) => {
                    debug!(rows = result.rows().len(), attempt, "statement succeeded");
                    return Ok(result);
                }
                Err(error) if error.is_retryable() && attempt < self.max_retries => {
                    let delay = backoff_delay(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "retrying warehouse statement"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

fn wait_timeout(timeout: Duration) -> String {
    format!("{}s", timeout.as_secs().clamp(MIN_WAIT_SECS, MAX_WAIT_SECS))
}

fn backoff_delay(attempt: u32) -> Duration {
    let exponential = BACKOFF_BASE_MS
        .saturating_mul(1_u64 << attempt.min(16))
        .min(BACKOFF_CAP_MS);
    let jitter = rand::thread_rng().gen_range(0..=BACKOFF_JITTER_MS);
    Duration::from_millis(exponential + jitter)
}

async fn decode_response<T: DeserializeOwned>(response: Response) -> Result<T, StatementError> {
    let status = response.status();
    let body = response.bytes().await.map_err(map_transport_error)?;
    if !status.is_success() {
        return Err(map_status_error(status, body.as_ref()));
    }
    serde_json::from_slice(body.as_ref())
        .map_err(|error| StatementError::decode(format!("invalid statement JSON: {error}")))
}

fn into_result(response: StatementResponseDto) -> Result<PendingResult, StatementError> {
    match response.status.state {
        StatementState::Succeeded => {
            let manifest = response.manifest;
            if manifest.as_ref().is_some_and(|manifest| manifest.truncated) {
                return Err(StatementError::decode("result truncated by the warehouse"));
            }
            let total_rows = manifest.as_ref().and_then(|manifest| manifest.total_row_count);
            let columns = manifest
                .and_then(|manifest| manifest.schema)
                .map(|schema| schema.columns.into_iter().map(|c| c.name).collect())
                .unwrap_or_default();
            let (rows, next_link) = chunk_parts(response.result.unwrap_or_default())?;
            Ok(PendingResult {
                columns,
                rows,
                next_link,
                total_rows,
            })
        }
        StatementState::Failed => Err(StatementError::failed(
            response
                .status
                .error
                .map(|error| error.describe())
                .unwrap_or_else(|| "no error detail".to_owned()),
        )),
        state => Err(StatementError::failed(format!("statement ended {state:?}"))),
    }
}

fn chunk_parts(
    chunk: ResultDto,
) -> Result<(Vec<Vec<Option<String>>>, Option<String>), StatementError> {
    match (chunk.next_chunk_index, chunk.next_chunk_internal_link) {
        (Some(index), None) => Err(StatementError::decode(format!(
            "chunk {index} announced without a link"
        ))),
        (_, link) => Ok((chunk.data_array.unwrap_or_default(), link)),
    }
}

/// Follow chunk links until the result is complete.
///
/// The assembled row count must match `total_row_count` when the manifest
/// reports one.
async fn collect_chunks<S: ChunkSource>(
    source: &S,
    mut pending: PendingResult,
) -> Result<StatementResult, StatementError> {
    while let Some(link) = pending.next_link.take() {
        debug!(link = %link, rows = pending.rows.len(), "fetching result chunk");
        let (rows, next_link) = chunk_parts(source.fetch_chunk(&link).await?)?;
        pending.rows.extend(rows);
        pending.next_link = next_link;
    }
    let received = u64::try_from(pending.rows.len()).unwrap_or(u64::MAX);
    if let Some(expected) = pending.total_rows.filter(|expected| *expected != received) {
        return Err(StatementError::decode(format!(
            "expected {expected} rows, received {received}"
        )));
    }
    Ok(StatementResult::new(pending.columns, pending.rows))
}

fn map_transport_error(error: reqwest::Error) -> StatementError {
    if error.is_timeout() {
        StatementError::timeout(error.to_string())
    } else if error.is_connect() {
        StatementError::unavailable(error.to_string())
    } else {
        StatementError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> StatementError {
    let body_preview = body_preview(body);
    let message = if body_preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {}", status.as_u16(), body_preview)
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StatementError::unauthorized(message),
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => StatementError::unavailable(message),
        StatusCode::REQUEST_TIMEOUT => StatementError::timeout(message),
        _ if status.is_client_error() => StatementError::rejected(message),
        _ => StatementError::transport(message),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

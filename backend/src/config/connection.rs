//! Warehouse connection configuration parsing and validation.
//!
//! Every setting is read from an [`Env`] under its primary key first and a
//! bare fallback key second. Blank values count as absent.

use std::fmt;
use std::time::Duration;

use mockable::Env;
use zeroize::Zeroize;

const HOSTNAME_KEYS: &[&str] = &["DATABRICKS_SERVER_HOSTNAME", "SERVER_HOSTNAME"];
const HTTP_PATH_KEYS: &[&str] = &["DATABRICKS_HTTP_PATH", "HTTP_PATH"];
const TOKEN_KEYS: &[&str] = &["DATABRICKS_TOKEN", "ACCESS_TOKEN"];
const CATALOG_KEYS: &[&str] = &["UNITY_CATALOG_NAME", "CATALOG_NAME"];
const SCHEMA_KEYS: &[&str] = &["UNITY_SCHEMA_NAME", "SCHEMA_NAME"];
const TABLE_KEYS: &[&str] = &["UNITY_TABLE_NAME", "TABLE_NAME"];
const DEBUG_KEYS: &[&str] = &["APP_DEBUG", "DEBUG"];
const TIMEOUT_KEYS: &[&str] = &["CONNECTION_TIMEOUT"];
const RETRIES_KEYS: &[&str] = &["MAX_RETRIES"];

const DEFAULT_CATALOG: &str = "main";
const DEFAULT_SCHEMA: &str = "default";
const DEFAULT_TABLE: &str = "user_data";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 3;

const BOOL_EXPECTED: &str = "1|0|true|false|yes|no|y|n";
const IDENTIFIER_EXPECTED: &str = "letters, digits and underscores";
const TIMEOUT_EXPECTED: &str = "an integer number of seconds >= 1";
const RETRIES_EXPECTED: &str = "a non-negative integer";
const WAREHOUSE_PATH_EXPECTED: &str = "a path ending in the warehouse id";

/// Characters of the hostname kept in the redacted summary.
const HOSTNAME_PREVIEW: usize = 20;

/// Errors raised while resolving the warehouse connection.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// One or more required settings are absent or blank.
    #[error("missing required configuration: {}", .names.join(", "))]
    MissingField {
        /// Primary keys of every missing setting.
        names: Vec<&'static str>,
    },
    /// A setting is present but cannot be used.
    #[error("invalid value for {name}='{value}'; expected {expected}")]
    InvalidValue {
        /// Key the value was read from.
        name: &'static str,
        /// Offending value.
        value: String,
        /// Human-readable description of accepted values.
        expected: &'static str,
    },
}

/// Personal access token for the warehouse.
///
/// The secret is wiped on drop and never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw token.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Raw token for the `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Drop for AccessToken {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

impl fmt::Display for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Validated warehouse connection parameters.
#[derive(Debug, Clone)]
pub struct ConnectionDescriptor {
    hostname: String,
    http_path: String,
    access_token: AccessToken,
    catalog: String,
    schema: String,
    table: String,
    debug: bool,
    connection_timeout: Duration,
    max_retries: u32,
}

impl ConnectionDescriptor {
    /// Workspace hostname without scheme.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// HTTP path of the SQL warehouse.
    pub fn http_path(&self) -> &str {
        &self.http_path
    }

    /// Access token.
    pub fn access_token(&self) -> &AccessToken {
        &self.access_token
    }

    /// Catalog holding the records table.
    pub fn catalog(&self) -> &str {
        &self.catalog
    }

    /// Schema holding the records table.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Unqualified records table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Whether debug diagnostics are enabled.
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Per-statement timeout.
    pub fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }

    /// Retries after the first failed attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// `catalog.schema.table`.
    ///
    /// # Examples
    /// ```
    /// use mockable::MockEnv;
    /// use records_backend::config::resolve_connection;
    ///
    /// let mut env = MockEnv::new();
    /// env.expect_string().returning(|key| match key {
    ///     "DATABRICKS_SERVER_HOSTNAME" => Some("adb-1.azuredatabricks.net".into()),
    ///     "DATABRICKS_HTTP_PATH" => Some("/sql/1.0/warehouses/abc123".into()),
    ///     "DATABRICKS_TOKEN" => Some("dapi-secret".into()),
    ///     _ => None,
    /// });
    ///
    /// let descriptor = resolve_connection(&env).expect("valid configuration");
    /// assert_eq!(descriptor.qualified_table(), "main.default.user_data");
    /// assert_eq!(descriptor.warehouse_id(), "abc123");
    /// ```
    pub fn qualified_table(&self) -> String {
        format!("{}.{}.{}", self.catalog, self.schema, self.table)
    }

    /// Warehouse identifier, the last segment of the HTTP path.
    pub fn warehouse_id(&self) -> &str {
        warehouse_id_of(&self.http_path).unwrap_or_default()
    }

    /// Summary safe to log: truncated hostname and no token.
    pub fn redacted_summary(&self) -> String {
        let host: String = self.hostname.chars().take(HOSTNAME_PREVIEW).collect();
        format!(
            "server={host}... table={} warehouse={} timeout={}s retries={}",
            self.qualified_table(),
            self.warehouse_id(),
            self.connection_timeout.as_secs(),
            self.max_retries,
        )
    }
}

/// Resolve and validate the warehouse connection from `env`.
pub fn resolve_connection<E: Env>(env: &E) -> Result<ConnectionDescriptor, ConfigError> {
    let hostname = lookup_with(env, HOSTNAME_KEYS, normalise_hostname);
    let http_path = lookup(env, HTTP_PATH_KEYS);
    let token = lookup(env, TOKEN_KEYS);

    let missing: Vec<&'static str> = [
        (HOSTNAME_KEYS, hostname.is_none()),
        (HTTP_PATH_KEYS, http_path.is_none()),
        (TOKEN_KEYS, token.is_none()),
    ]
    .into_iter()
    .filter(|(_, absent)| *absent)
    .map(|(keys, _)| keys[0])
    .collect();

    let (Some((_, hostname)), Some((path_key, http_path)), Some((_, token))) =
        (hostname, http_path, token)
    else {
        return Err(ConfigError::MissingField { names: missing });
    };

    if warehouse_id_of(&http_path).is_none() {
        return Err(ConfigError::InvalidValue {
            name: path_key,
            value: http_path,
            expected: WAREHOUSE_PATH_EXPECTED,
        });
    }

    Ok(ConnectionDescriptor {
        hostname,
        http_path,
        access_token: AccessToken::new(token),
        catalog: identifier(env, CATALOG_KEYS, DEFAULT_CATALOG)?,
        schema: identifier(env, SCHEMA_KEYS, DEFAULT_SCHEMA)?,
        table: identifier(env, TABLE_KEYS, DEFAULT_TABLE)?,
        debug: debug_flag(env)?,
        connection_timeout: connection_timeout(env)?,
        max_retries: max_retries(env)?,
    })
}

/// First non-blank value among `keys`, paired with the key it came from.
fn lookup<E: Env>(env: &E, keys: &[&'static str]) -> Option<(&'static str, String)> {
    lookup_with(env, keys, |value| value.to_owned())
}

/// Like [`lookup`], but blankness is judged after `normalise`.
fn lookup_with<E: Env>(
    env: &E,
    keys: &[&'static str],
    normalise: fn(&str) -> String,
) -> Option<(&'static str, String)> {
    keys.iter().find_map(|key| {
        env.string(key)
            .map(|value| normalise(value.trim()))
            .filter(|value| !value.is_empty())
            .map(|value| (*key, value))
    })
}

fn normalise_hostname(raw: &str) -> String {
    let stripped = raw
        .strip_prefix("https://")
        .or_else(|| raw.strip_prefix("http://"))
        .unwrap_or(raw);
    stripped.trim_end_matches('/').trim().to_owned()
}

fn warehouse_id_of(http_path: &str) -> Option<&str> {
    http_path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
}

fn is_identifier(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn identifier<E: Env>(
    env: &E,
    keys: &[&'static str],
    default: &str,
) -> Result<String, ConfigError> {
    match lookup(env, keys) {
        None => Ok(default.to_owned()),
        Some((_, value)) if is_identifier(&value) => Ok(value),
        Some((name, value)) => Err(ConfigError::InvalidValue {
            name,
            value,
            expected: IDENTIFIER_EXPECTED,
        }),
    }
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Some(true),
        "0" | "false" | "no" | "n" => Some(false),
        _ => None,
    }
}

fn debug_flag<E: Env>(env: &E) -> Result<bool, ConfigError> {
    match lookup(env, DEBUG_KEYS) {
        None => Ok(false),
        Some((name, value)) => parse_bool(&value).ok_or(ConfigError::InvalidValue {
            name,
            value,
            expected: BOOL_EXPECTED,
        }),
    }
}

fn connection_timeout<E: Env>(env: &E) -> Result<Duration, ConfigError> {
    match lookup(env, TIMEOUT_KEYS) {
        None => Ok(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        Some((name, value)) => match value.parse::<u64>() {
            Ok(secs) if secs >= 1 => Ok(Duration::from_secs(secs)),
            _ => Err(ConfigError::InvalidValue {
                name,
                value,
                expected: TIMEOUT_EXPECTED,
            }),
        },
    }
}

fn max_retries<E: Env>(env: &E) -> Result<u32, ConfigError> {
    match lookup(env, RETRIES_KEYS) {
        None => Ok(DEFAULT_MAX_RETRIES),
        Some((name, value)) => value.parse::<u32>().map_err(|_| ConfigError::InvalidValue {
            name,
            value,
            expected: RETRIES_EXPECTED,
        }),
    }
}

#[cfg(test)]
mod tests;

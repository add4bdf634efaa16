//! Unit tests for warehouse connection parsing.

use super::*;
use mockable::MockEnv;
use rstest::rstest;
use std::collections::HashMap;

fn mock_env(vars: &[(&str, &str)]) -> MockEnv {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    let mut env = MockEnv::new();
    env.expect_string()
        .times(0..)
        .returning(move |key| vars.get(key).cloned());
    env
}

const REQUIRED: [(&str, &str); 3] = [
    ("DATABRICKS_SERVER_HOSTNAME", "adb-1234567890123456.7.azuredatabricks.net"),
    ("DATABRICKS_HTTP_PATH", "/sql/1.0/warehouses/abc123def"),
    ("DATABRICKS_TOKEN", "dapi-very-secret"),
];

fn with_required(extra: &[(&'static str, &'static str)]) -> MockEnv {
    let mut vars: Vec<(&str, &str)> = REQUIRED.to_vec();
    vars.extend_from_slice(extra);
    mock_env(&vars)
}

fn expect_error(result: Result<ConnectionDescriptor, ConfigError>) -> ConfigError {
    match result {
        Ok(descriptor) => panic!("expected failure, got {descriptor:?}"),
        Err(error) => error,
    }
}

#[rstest]
fn defaults_apply_when_optional_keys_absent() {
    let descriptor = resolve_connection(&with_required(&[])).expect("valid config");

    assert_eq!(descriptor.catalog(), "main");
    assert_eq!(descriptor.schema(), "default");
    assert_eq!(descriptor.table(), "user_data");
    assert_eq!(descriptor.qualified_table(), "main.default.user_data");
    assert!(!descriptor.debug());
    assert_eq!(descriptor.connection_timeout(), Duration::from_secs(30));
    assert_eq!(descriptor.max_retries(), 3);
    assert_eq!(descriptor.warehouse_id(), "abc123def");
}

#[rstest]
fn fallback_keys_are_accepted() {
    let env = mock_env(&[
        ("SERVER_HOSTNAME", "https://example.cloud.databricks.com/"),
        ("HTTP_PATH", "/sql/1.0/warehouses/w1"),
        ("ACCESS_TOKEN", "tok"),
        ("CATALOG_NAME", "sales"),
        ("SCHEMA_NAME", "crm"),
        ("TABLE_NAME", "contacts"),
        ("DEBUG", "yes"),
    ]);

    let descriptor = resolve_connection(&env).expect("valid config");
    assert_eq!(descriptor.hostname(), "example.cloud.databricks.com");
    assert_eq!(descriptor.qualified_table(), "sales.crm.contacts");
    assert!(descriptor.debug());
}

#[rstest]
fn primary_keys_win_over_fallbacks() {
    let env = with_required(&[
        ("UNITY_TABLE_NAME", "primary"),
        ("TABLE_NAME", "fallback"),
    ]);

    let descriptor = resolve_connection(&env).expect("valid config");
    assert_eq!(descriptor.table(), "primary");
}

#[rstest]
fn every_missing_required_key_is_named() {
    let env = mock_env(&[("DATABRICKS_HTTP_PATH", "/sql/1.0/warehouses/x")]);

    let error = expect_error(resolve_connection(&env));
    assert_eq!(
        error,
        ConfigError::MissingField {
            names: vec!["DATABRICKS_SERVER_HOSTNAME", "DATABRICKS_TOKEN"],
        }
    );
    assert_eq!(
        error.to_string(),
        "missing required configuration: DATABRICKS_SERVER_HOSTNAME, DATABRICKS_TOKEN"
    );
}

#[rstest]
fn blank_required_values_count_as_missing() {
    let env = mock_env(&[
        ("DATABRICKS_SERVER_HOSTNAME", "   "),
        ("DATABRICKS_HTTP_PATH", "/sql/1.0/warehouses/x"),
        ("DATABRICKS_TOKEN", "tok"),
    ]);

    let error = expect_error(resolve_connection(&env));
    assert!(matches!(
        error,
        ConfigError::MissingField { ref names } if names == &vec!["DATABRICKS_SERVER_HOSTNAME"]
    ));
}

#[rstest]
#[case("https://")]
#[case("http:///")]
#[case(" https:// ")]
fn hostname_with_only_a_scheme_counts_as_missing(#[case] raw: &'static str) {
    let env = mock_env(&[
        ("DATABRICKS_SERVER_HOSTNAME", raw),
        ("DATABRICKS_HTTP_PATH", "/sql/1.0/warehouses/x"),
        ("DATABRICKS_TOKEN", "tok"),
    ]);

    let error = expect_error(resolve_connection(&env));
    assert!(matches!(
        error,
        ConfigError::MissingField { ref names } if names == &vec!["DATABRICKS_SERVER_HOSTNAME"]
    ));
}

#[rstest]
fn blank_primary_hostname_falls_back_after_normalising() {
    let env = mock_env(&[
        ("DATABRICKS_SERVER_HOSTNAME", "https://"),
        ("SERVER_HOSTNAME", "https://fallback.example.com/"),
        ("DATABRICKS_HTTP_PATH", "/sql/1.0/warehouses/x"),
        ("DATABRICKS_TOKEN", "tok"),
    ]);

    let descriptor = resolve_connection(&env).expect("fallback hostname used");
    assert_eq!(descriptor.hostname(), "fallback.example.com");
}

#[rstest]
#[case("1", true)]
#[case("TRUE", true)]
#[case("y", true)]
#[case("0", false)]
#[case("No", false)]
#[case("false", false)]
fn debug_flag_accepts_boolean_spellings(#[case] raw: &'static str, #[case] expected: bool) {
    let descriptor =
        resolve_connection(&with_required(&[("APP_DEBUG", raw)])).expect("valid config");
    assert_eq!(descriptor.debug(), expected);
}

#[rstest]
#[case(&[("APP_DEBUG", "maybe")], "APP_DEBUG")]
#[case(&[("CONNECTION_TIMEOUT", "0")], "CONNECTION_TIMEOUT")]
#[case(&[("CONNECTION_TIMEOUT", "soon")], "CONNECTION_TIMEOUT")]
#[case(&[("MAX_RETRIES", "-1")], "MAX_RETRIES")]
#[case(&[("UNITY_TABLE_NAME", "users; DROP TABLE x")], "UNITY_TABLE_NAME")]
#[case(&[("UNITY_CATALOG_NAME", "main.default")], "UNITY_CATALOG_NAME")]
fn invalid_values_are_rejected(
    #[case] extra: &[(&'static str, &'static str)],
    #[case] key: &str,
) {
    let error = expect_error(resolve_connection(&with_required(extra)));
    match error {
        ConfigError::InvalidValue { name, .. } => assert_eq!(name, key),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[rstest]
fn http_path_without_warehouse_segment_is_rejected() {
    let env = mock_env(&[
        ("DATABRICKS_SERVER_HOSTNAME", "host"),
        ("DATABRICKS_HTTP_PATH", "///"),
        ("DATABRICKS_TOKEN", "tok"),
    ]);

    let error = expect_error(resolve_connection(&env));
    assert!(matches!(
        error,
        ConfigError::InvalidValue {
            name: "DATABRICKS_HTTP_PATH",
            ..
        }
    ));
}

#[rstest]
fn overrides_timeout_and_retries() {
    let env = with_required(&[("CONNECTION_TIMEOUT", "5"), ("MAX_RETRIES", "0")]);

    let descriptor = resolve_connection(&env).expect("valid config");
    assert_eq!(descriptor.connection_timeout(), Duration::from_secs(5));
    assert_eq!(descriptor.max_retries(), 0);
}

#[rstest]
fn summary_truncates_hostname_and_hides_token() {
    let descriptor = resolve_connection(&with_required(&[])).expect("valid config");

    let summary = descriptor.redacted_summary();
    assert!(summary.starts_with("server=adb-1234567890123456... "));
    assert!(summary.contains("table=main.default.user_data"));
    assert!(!summary.contains("dapi-very-secret"));
    assert!(!format!("{descriptor:?}").contains("dapi-very-secret"));
    assert_eq!(descriptor.access_token().expose(), "dapi-very-secret");
}

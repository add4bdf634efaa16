//! HTTP server settings loaded via OrthoConfig.

use std::net::SocketAddr;

use ortho_config::OrthoConfig;
use serde::Deserialize;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_TITLE: &str = "Unity Catalog Records";

/// Settings controlling the HTTP listener and the API document.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "APP")]
pub struct ServerSettings {
    /// Socket address to bind, e.g. `127.0.0.1:8080`.
    #[ortho_config(default = String::from(DEFAULT_BIND_ADDR))]
    pub bind_addr: String,
    /// Title shown in the OpenAPI document.
    pub title: Option<String>,
}

impl ServerSettings {
    /// Parsed bind address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.bind_addr.parse()
    }

    /// Configured title, falling back to the default.
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(DEFAULT_TITLE)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for server settings parsing.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    fn load_from_empty_args() -> ServerSettings {
        ServerSettings::load_from_iter([OsString::from("records-backend")])
            .expect("config should load")
    }

    #[rstest]
    fn defaults_are_used_when_missing() {
        let _guard = lock_env([
            ("APP_BIND_ADDR", None::<String>),
            ("APP_TITLE", None::<String>),
        ]);

        let settings = load_from_empty_args();
        assert_eq!(settings.bind_addr, DEFAULT_BIND_ADDR);
        assert!(settings.title.is_none());
        assert_eq!(
            settings.bind_addr().expect("default parses"),
            DEFAULT_BIND_ADDR.parse::<SocketAddr>().expect("literal parses")
        );
        assert_eq!(settings.title(), DEFAULT_TITLE);
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            ("APP_BIND_ADDR", Some("127.0.0.1:9000".to_owned())),
            ("APP_TITLE", Some("Team contacts".to_owned())),
        ]);

        let settings = load_from_empty_args();
        assert_eq!(
            settings.bind_addr().expect("override parses"),
            "127.0.0.1:9000".parse::<SocketAddr>().expect("literal parses")
        );
        assert_eq!(settings.title(), "Team contacts");
    }

    #[rstest]
    fn malformed_bind_addr_is_reported() {
        let _guard = lock_env([("APP_BIND_ADDR", Some("not-an-address".to_owned()))]);

        assert!(load_from_empty_args().bind_addr().is_err());
    }
}

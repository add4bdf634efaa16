//! Process configuration.
//!
//! Warehouse connection settings are resolved through [`mockable::Env`] so
//! they can be tested without touching the process environment. HTTP server
//! settings are layered by `ortho_config`.

pub mod connection;
pub mod logging;
pub mod server;

pub use connection::{AccessToken, ConfigError, ConnectionDescriptor, resolve_connection};
pub use logging::log_filter;
pub use server::ServerSettings;

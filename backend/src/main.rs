//! Backend entry-point: resolves warehouse settings and serves the record API.

use std::sync::Arc;

use actix_web::web;
use mockable::{DefaultClock, DefaultEnv};
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::fmt;

use records_backend::ApiDoc;
use records_backend::config::{ServerSettings, log_filter, resolve_connection};
use records_backend::inbound::http::health::HealthState;
use records_backend::server::{AppDependencies, build_http_state, create_server};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let env = DefaultEnv::new();
    let resolved = resolve_connection(&env);
    let debug = resolved.as_ref().is_ok_and(|descriptor| descriptor.debug());
    if let Err(e) = fmt()
        .with_env_filter(log_filter(&env, debug))
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let descriptor = resolved.map_err(std::io::Error::other)?;
    if descriptor.debug() {
        info!(connection = %descriptor.redacted_summary(), "resolved warehouse connection");
    }

    let settings = ServerSettings::load_from_iter(std::env::args_os())
        .map_err(|e| std::io::Error::other(format!("failed to load server settings: {e}")))?;
    let bind_addr = settings.bind_addr().map_err(std::io::Error::other)?;

    let http_state =
        build_http_state(&descriptor, Arc::new(DefaultClock)).map_err(std::io::Error::other)?;
    let deps = AppDependencies {
        health_state: web::Data::new(HealthState::new()),
        http_state: web::Data::new(http_state),
        openapi: web::Data::new(ApiDoc::with_title(settings.title())),
    };

    create_server(deps, bind_addr)?.await
}

//! Server construction and middleware wiring.

use std::net::SocketAddr;
use std::sync::Arc;

use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpResponse, HttpServer, web};
use mockable::Clock;
use tracing::info;

use crate::Trace;
use crate::config::ConnectionDescriptor;
use crate::domain::RecordService;
use crate::inbound::http::error::{json_error_handler, query_error_handler};
use crate::inbound::http::health::{HealthState, live, ready};
use crate::inbound::http::records::{
    create_record, current_identity, delete_record, get_record, list_records, update_record,
};
use crate::inbound::http::state::HttpState;
use crate::outbound::warehouse::{
    StatementClient, StatementError, WarehouseIdentityProvider, WarehouseRecordRepository,
};

/// Path the OpenAPI document is served from.
pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

/// Shared state handed to every worker's `App`.
#[derive(Clone)]
pub struct AppDependencies {
    /// Readiness and liveness flags.
    pub health_state: web::Data<HealthState>,
    /// Ports used by the record handlers.
    pub http_state: web::Data<HttpState>,
    /// Pre-rendered OpenAPI document.
    pub openapi: web::Data<utoipa::openapi::OpenApi>,
}

async fn openapi_json(doc: web::Data<utoipa::openapi::OpenApi>) -> HttpResponse {
    HttpResponse::Ok().json(doc.get_ref())
}

/// Build the application: API scope, health probes and the OpenAPI document.
pub fn build_app(
    deps: AppDependencies,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let AppDependencies {
        health_state,
        http_state,
        openapi,
    } = deps;

    let api = web::scope("/api/v1")
        .service(list_records)
        .service(create_record)
        .service(get_record)
        .service(update_record)
        .service(delete_record)
        .service(current_identity);

    App::new()
        .app_data(health_state)
        .app_data(http_state)
        .app_data(openapi)
        .app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(query_error_handler))
        .wrap(Trace)
        .service(api)
        .service(ready)
        .service(live)
        .route(OPENAPI_PATH, web::get().to(openapi_json))
}

/// Wire the warehouse adapters behind the HTTP ports.
///
/// # Errors
///
/// Returns an error when the statement client cannot be constructed.
pub fn build_http_state(
    descriptor: &ConnectionDescriptor,
    clock: Arc<dyn Clock>,
) -> Result<HttpState, StatementError> {
    let client = Arc::new(StatementClient::new(descriptor)?);
    let repository = WarehouseRecordRepository::new(client.clone(), descriptor.qualified_table());
    let service = RecordService::new(Arc::new(repository), clock);
    let identity = WarehouseIdentityProvider::new(client);
    info!(endpoint = %descriptor.hostname(), table = %descriptor.qualified_table(), "warehouse adapters ready");
    Ok(HttpState::new(Arc::new(service), Arc::new(identity)))
}

/// Construct an Actix HTTP server bound to `bind_addr`.
///
/// The health state is marked ready once the listener is bound.
///
/// # Errors
///
/// Propagates [`std::io::Error`] when binding the socket fails.
pub fn create_server(deps: AppDependencies, bind_addr: SocketAddr) -> std::io::Result<Server> {
    let health_state = deps.health_state.clone();
    let server = HttpServer::new(move || build_app(deps.clone()))
        .bind(bind_addr)?
        .run();

    health_state.mark_ready();
    info!(%bind_addr, "listening");
    Ok(server)
}

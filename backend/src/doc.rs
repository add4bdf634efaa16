//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] registers every record endpoint, the health probes and the
//! error schema wrappers from [`crate::inbound::http::schemas`]. The document
//! is served at `/api-docs/openapi.json`.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::inbound::http::identity::FORWARDED_EMAIL_HEADER;
use crate::inbound::http::records::{
    CreateRecordRequest, MeResponse, RecordResponse, UpdateRecordRequest,
};
use crate::inbound::http::schemas::{ErrorCodeSchema, ErrorSchema};

/// Describe the proxy-forwarded identity header as the security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "ForwardedEmail",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                FORWARDED_EMAIL_HEADER,
                "User e-mail injected by the platform's app proxy.",
            ))),
        );
    }
}

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Unity Catalog Records",
        description = "Owner-scoped CRUD over a single warehouse table, plus health probes."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    security(("ForwardedEmail" = [])),
    paths(
        crate::inbound::http::records::list_records,
        crate::inbound::http::records::create_record,
        crate::inbound::http::records::get_record,
        crate::inbound::http::records::update_record,
        crate::inbound::http::records::delete_record,
        crate::inbound::http::records::current_identity,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        RecordResponse,
        CreateRecordRequest,
        UpdateRecordRequest,
        MeResponse,
        ErrorSchema,
        ErrorCodeSchema
    )),
    tags(
        (name = "records", description = "Owner-scoped record management"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate the document with a deployment-specific title.
    pub fn with_title(title: &str) -> utoipa::openapi::OpenApi {
        let mut doc = Self::openapi();
        title.clone_into(&mut doc.info.title);
        doc
    }
}

//! Record HTTP handlers.
//!
//! ```text
//! GET    /api/v1/records?name=&email=
//! POST   /api/v1/records
//! GET    /api/v1/records/{id}
//! PATCH  /api/v1/records/{id}
//! DELETE /api/v1/records/{id}
//! GET    /api/v1/me
//! ```

use actix_web::{HttpResponse, delete, get, patch, post, web};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use tracing::debug;
use utoipa::{IntoParams, ToSchema};

use crate::domain::{
    DEPARTMENTS, Error, NewRecordFields, Record, RecordFilter, RecordId, RecordPatch, STATUSES,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::identity::ActingIdentity;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;

/// Optional list filters; blank terms are ignored.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecordQuery {
    /// Case-insensitive substring of the name.
    pub name: Option<String>,
    /// Case-insensitive substring of the e-mail.
    pub email: Option<String>,
}

/// Request payload for creating a record.
///
/// Unknown fields, including any attempt to set `ownerUser`, are ignored.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecordRequest {
    /// Full name; required.
    pub name: Option<String>,
    /// E-mail address; required.
    pub email: Option<String>,
    /// Department; defaults to `IT`.
    pub department: Option<String>,
    /// Status; defaults to `Active`.
    pub status: Option<String>,
    /// Free-form notes.
    pub notes: Option<String>,
}

/// Request payload for a partial update.
///
/// Absent fields keep their stored value; `"notes": null` clears the notes.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecordRequest {
    /// New name.
    pub name: Option<String>,
    /// New e-mail address.
    pub email: Option<String>,
    /// New department.
    pub department: Option<String>,
    /// New status.
    pub status: Option<String>,
    /// New notes, or `null` to clear them.
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>)]
    pub notes: Option<Option<String>>,
}

/// Distinguish an explicit `null` from an absent field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Response payload for a record.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordResponse {
    /// Record identifier.
    pub id: i64,
    /// Full name.
    pub name: String,
    /// E-mail address.
    pub email: String,
    /// Department.
    pub department: String,
    /// Status.
    pub status: String,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Identity that owns the record.
    pub owner_user: String,
    /// Creation time, RFC 3339.
    pub created_at: String,
    /// Last modification time, RFC 3339.
    pub updated_at: String,
}

impl From<Record> for RecordResponse {
    fn from(value: Record) -> Self {
        Self {
            id: value.id.get(),
            name: value.name,
            email: value.email,
            department: value.department,
            status: value.status,
            notes: value.notes,
            owner_user: value.owner_user.into(),
            created_at: value.created_at.to_rfc3339(),
            updated_at: value.updated_at.to_rfc3339(),
        }
    }
}

/// Acting identity and the form's choice lists.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    /// Identity requests act on behalf of.
    pub identity: String,
    /// Departments offered by the entry form.
    pub departments: Vec<String>,
    /// Statuses offered by the entry form.
    pub statuses: Vec<String>,
}

impl From<CreateRecordRequest> for NewRecordFields {
    fn from(value: CreateRecordRequest) -> Self {
        Self {
            name: value.name.unwrap_or_default(),
            email: value.email.unwrap_or_default(),
            department: value.department,
            status: value.status,
            notes: value.notes,
        }
    }
}

impl From<UpdateRecordRequest> for RecordPatch {
    fn from(value: UpdateRecordRequest) -> Self {
        Self {
            name: value.name,
            email: value.email,
            department: value.department,
            status: value.status,
            notes: value.notes,
        }
    }
}

fn parse_record_id(raw: &str) -> Result<RecordId, Error> {
    raw.parse::<RecordId>().map_err(|_| {
        Error::invalid_request("record id must be a positive integer").with_details(json!({
            "field": "id",
            "value": raw,
            "code": "invalid_id",
        }))
    })
}

/// List the caller's records, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/records",
    params(RecordQuery),
    responses(
        (status = 200, description = "Owned records", body = [RecordResponse]),
        (status = 401, description = "No acting identity", body = ErrorSchema),
        (status = 503, description = "Warehouse unavailable", body = ErrorSchema)
    ),
    tags = ["records"],
    operation_id = "listRecords"
)]
#[get("/records")]
pub async fn list_records(
    state: web::Data<HttpState>,
    identity: ActingIdentity,
    query: web::Query<RecordQuery>,
) -> ApiResult<web::Json<Vec<RecordResponse>>> {
    let RecordQuery { name, email } = query.into_inner();
    let filter = RecordFilter::new(name, email);
    let records = state.records.list(identity.identity(), &filter).await?;
    Ok(web::Json(
        records.into_iter().map(RecordResponse::from).collect(),
    ))
}

/// Create a record owned by the caller.
#[utoipa::path(
    post,
    path = "/api/v1/records",
    request_body = CreateRecordRequest,
    responses(
        (status = 201, description = "Created record", body = RecordResponse),
        (status = 400, description = "Validation failed", body = ErrorSchema),
        (status = 401, description = "No acting identity", body = ErrorSchema),
        (status = 503, description = "Warehouse unavailable", body = ErrorSchema)
    ),
    tags = ["records"],
    operation_id = "createRecord"
)]
#[post("/records")]
pub async fn create_record(
    state: web::Data<HttpState>,
    identity: ActingIdentity,
    payload: web::Json<CreateRecordRequest>,
) -> ApiResult<HttpResponse> {
    let record = state
        .records
        .create(identity.identity(), payload.into_inner().into())
        .await?;
    debug!(record_id = %record.id, "created record via HTTP");
    Ok(HttpResponse::Created().json(RecordResponse::from(record)))
}

/// Fetch one record owned by the caller.
#[utoipa::path(
    get,
    path = "/api/v1/records/{id}",
    params(("id" = i64, Path, description = "Record identifier")),
    responses(
        (status = 200, description = "Record", body = RecordResponse),
        (status = 400, description = "Malformed id", body = ErrorSchema),
        (status = 404, description = "Not found or not owned", body = ErrorSchema)
    ),
    tags = ["records"],
    operation_id = "getRecord"
)]
#[get("/records/{id}")]
pub async fn get_record(
    state: web::Data<HttpState>,
    identity: ActingIdentity,
    path: web::Path<String>,
) -> ApiResult<web::Json<RecordResponse>> {
    let id = parse_record_id(&path)?;
    let record = state.records.get(identity.identity(), id).await?;
    Ok(web::Json(record.into()))
}

/// Apply a partial update to a record owned by the caller.
#[utoipa::path(
    patch,
    path = "/api/v1/records/{id}",
    params(("id" = i64, Path, description = "Record identifier")),
    request_body = UpdateRecordRequest,
    responses(
        (status = 200, description = "Updated record", body = RecordResponse),
        (status = 400, description = "Validation failed", body = ErrorSchema),
        (status = 404, description = "Not found or not owned", body = ErrorSchema),
        (status = 503, description = "Warehouse unavailable", body = ErrorSchema)
    ),
    tags = ["records"],
    operation_id = "updateRecord"
)]
#[patch("/records/{id}")]
pub async fn update_record(
    state: web::Data<HttpState>,
    identity: ActingIdentity,
    path: web::Path<String>,
    payload: web::Json<UpdateRecordRequest>,
) -> ApiResult<web::Json<RecordResponse>> {
    let id = parse_record_id(&path)?;
    let record = state
        .records
        .update(identity.identity(), id, payload.into_inner().into())
        .await?;
    Ok(web::Json(record.into()))
}

/// Delete a record owned by the caller.
#[utoipa::path(
    delete,
    path = "/api/v1/records/{id}",
    params(("id" = i64, Path, description = "Record identifier")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found or not owned", body = ErrorSchema),
        (status = 503, description = "Warehouse unavailable", body = ErrorSchema)
    ),
    tags = ["records"],
    operation_id = "deleteRecord"
)]
#[delete("/records/{id}")]
pub async fn delete_record(
    state: web::Data<HttpState>,
    identity: ActingIdentity,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = parse_record_id(&path)?;
    state.records.delete(identity.identity(), id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Report the acting identity and form choices.
#[utoipa::path(
    get,
    path = "/api/v1/me",
    responses(
        (status = 200, description = "Acting identity", body = MeResponse),
        (status = 401, description = "No acting identity", body = ErrorSchema)
    ),
    tags = ["records"],
    operation_id = "currentIdentity"
)]
#[get("/me")]
pub async fn current_identity(identity: ActingIdentity) -> web::Json<MeResponse> {
    web::Json(MeResponse {
        identity: identity.into_inner().into(),
        departments: DEPARTMENTS.iter().map(|d| (*d).to_owned()).collect(),
        statuses: STATUSES.iter().map(|s| (*s).to_owned()).collect(),
    })
}

#[cfg(test)]
#[path = "records_tests.rs"]
mod tests;

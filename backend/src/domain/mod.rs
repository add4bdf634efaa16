//! Domain primitives, aggregates and services.
//!
//! Purpose: Define strongly typed record entities and the owner-scoped
//! service that manages them. Adapters sit behind the traits in [`ports`].
//!
//! Public surface:
//! - Error (alias to `error::Error`) — API error response payload.
//! - ErrorCode (alias to `error::ErrorCode`) — stable error identifier.
//! - Identity — authenticated user a request acts on behalf of.
//! - Record, RecordId, RecordFilter, RecordPatch, NewRecordFields — record
//!   aggregate and its inputs.
//! - RecordService — implementation of the `RecordStore` driving port.

pub mod error;
pub mod identity;
pub mod ports;
pub mod record;
pub mod record_service;
pub mod trace_id;

pub use self::error::{Error, ErrorCode};
pub use self::identity::{IDENTITY_MAX, Identity, IdentityValidationError};
pub use self::record::{
    DEFAULT_DEPARTMENT, DEFAULT_STATUS, DEPARTMENTS, NewRecordFields, Record, RecordContent,
    RecordField, RecordFilter, RecordId, RecordPatch, RecordValidationError, STATUSES,
    is_valid_email,
};
pub use self::record_service::RecordService;
pub use self::trace_id::{TRACE_ID_HEADER, TraceId};


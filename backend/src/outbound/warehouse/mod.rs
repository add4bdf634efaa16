//! SQL warehouse adapters.
//!
//! [`StatementClient`] talks to the Statement Execution REST API;
//! [`WarehouseRecordRepository`] and [`WarehouseIdentityProvider`] build on it
//! through the [`StatementExecutor`] seam.

mod client;
mod dto;
mod identity;
mod record_repository;

pub use client::{Statement, StatementClient, StatementError, StatementExecutor, StatementResult};
pub use dto::{ParameterType, StatementParameter, StatementState};
pub use identity::WarehouseIdentityProvider;
pub use record_repository::WarehouseRecordRepository;

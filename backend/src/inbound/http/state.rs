//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain ports and remain testable without I/O.

use std::sync::Arc;

use crate::domain::ports::{IdentityProvider, RecordStore};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    /// Owner-scoped record use-cases.
    pub records: Arc<dyn RecordStore>,
    /// Fallback identity when no forwarded identity header is present.
    pub identity: Arc<dyn IdentityProvider>,
}

impl HttpState {
    /// Bundle the ports used by HTTP handlers.
    pub fn new(records: Arc<dyn RecordStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { records, identity }
    }
}

//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod identity_provider;
mod record_repository;
mod record_store;

#[cfg(test)]
pub use identity_provider::MockIdentityProvider;
pub use identity_provider::{FixedIdentityProvider, IdentityProvider, IdentityProviderError};
#[cfg(test)]
pub use record_repository::MockRecordRepository;
pub use record_repository::{RecordRepository, RecordRepositoryError};
#[cfg(test)]
pub use record_store::MockRecordStore;
pub use record_store::RecordStore;

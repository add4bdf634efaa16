//! Port resolving the identity the warehouse associates with the connection.
//!
//! Used when an inbound request carries no forwarded user identity.

use async_trait::async_trait;

use crate::domain::Identity;

use super::define_port_error;

define_port_error! {
    /// Errors raised while resolving the connection identity.
    pub enum IdentityProviderError {
        /// The warehouse could not be reached.
        Connection { message: String } =>
            "identity lookup connection failed: {message}",
        /// The lookup ran but produced no usable identity.
        Unresolved { message: String } =>
            "identity could not be resolved: {message}",
    }
}

/// Port for the warehouse's notion of the current user.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Return the identity behind the warehouse connection.
    async fn current_identity(&self) -> Result<Identity, IdentityProviderError>;
}

/// Identity provider returning one fixed identity.
///
/// Useful for local development and tests where no warehouse is involved.
#[derive(Debug, Clone)]
pub struct FixedIdentityProvider(Identity);

impl FixedIdentityProvider {
    /// Wrap a fixed identity.
    pub fn new(identity: Identity) -> Self {
        Self(identity)
    }
}

#[async_trait]
impl IdentityProvider for FixedIdentityProvider {
    async fn current_identity(&self) -> Result<Identity, IdentityProviderError> {
        Ok(self.0.clone())
    }
}

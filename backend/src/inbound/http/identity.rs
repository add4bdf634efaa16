//! Acting-identity extraction for HTTP handlers.
//!
//! The platform's app proxy forwards the signed-in user's e-mail in
//! `X-Forwarded-Email`. Requests without it fall back to the identity the
//! warehouse associates with the service credentials.

use actix_web::{FromRequest, HttpRequest, dev::Payload, web};
use futures_util::future::LocalBoxFuture;
use tracing::{debug, warn};

use crate::domain::ports::IdentityProviderError;
use crate::domain::{Error, Identity};
use crate::inbound::http::state::HttpState;

/// Header carrying the proxied user identity.
pub const FORWARDED_EMAIL_HEADER: &str = "X-Forwarded-Email";

/// Identity a request acts on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActingIdentity(Identity);

impl ActingIdentity {
    /// Borrow the resolved identity.
    pub fn identity(&self) -> &Identity {
        &self.0
    }

    /// Consume the wrapper.
    pub fn into_inner(self) -> Identity {
        self.0
    }
}

fn forwarded_identity(req: &HttpRequest) -> Result<Option<Identity>, Error> {
    let Some(value) = req.headers().get(FORWARDED_EMAIL_HEADER) else {
        return Ok(None);
    };
    let raw = value
        .to_str()
        .map_err(|_| Error::unauthorized("forwarded identity is not valid text"))?;
    Identity::new(raw.trim()).map(Some).map_err(|error| {
        warn!(%error, "rejecting malformed forwarded identity");
        Error::unauthorized(format!("invalid forwarded identity: {error}"))
    })
}

fn map_provider_error(error: IdentityProviderError) -> Error {
    match error {
        IdentityProviderError::Connection { .. } => {
            Error::service_unavailable(format!("identity lookup failed: {error}"))
        }
        IdentityProviderError::Unresolved { .. } => {
            Error::unauthorized(format!("no acting identity: {error}"))
        }
    }
}

impl FromRequest for ActingIdentity {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let forwarded = forwarded_identity(req);
        let state = req.app_data::<web::Data<HttpState>>().cloned();
        Box::pin(async move {
            if let Some(identity) = forwarded? {
                return Ok(Self(identity));
            }
            let state =
                state.ok_or_else(|| Error::internal("HTTP state is not configured"))?;
            let identity = state
                .identity
                .current_identity()
                .await
                .map_err(map_provider_error)?;
            debug!(identity = %identity, "using warehouse identity");
            Ok(Self(identity))
        })
    }
}

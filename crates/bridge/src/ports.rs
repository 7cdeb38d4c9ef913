//! Port traits implemented by the infrastructure crates.
//!
//! The domain only ever sees these two traits. `github` implements
//! [`TokenIssuer`]; `heroku` implements [`Provisioner`]. Tests substitute
//! in-memory fakes.

use async_trait::async_trait;

use crate::{ComputeUnit, OrgLogin, ProvisionError, ProvisionRequest, RegistrationToken, TokenError};

/// Issues organization-scoped runner registration tokens.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Creates a new registration token for `org`.
    ///
    /// Each call may invalidate previously issued tokens, so callers should go
    /// through [`crate::TokenCache`] rather than calling this directly.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] for authentication, rate-limit, transport, or
    /// decoding failures.
    async fn create_registration_token(&self, org: &OrgLogin)
        -> Result<RegistrationToken, TokenError>;
}

/// Creates ephemeral compute units.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Starts one unit running [`ProvisionRequest::command`].
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] if the unit could not be created.
    async fn create_compute_unit(
        &self,
        request: &ProvisionRequest,
    ) -> Result<ComputeUnit, ProvisionError>;
}

//! Single-slot registration token cache with single-flight refresh.
//!
//! Many webhook deliveries can ask for a token at the same time. The cache
//! holds one [`RegistrationToken`] behind a [`tokio::sync::Mutex`] and decides
//! whether to refresh while holding that lock, so at most one call to the
//! [`TokenIssuer`] is in flight at any moment and concurrent callers that
//! arrive during a refresh all receive its result.
//!
//! Every access can end in a write, so a plain mutex is used rather than a
//! read-write lock.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::{DispatchError, OrgLogin, RegistrationToken, TokenIssuer, TokenSecret};

/// Process-wide cache for the current registration token.
pub struct TokenCache {
    issuer: Arc<dyn TokenIssuer>,
    slot: Mutex<Option<RegistrationToken>>,
}

impl TokenCache {
    /// Creates an empty cache that refreshes through `issuer`.
    pub fn new(issuer: Arc<dyn TokenIssuer>) -> Self {
        Self {
            issuer,
            slot: Mutex::new(None),
        }
    }

    /// Returns a token for `org` that is usable right now.
    ///
    /// The cached token is returned when it was issued for `org` and is still
    /// outside the safety margin of its expiry. Otherwise a new token is
    /// requested while the lock is held; callers arriving in the meantime wait
    /// and then see the refreshed token.
    ///
    /// If the calling future is dropped mid-refresh (request timeout) the lock
    /// is released with the slot untouched and the next caller refreshes.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::TokenAcquisitionFailed`] if the issuer fails.
    /// The slot is left as it was and no stale token is returned.
    #[instrument(skip(self), fields(org = %org))]
    pub async fn get(&self, org: &OrgLogin) -> Result<TokenSecret, DispatchError> {
        let mut slot = self.slot.lock().await;

        if let Some(token) = slot.as_ref() {
            if token.org() == org && token.is_usable_at(Utc::now()) {
                return Ok(token.secret().clone());
            }
            debug!(
                cached_org = %token.org(),
                expires_at = %token.expires_at(),
                "Cached registration token is no longer usable"
            );
        }

        let token = self
            .issuer
            .create_registration_token(org)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to create registration token");
                DispatchError::TokenAcquisitionFailed(e)
            })?;

        info!(expires_at = %token.expires_at(), "Obtained new registration token");

        let secret = token.secret().clone();
        *slot = Some(token);
        Ok(secret)
    }
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "token_cache_tests.rs"]
mod tests;

//! In-memory port implementations for tests.
//!
//! Compiled for this crate's own tests and, through the `test-support`
//! feature, for downstream crates' tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    ComputeUnit, ComputeUnitId, OrgLogin, ProvisionError, ProvisionRequest, Provisioner,
    RegistrationToken, TokenError, TokenIssuer, TokenSecret,
};

/// A [`TokenIssuer`] that counts calls and issues `token-<n>` secrets.
#[derive(Debug)]
pub struct FakeTokenIssuer {
    calls: AtomicUsize,
    lifetime: chrono::Duration,
    delay: Duration,
    failing: AtomicBool,
    orgs: Mutex<Vec<OrgLogin>>,
}

impl FakeTokenIssuer {
    /// Issues tokens valid for one hour, without delay.
    pub fn new() -> Self {
        Self::with_lifetime(chrono::Duration::hours(1))
    }

    /// Issues tokens that expire `lifetime` after issuance.
    pub fn with_lifetime(lifetime: chrono::Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            lifetime,
            delay: Duration::ZERO,
            failing: AtomicBool::new(false),
            orgs: Mutex::new(Vec::new()),
        }
    }

    /// Sleeps for `delay` inside every call, to widen race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Makes subsequent calls fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of calls made so far, successful or not.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Organizations requested, in call order.
    pub fn requested_orgs(&self) -> Vec<OrgLogin> {
        self.orgs.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

impl Default for FakeTokenIssuer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenIssuer for FakeTokenIssuer {
    async fn create_registration_token(
        &self,
        org: &OrgLogin,
    ) -> Result<RegistrationToken, TokenError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut orgs) = self.orgs.lock() {
            orgs.push(org.clone());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(TokenError::Unauthorized {
                message: "Bad credentials".to_string(),
            });
        }
        Ok(RegistrationToken::new(
            org.clone(),
            TokenSecret::new(format!("token-{n}")),
            Utc::now() + self.lifetime,
        ))
    }
}

/// A [`Provisioner`] that records every request it receives.
#[derive(Debug, Default)]
pub struct RecordingProvisioner {
    requests: Mutex<Vec<ProvisionRequest>>,
    delay: Duration,
    failing: AtomicBool,
}

impl RecordingProvisioner {
    /// A provisioner that accepts every request immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps for `delay` inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Makes subsequent calls fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Requests received so far, including failed ones.
    pub fn requests(&self) -> Vec<ProvisionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Provisioner for RecordingProvisioner {
    async fn create_compute_unit(
        &self,
        request: &ProvisionRequest,
    ) -> Result<ComputeUnit, ProvisionError> {
        let n = {
            let mut requests = self
                .requests
                .lock()
                .map_err(|e| ProvisionError::Transport(e.to_string()))?;
            requests.push(request.clone());
            requests.len()
        };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProvisionError::UnexpectedResponse {
                status: 422,
                body: "Your account has reached its concurrent dyno limit".to_string(),
            });
        }
        Ok(ComputeUnit {
            id: ComputeUnitId::new(format!("unit-{n}")).expect("non-empty id"),
            name: Some(format!("run.{n}")),
            state: Some("starting".to_string()),
        })
    }
}

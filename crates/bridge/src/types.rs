//! Shared value types for the runner bridge domain.
//!
//! These are pure data types with no I/O. They are constructed by the
//! infrastructure crates (webhook parsing, API clients) and consumed by the
//! [`crate::TokenCache`] and [`crate::Dispatcher`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AppName, ComputeUnitId, JobId, OrgLogin, RepositoryName, RunId, RunnerLabel};

// ---------------------------------------------------------------------------
// Registration tokens
// ---------------------------------------------------------------------------

/// How long before its stated expiry a registration token stops being handed
/// out. A runner needs some time between receiving the token and calling
/// `config.sh` with it.
pub const SAFETY_MARGIN_SECS: i64 = 5 * 60;

/// [`SAFETY_MARGIN_SECS`] as a [`chrono::Duration`].
pub fn safety_margin() -> chrono::Duration {
    chrono::Duration::seconds(SAFETY_MARGIN_SECS)
}

/// An opaque credential string that must never end up in logs.
///
/// `Debug` and `Display` both print a fixed placeholder. Use
/// [`TokenSecret::expose`] at the single point where the raw value is needed.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);

impl TokenSecret {
    /// Wraps a raw credential.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw credential.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for TokenSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenSecret(<redacted>)")
    }
}

impl std::fmt::Display for TokenSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<redacted>")
    }
}

/// A short-lived organization registration token, as issued by GitHub.
///
/// Owned by the [`crate::TokenCache`]; replaced wholesale on refresh, never
/// mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationToken {
    org: OrgLogin,
    secret: TokenSecret,
    expires_at: DateTime<Utc>,
}

impl RegistrationToken {
    /// Creates a token issued for `org` that expires at `expires_at`.
    pub fn new(org: OrgLogin, secret: TokenSecret, expires_at: DateTime<Utc>) -> Self {
        Self {
            org,
            secret,
            expires_at,
        }
    }

    /// The organization this token registers runners for.
    pub fn org(&self) -> &OrgLogin {
        &self.org
    }

    /// The credential itself.
    pub fn secret(&self) -> &TokenSecret {
        &self.secret
    }

    /// Absolute expiry as reported by the issuer.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns `true` while `now` is strictly earlier than the expiry minus the
    /// [safety margin](safety_margin).
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at - safety_margin()
    }
}

// ---------------------------------------------------------------------------
// Webhook events
// ---------------------------------------------------------------------------

/// The `action` of a `workflow_job` delivery.
///
/// Only [`WorkflowAction::Queued`] triggers provisioning. Actions this crate
/// does not know about are preserved verbatim in [`WorkflowAction::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WorkflowAction {
    Queued,
    InProgress,
    Completed,
    Waiting,
    Other(String),
}

impl WorkflowAction {
    /// The wire representation of the action.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Waiting => "waiting",
            Self::Other(other) => other,
        }
    }
}

impl From<String> for WorkflowAction {
    fn from(value: String) -> Self {
        match value.as_str() {
            "queued" => Self::Queued,
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            "waiting" => Self::Waiting,
            _ => Self::Other(value),
        }
    }
}

impl From<WorkflowAction> for String {
    fn from(value: WorkflowAction) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded `workflow_job` webhook delivery.
///
/// Unknown fields are ignored so that additions to GitHub's schema never break
/// decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowJobEvent {
    pub action: WorkflowAction,
    pub workflow_job: WorkflowJob,
    #[serde(default)]
    pub organization: Option<Organization>,
    #[serde(default)]
    pub repository: Option<Repository>,
    #[serde(default)]
    pub sender: Option<Sender>,
}

impl WorkflowJobEvent {
    /// Login of the organization the delivery came from, if the payload
    /// carried an organization block.
    pub fn org_login(&self) -> Option<&OrgLogin> {
        self.organization.as_ref().map(|o| &o.login)
    }
}

/// The `workflow_job` object of a delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowJob {
    pub id: JobId,
    #[serde(default)]
    pub run_id: Option<RunId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub labels: Vec<RunnerLabel>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub runner_name: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// The `organization` object of a delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub login: OrgLogin,
    #[serde(default)]
    pub id: Option<u64>,
}

/// The `repository` object of a delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub full_name: RepositoryName,
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub private: bool,
}

/// The `sender` object of a delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sender {
    pub login: String,
    #[serde(default)]
    pub id: Option<u64>,
}

// ---------------------------------------------------------------------------
// Provisioning
// ---------------------------------------------------------------------------

/// A request to start one ephemeral runner.
///
/// Built fresh for every queued job so it always embeds a token that was
/// usable when it was created. The command contains that token, so `Debug`
/// redacts it.
#[derive(Clone, PartialEq, Eq)]
pub struct ProvisionRequest {
    app: AppName,
    command: String,
}

impl ProvisionRequest {
    /// Builds the request for a runner that registers against `org` with
    /// `token`, runs exactly one job, and exits.
    pub fn for_runner(app: AppName, org: &OrgLogin, token: &TokenSecret) -> Self {
        let command = format!(
            "./config.sh --unattended --ephemeral --url {} --token {} && ./run.sh",
            org.html_url(),
            token.expose()
        );
        Self { app, command }
    }

    /// The application the unit is created in.
    pub fn app(&self) -> &AppName {
        &self.app
    }

    /// The startup command of the unit.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Units are never attached to a terminal or routed to; they register
    /// themselves and exit.
    pub fn attach(&self) -> bool {
        false
    }
}

impl std::fmt::Debug for ProvisionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionRequest")
            .field("app", &self.app)
            .field("command", &"<redacted>")
            .finish()
    }
}

/// A compute unit as reported back by the provisioning API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeUnit {
    pub id: ComputeUnitId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;

//! Core domain of the runner bridge.
//!
//! The bridge turns GitHub Actions `workflow_job` webhook deliveries into
//! ephemeral self-hosted runners: one compute unit per queued job, each
//! registering itself with a short-lived organization registration token and
//! exiting after one job.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed ([`TokenIssuer`], [`Provisioner`]);
//! infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype domain identifiers (`OrgLogin`, `JobId`, etc.) |
//! | [`types`] | Value types (`RegistrationToken`, `WorkflowJobEvent`, `ProvisionRequest`) |
//! | [`errors`] | Request-scoped error taxonomy |
//! | [`ports`] | Port traits implemented by infrastructure crates |
//! | [`token_cache`] | Single-slot token cache with single-flight refresh |
//! | [`dispatcher`] | Queued job → compute unit |

pub mod dispatcher;
pub mod errors;
pub mod identifiers;
pub mod ports;
pub mod token_cache;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use dispatcher::{Dispatch, Dispatcher};
pub use errors::{ConfigError, DispatchError, ProvisionError, TokenError, WebhookError};
pub use identifiers::{
    AppName, ComputeUnitId, DeliveryId, JobId, OrgLogin, RepositoryName, RunId, RunnerLabel,
};
pub use ports::{Provisioner, TokenIssuer};
pub use token_cache::TokenCache;
pub use types::{
    safety_margin, ComputeUnit, Organization, ProvisionRequest, RegistrationToken, Repository,
    Sender, TokenSecret, WorkflowAction, WorkflowJob, WorkflowJobEvent, SAFETY_MARGIN_SECS,
};

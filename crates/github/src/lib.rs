//! Runner bridge GitHub infrastructure adapter.
//!
//! Two concerns live here:
//!
//! - [`webhook`]: authenticating inbound deliveries against the shared webhook
//!   secret and decoding `workflow_job` payloads into
//!   [`bridge::WorkflowJobEvent`].
//! - [`client`]: [`GithubClient`], the [`bridge::TokenIssuer`] that exchanges an
//!   `admin:org` token for short-lived runner registration tokens.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules. Header names,
//! signature formats, REST paths, and error status mapping are handled here;
//! the [`bridge`] crate never sees them.

pub mod client;
pub mod webhook;

pub use client::{GithubClient, GithubClientConfig, DEFAULT_API_URL};
#[cfg(any(test, feature = "test-support"))]
pub use webhook::sign_sha256;
pub use webhook::{delivery_id, event_type, parse_workflow_job, SignatureValidator, WebhookSecret};

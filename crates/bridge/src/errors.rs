//! Error taxonomy for the runner bridge.
//!
//! Every error here is request-scoped: it ends one webhook delivery with a
//! status code and is never retried internally. GitHub redelivers on non-2xx
//! responses, so the returned status is the retry mechanism.
//!
//! | Error | Produced by | HTTP status |
//! |-------|-------------|-------------|
//! | [`WebhookError::MissingSignature`] | signature validation | 403 |
//! | [`WebhookError::InvalidSignature`] | signature validation | 403 |
//! | [`WebhookError::UnsupportedEventType`] | event parsing | 202 (ignored) |
//! | [`WebhookError::MalformedPayload`] | event parsing | 400 |
//! | [`DispatchError::TokenAcquisitionFailed`] | token cache | 500 |
//! | [`DispatchError::ProvisioningFailed`] | dispatcher | 500 |

use std::time::Duration;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Inbound webhook errors
// ---------------------------------------------------------------------------

/// Errors raised while authenticating and decoding an inbound delivery.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WebhookError {
    /// Neither `X-Hub-Signature-256` nor `X-Hub-Signature` was present.
    #[error("Webhook signature header is missing")]
    MissingSignature,

    /// The signature header was present but did not match the body.
    ///
    /// Also produced for signatures that cannot be decoded at all (unknown
    /// algorithm prefix, bad hex).
    #[error("Webhook signature is invalid: {reason}")]
    InvalidSignature {
        /// What about the signature was wrong. Never contains key material.
        reason: String,
    },

    /// The delivery is authentic but not a `workflow_job` event.
    ///
    /// Not a failure from GitHub's point of view; the delivery is acknowledged
    /// and dropped.
    #[error("Unsupported webhook event type '{event_type}'")]
    UnsupportedEventType {
        /// The `X-GitHub-Event` value, or an empty string if absent.
        event_type: String,
    },

    /// The delivery is authentic but its body could not be decoded.
    #[error("Malformed webhook payload: {message}")]
    MalformedPayload {
        /// Decoder error message.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Upstream API errors
// ---------------------------------------------------------------------------

/// Failure returned by a [`crate::TokenIssuer`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The credentials were rejected (missing `admin:org` scope, revoked token).
    #[error("Token issuer rejected credentials: {message}")]
    Unauthorized {
        /// Message returned by the issuer.
        message: String,
    },

    /// The issuer is rate limiting this client.
    #[error("Token issuer rate limit exceeded")]
    RateLimited {
        /// Delay suggested by the issuer, if it sent one.
        retry_after: Option<Duration>,
    },

    /// The request never produced a response (connect failure, timeout).
    #[error("Token issuer transport error: {0}")]
    Transport(String),

    /// The issuer answered with something that is not a token.
    #[error("Token issuer returned unexpected response (status {status}): {body}")]
    UnexpectedResponse {
        /// HTTP status code.
        status: u16,
        /// Response body or decode error, truncated by the producer.
        body: String,
    },
}

/// Failure returned by a [`crate::Provisioner`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProvisionError {
    /// The credentials were rejected.
    #[error("Provisioning API rejected credentials: {message}")]
    Unauthorized {
        /// Message returned by the API.
        message: String,
    },

    /// The API is rate limiting this client.
    #[error("Provisioning API rate limit exceeded")]
    RateLimited {
        /// Delay suggested by the API, if it sent one.
        retry_after: Option<Duration>,
    },

    /// The request never produced a response (connect failure, timeout).
    #[error("Provisioning API transport error: {0}")]
    Transport(String),

    /// The API answered with an error or an undecodable body.
    #[error("Provisioning API returned unexpected response (status {status}): {body}")]
    UnexpectedResponse {
        /// HTTP status code.
        status: u16,
        /// Response body or decode error, truncated by the producer.
        body: String,
    },
}

// ---------------------------------------------------------------------------
// Dispatch errors
// ---------------------------------------------------------------------------

/// Errors that end a queued-job dispatch. Both map to `500` so GitHub
/// redelivers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No usable registration token could be obtained. The stale token, if any,
    /// is never handed out instead.
    #[error("Registration token acquisition failed")]
    TokenAcquisitionFailed(#[source] TokenError),

    /// The compute unit could not be created.
    #[error("Provisioning failed")]
    ProvisioningFailed(#[source] ProvisionError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Raised while building configuration at startup. The process never starts
/// serving with an invalid configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("Required configuration '{name}' is not set")]
    Missing {
        /// Variable name.
        name: String,
    },

    /// A variable is set but cannot be used.
    #[error("Configuration '{name}' is invalid: {message}")]
    Invalid {
        /// Variable name.
        name: String,
        /// Why the value was rejected.
        message: String,
    },
}

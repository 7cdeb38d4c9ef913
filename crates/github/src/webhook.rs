//! Inbound GitHub webhook handling: signature validation and event decoding.
//!
//! Validation always happens on the raw body, before anything is parsed.
//! [`SignatureValidator::validate`] hands back the payload bytes that
//! [`parse_workflow_job`] then decodes, so the body is read from the network
//! exactly once.
//!
//! ## Headers
//!
//! | Header | Use |
//! |--------|-----|
//! | `X-Hub-Signature-256` | `sha256=<hex>` HMAC of the raw body (preferred) |
//! | `X-Hub-Signature` | `sha1=<hex>` HMAC of the raw body (legacy fallback) |
//! | `X-GitHub-Event` | Event type; only `workflow_job` is acted on |
//! | `X-GitHub-Delivery` | Delivery GUID, used for log correlation |
//!
//! Both `application/json` and `application/x-www-form-urlencoded` deliveries
//! are accepted; any other or missing `Content-Type` is rejected. For the form
//! encoding the JSON document is carried in the `payload` field and the
//! signature still covers the raw body.

use bridge::{DeliveryId, WebhookError, WorkflowJobEvent};
use bytes::Bytes;
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use http::header::CONTENT_TYPE;
use http::HeaderMap;
use sha1::Sha1;
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;
type HmacSha1 = Hmac<Sha1>;

/// `X-Hub-Signature-256`
pub const SIGNATURE_256_HEADER: &str = "x-hub-signature-256";
/// `X-Hub-Signature`
pub const SIGNATURE_SHA1_HEADER: &str = "x-hub-signature";
/// `X-GitHub-Event`
pub const EVENT_HEADER: &str = "x-github-event";
/// `X-GitHub-Delivery`
pub const DELIVERY_HEADER: &str = "x-github-delivery";

/// The only event type that is acted on.
pub const WORKFLOW_JOB_EVENT: &str = "workflow_job";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

// ---------------------------------------------------------------------------
// Secret
// ---------------------------------------------------------------------------

/// The shared secret configured on the GitHub webhook.
///
/// `Debug` never prints the key material.
#[derive(Clone)]
pub struct WebhookSecret(Vec<u8>);

impl WebhookSecret {
    /// Wraps a secret, returning `None` if it is empty. An empty secret would
    /// make every signature trivially forgeable.
    pub fn new(secret: impl Into<Vec<u8>>) -> Option<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            None
        } else {
            Some(Self(secret))
        }
    }
}

impl std::fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WebhookSecret(<redacted>)")
    }
}

/// Computes the `X-Hub-Signature-256` header value GitHub would send for
/// `body`.
#[cfg(any(test, feature = "test-support"))]
pub fn sign_sha256(secret: &WebhookSecret, body: &[u8]) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(&secret.0)
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

// ---------------------------------------------------------------------------
// Signature validation
// ---------------------------------------------------------------------------

/// Authenticates webhook deliveries against the shared secret.
#[derive(Debug, Clone)]
pub struct SignatureValidator {
    secret: WebhookSecret,
}

impl SignatureValidator {
    /// Creates a validator for `secret`.
    pub fn new(secret: WebhookSecret) -> Self {
        Self { secret }
    }

    /// Checks the delivery signature and returns the JSON payload.
    ///
    /// The MAC comparison is constant time.
    ///
    /// # Errors
    ///
    /// - [`WebhookError::MissingSignature`] if no signature header is present.
    /// - [`WebhookError::InvalidSignature`] if the signature cannot be decoded or
    ///   does not match.
    /// - [`WebhookError::MalformedPayload`] if the authentic body uses an
    ///   unsupported content type or a form body lacks the `payload` field.
    pub fn validate(&self, headers: &HeaderMap, body: &Bytes) -> Result<Bytes, WebhookError> {
        self.verify_signature(headers, body)?;
        extract_payload(headers, body)
    }

    fn verify_signature(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), WebhookError> {
        if let Some(signature) = header_str(headers, SIGNATURE_256_HEADER)? {
            let hex_sig = signature.strip_prefix("sha256=").ok_or_else(|| {
                invalid_signature("X-Hub-Signature-256 does not start with sha256=")
            })?;
            return verify_mac::<HmacSha256>(&self.secret.0, body, hex_sig);
        }

        if let Some(signature) = header_str(headers, SIGNATURE_SHA1_HEADER)? {
            let hex_sig = signature
                .strip_prefix("sha1=")
                .ok_or_else(|| invalid_signature("X-Hub-Signature does not start with sha1="))?;
            debug!("Validating delivery with legacy SHA-1 signature");
            return verify_mac::<HmacSha1>(&self.secret.0, body, hex_sig);
        }

        Err(WebhookError::MissingSignature)
    }
}

fn verify_mac<M>(key: &[u8], body: &[u8], hex_sig: &str) -> Result<(), WebhookError>
where
    M: Mac + KeyInit,
{
    let expected =
        hex::decode(hex_sig).map_err(|_| invalid_signature("invalid hex in signature"))?;

    let mut mac = <M as Mac>::new_from_slice(key)
        .map_err(|_| invalid_signature("HMAC key error"))?;
    mac.update(body);

    mac.verify_slice(&expected)
        .map_err(|_| invalid_signature("HMAC signature mismatch"))
}

fn invalid_signature(reason: &str) -> WebhookError {
    WebhookError::InvalidSignature {
        reason: reason.to_string(),
    }
}

/// Returns the header as a string, `None` if absent. A header that is present
/// but not visible ASCII is treated as an invalid signature.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, WebhookError> {
    headers
        .get(name)
        .map(|v| {
            v.to_str()
                .map_err(|_| invalid_signature("signature header is not valid ASCII"))
        })
        .transpose()
}

fn extract_payload(headers: &HeaderMap, body: &Bytes) -> Result<Bytes, WebhookError> {
    let media_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        });

    match media_type.as_deref() {
        Some(JSON_CONTENT_TYPE) => Ok(body.clone()),
        Some(FORM_CONTENT_TYPE) => url::form_urlencoded::parse(body)
            .find(|(key, _)| key == "payload")
            .map(|(_, value)| Bytes::from(value.into_owned()))
            .ok_or_else(|| WebhookError::MalformedPayload {
                message: "form-encoded delivery has no payload field".to_string(),
            }),
        None | Some("") => Err(WebhookError::MalformedPayload {
            message: "delivery has no content type".to_string(),
        }),
        Some(other) => Err(WebhookError::MalformedPayload {
            message: format!("unsupported content type '{other}'"),
        }),
    }
}

// ---------------------------------------------------------------------------
// Event parsing
// ---------------------------------------------------------------------------

/// The `X-GitHub-Event` value, if present and readable.
pub fn event_type(headers: &HeaderMap) -> Option<&str> {
    headers.get(EVENT_HEADER).and_then(|v| v.to_str().ok())
}

/// The `X-GitHub-Delivery` value, if present and readable.
pub fn delivery_id(headers: &HeaderMap) -> Option<DeliveryId> {
    headers
        .get(DELIVERY_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| DeliveryId::new(v))
}

/// Decodes an authenticated payload into a [`WorkflowJobEvent`].
///
/// # Errors
///
/// - [`WebhookError::UnsupportedEventType`] if `X-GitHub-Event` is absent or
///   not `workflow_job` (including `ping`).
/// - [`WebhookError::MalformedPayload`] if the payload is not a valid
///   `workflow_job` document.
pub fn parse_workflow_job(
    headers: &HeaderMap,
    payload: &[u8],
) -> Result<WorkflowJobEvent, WebhookError> {
    let event = event_type(headers).unwrap_or_default();
    if event != WORKFLOW_JOB_EVENT {
        return Err(WebhookError::UnsupportedEventType {
            event_type: event.to_string(),
        });
    }

    serde_json::from_slice(payload).map_err(|e| WebhookError::MalformedPayload {
        message: e.to_string(),
    })
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;

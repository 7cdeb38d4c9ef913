//! The webhook route and its middleware stack.
//!
//! ```text
//! TraceLayer (access log) -> timeout (503) -> POST /webhook
//!                                          -> anything else: 404
//! ```
//!
//! Response statuses:
//!
//! | Outcome | Status |
//! |---------|--------|
//! | Job dispatched, or action ignored | 200 |
//! | Event type other than `workflow_job` | 202 |
//! | Undecodable payload | 400 |
//! | Missing or wrong signature | 403 |
//! | Unknown path or method | 404 |
//! | Token or provisioning failure | 500 |
//! | Handler exceeded the request timeout | 503 |
//!
//! Error bodies are the status reason phrase. Successful responses are empty.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use bridge::{Dispatch, DispatchError, Dispatcher, WebhookError};
use bytes::Bytes;
use github::SignatureValidator;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::{field, info, instrument, warn, Level, Span};

/// Path GitHub delivers webhooks to.
pub const WEBHOOK_PATH: &str = "/webhook";

/// Shared state for the webhook handler.
///
/// Cloned per request; the dispatcher (and with it the token cache) is shared.
#[derive(Clone, Debug)]
pub struct WebhookState {
    validator: SignatureValidator,
    dispatcher: Arc<Dispatcher>,
}

impl WebhookState {
    /// Creates handler state from its two collaborators.
    pub fn new(validator: SignatureValidator, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            validator,
            dispatcher,
        }
    }
}

/// Builds the complete router, middleware included.
///
/// Requests still running after `request_timeout` are dropped, which cancels
/// any outbound call they are waiting on, and answered with `503`.
pub fn router(state: WebhookState, request_timeout: Duration) -> Router {
    Router::new()
        .route(
            WEBHOOK_PATH,
            post(receive_webhook).fallback(not_found),
        )
        .fallback(not_found)
        .with_state(state)
        .layer(middleware::from_fn_with_state(
            request_timeout,
            enforce_timeout,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Millis),
                ),
        )
}

/// A response carrying only a status and its reason phrase.
fn status_response(status: StatusCode) -> Response {
    (status, status.canonical_reason().unwrap_or_default()).into_response()
}

async fn not_found() -> Response {
    status_response(StatusCode::NOT_FOUND)
}

async fn enforce_timeout(
    State(timeout): State<Duration>,
    request: Request,
    next: Next,
) -> Response {
    match tokio::time::timeout(timeout, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "Request timed out");
            status_response(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

#[instrument(skip_all, fields(delivery_id = field::Empty, event = field::Empty))]
async fn receive_webhook(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let span = Span::current();
    if let Some(delivery) = github::delivery_id(&headers) {
        span.record("delivery_id", delivery.as_str());
    }
    if let Some(event) = github::event_type(&headers) {
        span.record("event", event);
    }

    let payload = match state.validator.validate(&headers, &body) {
        Ok(payload) => payload,
        Err(e) => return webhook_error_response(e),
    };

    let event = match github::parse_workflow_job(&headers, &payload) {
        Ok(event) => event,
        Err(e) => return webhook_error_response(e),
    };

    match state.dispatcher.dispatch(&event).await {
        Ok(Dispatch::Provisioned(_))
        | Ok(Dispatch::Ignored { .. })
        | Ok(Dispatch::ForeignOrganization { .. }) => StatusCode::OK.into_response(),
        Err(e) => dispatch_error_response(e),
    }
}

fn webhook_error_response(error: WebhookError) -> Response {
    match &error {
        WebhookError::UnsupportedEventType { event_type } => {
            info!(event_type = %event_type, "Ignoring unsupported webhook event type");
            StatusCode::ACCEPTED.into_response()
        }
        WebhookError::MissingSignature | WebhookError::InvalidSignature { .. } => {
            warn!(error = %error, "Failed to validate webhook");
            status_response(StatusCode::FORBIDDEN)
        }
        WebhookError::MalformedPayload { .. } => {
            warn!(error = %error, "Failed to parse webhook");
            status_response(StatusCode::BAD_REQUEST)
        }
    }
}

fn dispatch_error_response(error: DispatchError) -> Response {
    match &error {
        DispatchError::TokenAcquisitionFailed(source) => {
            warn!(error = %source, "Error creating registration token");
        }
        DispatchError::ProvisioningFailed(source) => {
            warn!(error = %source, "Error creating compute unit");
        }
    }
    status_response(StatusCode::INTERNAL_SERVER_ERROR)
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;

//! Runner bridge HTTP front door.
//!
//! - [`routes`]: the router. `POST /webhook` authenticates the delivery,
//!   decodes the `workflow_job` payload, and hands it to the
//!   [`bridge::Dispatcher`]. Every request passes through an access log and a
//!   request timeout. Anything else is `404`.
//! - [`server`]: the accept loop, per-connection header read and idle limits,
//!   and the graceful shutdown sequence driven by a
//!   [`tokio_util::sync::CancellationToken`].
//!
//! ## Deployment Scenarios
//!
//! | Scenario | Notes |
//! |----------|-------|
//! | Heroku web dyno | Binds `0.0.0.0:$PORT`; the router terminates TLS |
//! | Development | Forward deliveries with smee.io to `http://localhost:1123/webhook` |
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Status codes, middleware, and socket handling live
//! here. The [`bridge`] crate sees only [`bridge::WorkflowJobEvent`].

pub mod routes;
pub mod server;

pub use routes::{router, WebhookState, WEBHOOK_PATH};
pub use server::{
    LifecycleState, ServeError, Server, ServerTimeouts, DEFAULT_HEADER_READ_TIMEOUT,
    DEFAULT_IDLE_TIMEOUT, DEFAULT_SHUTDOWN_TIMEOUT,
};

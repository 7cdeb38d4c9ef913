//! Server lifecycle: bind, serve, drain, stop.
//!
//! ```text
//! Starting --bind--> Serving --shutdown token or listener error--> Draining --drained or deadline--> Stopped
//! ```
//!
//! The server owns its accept loop and every connection task. Draining closes
//! the listener, asks each connection to finish its current request and close,
//! and waits. Connections still open when the shutdown deadline passes are
//! aborted, which drops their in-flight handlers.
//!
//! Each connection is bounded on its own: request headers must arrive within
//! the header read timeout, and a keep-alive connection with no request in
//! flight is closed after the idle timeout. Request bodies and handlers are
//! bounded by the router's request timeout.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::{TokioIo, TokioTimer};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tower::Service;
use tracing::{debug, error, info, instrument, warn};

/// Default bound on how long draining may take.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(15);
/// Default bound on receiving a complete request head.
pub const DEFAULT_HEADER_READ_TIMEOUT: Duration = Duration::from_secs(15);
/// Default bound on an idle keep-alive connection.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

// While draining, a connection with nothing in flight for this long is closed
// even if it never sent a request.
const DRAIN_IDLE_GRACE: Duration = Duration::from_millis(500);

/// Where the server is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Listener bound, not yet accepting.
    Starting,
    /// Accepting and serving requests.
    Serving,
    /// No longer accepting; waiting for in-flight requests.
    Draining,
    /// Finished. The listener and every connection are closed.
    Stopped,
}

/// Connection-level time limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerTimeouts {
    /// How long draining may take before connections are aborted.
    pub shutdown: Duration,
    /// How long a client may take to send a complete request head.
    pub header_read: Duration,
    /// How long a connection may stay open with no request in flight.
    pub idle: Duration,
}

impl Default for ServerTimeouts {
    fn default() -> Self {
        Self {
            shutdown: DEFAULT_SHUTDOWN_TIMEOUT,
            header_read: DEFAULT_HEADER_READ_TIMEOUT,
            idle: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Fatal server errors. Everything else is request-scoped.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The listen address could not be bound.
    #[error("Failed to bind {addr}")]
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The accept loop failed for a reason other than shutdown.
    #[error("Listener failed")]
    Listener(#[source] std::io::Error),
}

/// A bound, not yet running HTTP server.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    router: Router,
    timeouts: ServerTimeouts,
    state: watch::Sender<LifecycleState>,
}

impl Server {
    /// Binds `addr`. Use port `0` to let the OS choose.
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Bind`] if the address is unavailable.
    pub async fn bind(
        addr: SocketAddr,
        router: Router,
        timeouts: ServerTimeouts,
    ) -> Result<Self, ServeError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServeError::Bind { addr, source })?;
        let (state, _) = watch::channel(LifecycleState::Starting);
        Ok(Self {
            listener,
            router,
            timeouts,
            state,
        })
    }

    /// The address actually bound.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the socket address cannot be read.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Subscribes to lifecycle transitions.
    pub fn lifecycle(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Serves until `shutdown` is cancelled or the listener fails, then
    /// drains.
    ///
    /// Returns once every connection has closed, either cleanly or because
    /// the shutdown deadline passed and it was aborted.
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Listener`] if accepting fails for a reason other
    /// than a single broken connection. In-flight requests are still drained
    /// first.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ServeError> {
        let Self {
            listener,
            router,
            timeouts,
            state,
        } = self;

        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "Listening for webhooks");
        }
        state.send_replace(LifecycleState::Serving);

        let drain = CancellationToken::new();
        let mut connections = JoinSet::new();

        let outcome = loop {
            tokio::select! {
                () = shutdown.cancelled() => break Ok(()),
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        connections.spawn(serve_connection(
                            stream,
                            peer,
                            router.clone(),
                            timeouts,
                            drain.clone(),
                        ));
                    }
                    Err(e) if is_connection_error(&e) => {
                        debug!(error = %e, "Connection failed before it was accepted");
                    }
                    Err(e) => break Err(ServeError::Listener(e)),
                },
            }
        };

        drop(listener);
        state.send_replace(LifecycleState::Draining);
        match &outcome {
            Ok(()) => info!(
                open_connections = connections.len(),
                "Shutting down; draining in-flight requests"
            ),
            Err(e) => error!(
                error = %e,
                open_connections = connections.len(),
                "Listener failed; draining in-flight requests"
            ),
        }
        drain.cancel();

        let drained = tokio::time::timeout(timeouts.shutdown, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                open_connections = connections.len(),
                timeout_secs = timeouts.shutdown.as_secs_f64(),
                "Shutdown deadline exceeded; closing remaining connections"
            );
            connections.shutdown().await;
        }

        state.send_replace(LifecycleState::Stopped);
        info!("Server stopped");
        outcome
    }
}

/// Errors that concern one connection, not the listening socket.
fn is_connection_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::Interrupted
    )
}

#[instrument(name = "connection", skip_all, fields(peer = %peer))]
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    router: Router,
    timeouts: ServerTimeouts,
    drain: CancellationToken,
) {
    let activity = Arc::new(Activity::new());

    let service = {
        let activity = activity.clone();
        service_fn(move |request: Request<Incoming>| {
            let busy = activity.begin();
            let mut router = router.clone();
            async move {
                let response = router.call(request).await;
                drop(busy);
                response
            }
        })
    };

    let mut http = http1::Builder::new();
    http.timer(TokioTimer::new())
        .header_read_timeout(timeouts.header_read);
    let connection = http.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(connection);

    let mut draining = false;
    loop {
        let idle = if draining {
            DRAIN_IDLE_GRACE.min(timeouts.idle)
        } else {
            timeouts.idle
        };
        tokio::select! {
            result = connection.as_mut() => {
                if let Err(e) = result {
                    debug!(error = %e, "Connection closed with error");
                }
                return;
            }
            () = drain.cancelled(), if !draining => {
                draining = true;
                connection.as_mut().graceful_shutdown();
            }
            () = activity.idle_for(idle) => {
                debug!(idle_secs = idle.as_secs_f64(), "Closing idle connection");
                return;
            }
        }
    }
}

/// Request bookkeeping for one connection.
#[derive(Debug)]
struct Activity {
    in_flight: AtomicUsize,
    last_seen: Mutex<Instant>,
}

impl Activity {
    fn new() -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            last_seen: Mutex::new(Instant::now()),
        }
    }

    fn begin(self: &Arc<Self>) -> Busy {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.touch();
        Busy(self.clone())
    }

    fn touch(&self) {
        if let Ok(mut last_seen) = self.last_seen.lock() {
            *last_seen = Instant::now();
        }
    }

    fn last_seen(&self) -> Instant {
        self.last_seen
            .lock()
            .map(|last_seen| *last_seen)
            .unwrap_or_else(|_| Instant::now())
    }

    /// Resolves once no request has been in flight for `idle`.
    async fn idle_for(&self, idle: Duration) {
        loop {
            if self.in_flight.load(Ordering::SeqCst) > 0 {
                tokio::time::sleep(idle).await;
                continue;
            }
            let deadline = self.last_seen() + idle;
            if deadline <= Instant::now() {
                return;
            }
            tokio::time::sleep_until(deadline).await;
        }
    }
}

/// Marks a request in flight until dropped.
struct Busy(Arc<Activity>);

impl Drop for Busy {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.0.touch();
    }
}

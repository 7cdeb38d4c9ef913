//! Runner bridge entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Load configuration** from the environment ([`config::Config`]).
//! 2. **Wire observability**: `tracing-subscriber` with a text or JSON layer,
//!    plus an OpenTelemetry OTLP exporter when one is configured.
//! 3. **Construct infrastructure**: [`github::GithubClient`] as the
//!    [`bridge::TokenIssuer`], [`heroku::HerokuClient`] as the
//!    [`bridge::Provisioner`], and inject both into the [`bridge::Dispatcher`].
//! 4. **Serve** the webhook router until SIGINT or SIGTERM, then drain.
//!
//! Any fatal error exits with a non-zero status.

mod config;
mod telemetry;

use std::sync::Arc;

use anyhow::Context;
use bridge::{Dispatcher, TokenCache};
use github::{GithubClient, GithubClientConfig, SignatureValidator};
use heroku::{HerokuClient, HerokuClientConfig};
use listener::{router, Server, ServerTimeouts, WebhookState};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::telemetry::Telemetry;

const USER_AGENT: &str = concat!("runner-bridge/", env!("CARGO_PKG_VERSION"));

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;
    let telemetry = Telemetry::init(config.log_format, config.otlp_endpoint.as_deref())?;

    let result = run(config).await;
    if let Err(e) = &result {
        error!(error = ?e, "Runner bridge failed");
    }

    telemetry.shutdown();
    result
}

async fn run(config: Config) -> anyhow::Result<()> {
    info!(
        org = %config.org,
        app = %config.heroku_app,
        port = config.port,
        "Starting runner bridge"
    );
    let listen_addr = config.listen_addr();

    let github = GithubClient::new(GithubClientConfig {
        api_url: config.github_api_url,
        token: config.github_token,
        timeout: config.upstream_timeout,
        user_agent: USER_AGENT.to_string(),
    })
    .context("failed to build GitHub client")?;

    let heroku = HerokuClient::new(HerokuClientConfig {
        api_url: config.heroku_api_url,
        login: config.heroku_login,
        api_key: config.heroku_token,
        timeout: config.upstream_timeout,
        user_agent: USER_AGENT.to_string(),
    })
    .context("failed to build Heroku client")?;

    let tokens = Arc::new(TokenCache::new(Arc::new(github)));
    let dispatcher = Dispatcher::new(config.org, config.heroku_app, tokens, Arc::new(heroku));
    let state = WebhookState::new(
        SignatureValidator::new(config.webhook_secret),
        Arc::new(dispatcher),
    );

    let server = Server::bind(
        listen_addr,
        router(state, config.request_timeout),
        ServerTimeouts {
            shutdown: config.shutdown_timeout,
            header_read: config.header_read_timeout,
            idle: config.idle_timeout,
        },
    )
    .await?;

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    server.run(shutdown).await?;
    Ok(())
}

/// Resolves on SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT"),
        () = terminate => info!("Received SIGTERM"),
    }
}

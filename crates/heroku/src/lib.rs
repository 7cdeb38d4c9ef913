//! Runner bridge Heroku provisioning adapter.
//!
//! Implements the [`bridge::Provisioner`] trait by creating one-off dynos
//! through the Heroku Platform API (`POST /apps/{app}/dynos`). Each dyno runs
//! the runner bootstrap command detached, registers itself, executes one job,
//! and exits.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, authentication, request formatting, and
//! status mapping live here. The [`bridge`] crate sees only
//! [`bridge::Provisioner`].

use std::time::Duration;

use async_trait::async_trait;
use bridge::{ComputeUnit, ProvisionError, ProvisionRequest, Provisioner, TokenSecret};
use reqwest::header::{HeaderMap, ACCEPT, RETRY_AFTER};
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, instrument};

/// Default Platform API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.heroku.com";

const MEDIA_TYPE: &str = "application/vnd.heroku+json; version=3";
const MAX_ERROR_BODY: usize = 512;

/// Connection settings for [`HerokuClient`].
#[derive(Debug, Clone)]
pub struct HerokuClientConfig {
    /// Platform API base URL.
    pub api_url: String,
    /// Account login (email) used for basic authentication.
    pub login: String,
    /// API key used as the basic authentication password.
    pub api_key: TokenSecret,
    /// Upper bound for one request, connect through body.
    pub timeout: Duration,
    /// `User-Agent` header.
    pub user_agent: String,
}

/// Dyno provisioner backed by the Heroku Platform API.
#[derive(Debug, Clone)]
pub struct HerokuClient {
    http: reqwest::Client,
    api_url: String,
    login: String,
    api_key: TokenSecret,
}

#[derive(Debug, Serialize)]
struct DynoCreate<'a> {
    command: &'a str,
    attach: bool,
}

impl HerokuClient {
    /// Builds a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`reqwest::Error`] if the TLS backend cannot be
    /// initialised.
    pub fn new(config: HerokuClientConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()?;
        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            login: config.login,
            api_key: config.api_key,
        })
    }
}

#[async_trait]
impl Provisioner for HerokuClient {
    #[instrument(skip(self, request), fields(app = %request.app()))]
    async fn create_compute_unit(
        &self,
        request: &ProvisionRequest,
    ) -> Result<ComputeUnit, ProvisionError> {
        let url = format!("{}/apps/{}/dynos", self.api_url, request.app());
        let body = DynoCreate {
            command: request.command(),
            attach: request.attach(),
        };

        let response = self
            .http
            .post(url)
            .basic_auth(&self.login, Some(self.api_key.expose()))
            .header(ACCEPT, MEDIA_TYPE)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProvisionError::Transport(e.to_string()))?;

        let status = response.status();
        debug!(status = status.as_u16(), "Dyno create response");

        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &headers, body));
        }

        response
            .json::<ComputeUnit>()
            .await
            .map_err(|e| ProvisionError::UnexpectedResponse {
                status: status.as_u16(),
                body: e.to_string(),
            })
    }
}

fn classify_error(status: StatusCode, headers: &HeaderMap, mut body: String) -> ProvisionError {
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }

    match status {
        StatusCode::TOO_MANY_REQUESTS => ProvisionError::RateLimited {
            retry_after: headers
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProvisionError::Unauthorized { message: body }
        }
        _ => ProvisionError::UnexpectedResponse {
            status: status.as_u16(),
            body,
        },
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

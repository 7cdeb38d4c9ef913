//! GitHub REST client for organization runner registration tokens.
//!
//! Implements [`bridge::TokenIssuer`] with a single call:
//! `POST /orgs/{org}/actions/runners/registration-token`. The personal access
//! token used to authenticate needs the `admin:org` scope.

use std::time::Duration;

use async_trait::async_trait;
use bridge::{OrgLogin, RegistrationToken, TokenError, TokenIssuer, TokenSecret};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, ACCEPT, RETRY_AFTER};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, instrument};

/// Default GitHub REST endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";
const MEDIA_TYPE: &str = "application/vnd.github+json";
const MAX_ERROR_BODY: usize = 512;

/// Connection settings for [`GithubClient`].
#[derive(Debug, Clone)]
pub struct GithubClientConfig {
    /// REST base URL, without a trailing slash.
    pub api_url: String,
    /// Token sent as `Authorization: Bearer`.
    pub token: TokenSecret,
    /// Upper bound for one request, connect through body.
    pub timeout: Duration,
    /// `User-Agent` header; GitHub rejects requests without one.
    pub user_agent: String,
}

/// Registration token issuer backed by the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    api_url: String,
    token: TokenSecret,
}

#[derive(Debug, Deserialize)]
struct RegistrationTokenResponse {
    token: TokenSecret,
    expires_at: DateTime<Utc>,
}

impl GithubClient {
    /// Builds a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`reqwest::Error`] if the TLS backend cannot be
    /// initialised.
    pub fn new(config: GithubClientConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()?;
        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token,
        })
    }

    fn registration_token_url(&self, org: &OrgLogin) -> String {
        format!(
            "{}/orgs/{}/actions/runners/registration-token",
            self.api_url, org
        )
    }
}

#[async_trait]
impl TokenIssuer for GithubClient {
    #[instrument(skip(self), fields(org = %org))]
    async fn create_registration_token(
        &self,
        org: &OrgLogin,
    ) -> Result<RegistrationToken, TokenError> {
        let response = self
            .http
            .post(self.registration_token_url(org))
            .bearer_auth(self.token.expose())
            .header(ACCEPT, MEDIA_TYPE)
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .await
            .map_err(|e| TokenError::Transport(e.to_string()))?;

        let status = response.status();
        debug!(status = status.as_u16(), "Registration token response");

        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &headers, body));
        }

        let body: RegistrationTokenResponse =
            response
                .json()
                .await
                .map_err(|e| TokenError::UnexpectedResponse {
                    status: status.as_u16(),
                    body: e.to_string(),
                })?;

        Ok(RegistrationToken::new(
            org.clone(),
            body.token,
            body.expires_at,
        ))
    }
}

fn classify_error(status: StatusCode, headers: &HeaderMap, body: String) -> TokenError {
    let rate_limited = status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN
            && headers
                .get("x-ratelimit-remaining")
                .and_then(|v| v.to_str().ok())
                == Some("0"));

    if rate_limited {
        return TokenError::RateLimited {
            retry_after: retry_after(headers),
        };
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TokenError::Unauthorized {
            message: truncate(body),
        },
        _ => TokenError::UnexpectedResponse {
            status: status.as_u16(),
            body: truncate(body),
        },
    }
}

/// Reads `Retry-After` in its delay-seconds form.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

//! Process configuration, read once from the environment at startup.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use bridge::{AppName, ConfigError, OrgLogin, TokenSecret};
use github::WebhookSecret;

const DEFAULT_PORT: u16 = 1123;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 15;
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;
const DEFAULT_HEADER_READ_TIMEOUT_SECS: u64 = 15;
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 60;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Everything the composition root needs to wire the service.
#[derive(Debug, Clone)]
pub struct Config {
    pub org: OrgLogin,
    pub github_token: TokenSecret,
    pub webhook_secret: WebhookSecret,
    pub github_api_url: String,
    pub heroku_app: AppName,
    pub heroku_login: String,
    pub heroku_token: TokenSecret,
    pub heroku_api_url: String,
    pub port: u16,
    pub request_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub upstream_timeout: Duration,
    pub header_read_timeout: Duration,
    pub idle_timeout: Duration,
    pub log_format: LogFormat,
    pub otlp_endpoint: Option<String>,
}

impl Config {
    /// Reads the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first missing or invalid variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first missing or invalid variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &'static str| {
            get(name).ok_or(ConfigError::Missing {
                name: name.to_string(),
            })
        };

        let org = OrgLogin::new(require("GITHUB_ORG")?.trim()).ok_or(ConfigError::Missing {
            name: "GITHUB_ORG".to_string(),
        })?;
        let github_token = TokenSecret::new(require("GITHUB_TOKEN")?);
        let webhook_secret =
            WebhookSecret::new(require("GITHUB_SECRET")?).ok_or(ConfigError::Missing {
                name: "GITHUB_SECRET".to_string(),
            })?;
        let heroku_app =
            AppName::new(require("X_HEROKU_APP")?.trim()).ok_or(ConfigError::Missing {
                name: "X_HEROKU_APP".to_string(),
            })?;
        let heroku_login = require("X_HEROKU_LOGIN")?;
        let heroku_token = TokenSecret::new(require("X_HEROKU_TOKEN")?);

        let port = match get("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: "PORT".to_string(),
                message: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let log_format = match get("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT".to_string(),
                    message: format!("expected `json` or `text`, got `{other}`"),
                })
            }
        };

        Ok(Self {
            org,
            github_token,
            webhook_secret,
            github_api_url: api_url(&get, "GITHUB_API_URL", github::DEFAULT_API_URL)?,
            heroku_app,
            heroku_login,
            heroku_token,
            heroku_api_url: api_url(&get, "HEROKU_API_URL", heroku::DEFAULT_API_URL)?,
            port,
            request_timeout: seconds(&get, "REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            shutdown_timeout: seconds(
                &get,
                "SHUTDOWN_TIMEOUT_SECS",
                DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            )?,
            upstream_timeout: seconds(
                &get,
                "UPSTREAM_TIMEOUT_SECS",
                DEFAULT_UPSTREAM_TIMEOUT_SECS,
            )?,
            header_read_timeout: seconds(
                &get,
                "HEADER_READ_TIMEOUT_SECS",
                DEFAULT_HEADER_READ_TIMEOUT_SECS,
            )?,
            idle_timeout: seconds(&get, "IDLE_TIMEOUT_SECS", DEFAULT_IDLE_TIMEOUT_SECS)?,
            log_format,
            otlp_endpoint: get("OTEL_EXPORTER_OTLP_ENDPOINT"),
        })
    }

    /// `0.0.0.0:<port>`.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}

fn seconds(
    get: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let Some(raw) = get(name) else {
        return Ok(Duration::from_secs(default));
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            name: name.to_string(),
            message: "must be greater than zero".to_string(),
        }),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(ConfigError::Invalid {
            name: name.to_string(),
            message: e.to_string(),
        }),
    }
}

fn api_url(
    get: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: &str,
) -> Result<String, ConfigError> {
    let Some(raw) = get(name) else {
        return Ok(default.to_string());
    };
    let parsed = url::Url::parse(raw.trim()).map_err(|e| ConfigError::Invalid {
        name: name.to_string(),
        message: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid {
            name: name.to_string(),
            message: format!("unsupported scheme `{}`", parsed.scheme()),
        });
    }
    Ok(raw.trim().trim_end_matches('/').to_string())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

//! Gateway configuration and its resolution from the environment and host.

use std::time::Duration;

use reqwest::Url;

use crate::error::{CloudBufferError, Result};
use crate::host::Host;

/// Request timeout applied when nothing else is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

pub const URL_ENV: &str = "CLOUD_BUFFER_URL";
pub const API_KEY_ENV: &str = "CLOUD_BUFFER_API_KEY";
pub const TIMEOUT_ENV: &str = "CLOUD_BUFFER_TIMEOUT_MS";

pub const URL_HOST_VAR: &str = "vim_cloud_buffer_url";
pub const API_KEY_HOST_VAR: &str = "vim_cloud_buffer_api_key";
pub const TIMEOUT_HOST_VAR: &str = "vim_cloud_buffer_timeout_ms";

/// Connection settings for one resource collection endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Collection endpoint, e.g. `https://api.example.com/1/databases/vim/collections/buffers`.
    pub base_url: String,
    /// Sent as the `apiKey` query parameter on every request.
    pub api_key: String,
    /// `None` leaves the call blocking until the transport itself gives up.
    pub timeout: Option<Duration>,
}

impl GatewayConfig {
    /// Config with the default 5 s timeout.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve from the process environment, falling back to host variables.
    pub fn resolve<H: Host + ?Sized>(host: &H) -> Result<Self> {
        Self::resolve_with(|name| std::env::var(name).ok(), host)
    }

    /// Resolve using `env` for environment lookups.
    ///
    /// Each setting is taken from the environment first and from the host
    /// only when the environment has no (non-empty) value. The host is not
    /// queried for a setting the environment already supplies. A missing URL
    /// or API key fails here, before any request can be attempted.
    pub fn resolve_with<F, H>(env: F, host: &H) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
        H: Host + ?Sized,
    {
        let lookup = |env_var: &str, host_var: &str| -> Result<Option<String>> {
            if let Some(value) = env(env_var).filter(|v| !v.is_empty()) {
                return Ok(Some(value));
            }
            Ok(host.setting(host_var)?.filter(|v| !v.is_empty()))
        };

        let base_url = lookup(URL_ENV, URL_HOST_VAR)?.ok_or(
            CloudBufferError::ConfigurationMissing {
                setting: "URL",
                env_var: URL_ENV,
                host_var: URL_HOST_VAR,
            },
        )?;
        let api_key = lookup(API_KEY_ENV, API_KEY_HOST_VAR)?.ok_or(
            CloudBufferError::ConfigurationMissing {
                setting: "API key",
                env_var: API_KEY_ENV,
                host_var: API_KEY_HOST_VAR,
            },
        )?;
        let timeout = match lookup(TIMEOUT_ENV, TIMEOUT_HOST_VAR)? {
            Some(raw) => parse_timeout_ms(&raw)?,
            None => Some(DEFAULT_TIMEOUT),
        };

        let config = Self {
            base_url,
            api_key,
            timeout,
        };
        config.endpoint()?;
        Ok(config)
    }

    /// The base URL parsed as an absolute URL.
    pub fn endpoint(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url).map_err(|e| CloudBufferError::InvalidConfiguration {
            setting: "URL",
            detail: format!("{}: {e}", self.base_url),
        })?;
        if url.cannot_be_a_base() {
            return Err(CloudBufferError::InvalidConfiguration {
                setting: "URL",
                detail: format!("{} cannot hold a resource path", self.base_url),
            });
        }
        Ok(url)
    }
}

/// Milliseconds as text; `0` disables the timeout.
pub fn parse_timeout_ms(raw: &str) -> Result<Option<Duration>> {
    let ms: u64 = raw
        .trim()
        .parse()
        .map_err(|e| CloudBufferError::InvalidConfiguration {
            setting: "timeout",
            detail: format!("{raw:?} is not a number of milliseconds: {e}"),
        })?;
    Ok((ms > 0).then(|| Duration::from_millis(ms)))
}

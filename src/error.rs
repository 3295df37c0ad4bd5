//! Crate-level error type.
//!
//! Every fallible operation in the crate returns [`CloudBufferError`]. The
//! variants mirror the failure kinds a host can observe: missing or broken
//! configuration, transport and HTTP status failures, operations that are
//! reserved but not built, and problems talking to the host itself.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CloudBufferError>;

#[derive(Debug, Error)]
pub enum CloudBufferError {
    /// Neither the environment nor the host supplies a required setting.
    #[error("{setting} is not configured: set ${env_var} or g:{host_var}")]
    ConfigurationMissing {
        setting: &'static str,
        env_var: &'static str,
        host_var: &'static str,
    },

    /// A setting is present but unusable (bad URL, non-numeric timeout).
    #[error("invalid {setting}: {detail}")]
    InvalidConfiguration { setting: &'static str, detail: String },

    /// The request never produced an HTTP response (DNS, connect, timeout, body read).
    ///
    /// `url` has its `apiKey` value masked and `source` carries no URL, so the
    /// text is safe to hand to the host or the log.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-2xx status.
    #[error("{status} {reason}")]
    HttpStatus {
        status: u16,
        reason: String,
        body: String,
    },

    #[error("{operation} is not implemented")]
    UnsupportedOperation { operation: &'static str },

    /// The host handed over a payload or command this crate cannot use.
    #[error("invalid request: {detail}")]
    InvalidRequest { detail: String },

    /// Reading from or writing to the host channel failed.
    #[error("host channel error: {detail}")]
    Host { detail: String },
}

impl CloudBufferError {
    /// The most specific human-readable message for the host error slot.
    ///
    /// For an HTTP status failure whose body is a JSON object carrying a
    /// string `message` field, that field is returned verbatim. Every other
    /// failure (including status failures with non-JSON bodies) falls back to
    /// the error's own display text.
    pub fn host_message(&self) -> String {
        if let CloudBufferError::HttpStatus { body, .. } = self {
            if let Some(message) = serde_json::from_str::<serde_json::Value>(body)
                .ok()
                .as_ref()
                .and_then(|v| v.get("message"))
                .and_then(|m| m.as_str())
            {
                return message.to_string();
            }
        }
        self.to_string()
    }

    /// HTTP status carried by the failure, when there was a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            CloudBufferError::HttpStatus { status, .. } => Some(*status),
            CloudBufferError::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub(crate) fn host(detail: impl std::fmt::Display) -> Self {
        CloudBufferError::Host {
            detail: detail.to_string(),
        }
    }
}

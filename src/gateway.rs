//! REST CRUD client for one cloud-buffer collection endpoint.
//!
//! Every operation issues exactly one blocking HTTP request and hands the raw
//! response body back as a `String`; nothing here parses JSON responses.

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::GatewayConfig;
use crate::error::{CloudBufferError, Result};

const JSON: &str = "application/json";

/// Query parameter carrying the API key.
pub const API_KEY_PARAM: &str = "apiKey";

/// Blocking client for `<base_url>` and `<base_url>/<id>`.
#[derive(Debug, Clone)]
pub struct Gateway {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl Gateway {
    /// Build the HTTP client. No request is sent.
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let endpoint = config.endpoint()?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CloudBufferError::InvalidConfiguration {
                setting: "HTTP client",
                detail: e.to_string(),
            })?;
        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
        })
    }

    /// POST a new document.
    pub fn add(&self, data: &Value) -> Result<String> {
        let req = self.request(Method::POST, self.endpoint.clone(), &Map::new()).json(data);
        self.send(req)
    }

    /// PUT `data` over the document at `id`.
    pub fn update(&self, id: &str, data: &Value) -> Result<String> {
        let req = self.request(Method::PUT, self.member(id)?, &Map::new()).json(data);
        self.send(req)
    }

    pub fn get(&self, id: &str) -> Result<String> {
        let req = self.request(Method::GET, self.member(id)?, &Map::new());
        self.send(req)
    }

    /// GET the collection, with `filter` merged into the query string.
    pub fn list(&self, filter: &Map<String, Value>) -> Result<String> {
        let req = self.request(Method::GET, self.endpoint.clone(), filter);
        self.send(req)
    }

    pub fn remove(&self, id: &str) -> Result<String> {
        let req = self.request(Method::DELETE, self.member(id)?, &Map::new());
        self.send(req)
    }

    /// Reserved for structured queries; always fails without touching the network.
    pub fn find(&self) -> Result<String> {
        Err(CloudBufferError::UnsupportedOperation { operation: "find" })
    }

    /// Query parameters for a request; every operation except `list` passes
    /// an empty filter.
    ///
    /// Filter entries come first and `apiKey` last, so a filter can add
    /// parameters but never replace the key. Strings travel verbatim, other
    /// scalars and nested values as their JSON text; `null` entries are
    /// dropped.
    pub fn query_params(&self, filter: &Map<String, Value>) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = filter
            .iter()
            .filter(|(name, _)| name.as_str() != API_KEY_PARAM)
            .filter_map(|(name, value)| {
                let text = match value {
                    Value::Null => return None,
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some((name.clone(), text))
            })
            .collect();
        params.push((API_KEY_PARAM.to_string(), self.api_key.clone()));
        params
    }

    fn member(&self, id: &str) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| CloudBufferError::InvalidConfiguration {
                setting: "URL",
                detail: format!("{} cannot hold a resource path", self.endpoint),
            })?
            .pop_if_empty()
            .push(id);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, filter: &Map<String, Value>) -> RequestBuilder {
        self.client
            .request(method, url)
            .query(&self.query_params(filter))
            .header(ACCEPT, JSON)
            .header(CONTENT_TYPE, JSON)
    }

    fn send(&self, req: RequestBuilder) -> Result<String> {
        let req = req.build().map_err(|source| CloudBufferError::Transport {
            url: redact(&self.endpoint),
            source: source.without_url(),
        })?;
        let method = req.method().clone();
        let url = redact(req.url());
        debug!(%method, %url, "cloud-buffer request");

        let resp = self
            .client
            .execute(req)
            .map_err(|source| CloudBufferError::Transport {
                url: url.clone(),
                source: source.without_url(),
            })?;
        let status = resp.status();
        let body = resp.text();
        debug!(%method, status = status.as_u16(), "cloud-buffer response");

        if !status.is_success() {
            return Err(CloudBufferError::HttpStatus {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
                body: body.unwrap_or_default(),
            });
        }
        body.map_err(|source| CloudBufferError::Transport {
            url,
            source: source.without_url(),
        })
    }
}

/// `url` as text with the `apiKey` query value masked, for logs and errors.
fn redact(url: &Url) -> String {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(name, value)| {
            let value = if name == API_KEY_PARAM {
                "***".to_string()
            } else {
                value.into_owned()
            };
            (name.into_owned(), value)
        })
        .collect();
    if pairs.is_empty() {
        return url.to_string();
    }
    let mut masked = url.clone();
    masked.query_pairs_mut().clear().extend_pairs(pairs);
    masked.to_string()
}

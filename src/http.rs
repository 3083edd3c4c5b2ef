//! Request/response model and the network seam
//!
//! The worker never talks to a socket directly. Every network access goes
//! through a [`Fetcher`], so tests can script responses and failures while
//! the CLI uses a real HTTP client.

use crate::error::{OffcacheError, OffcacheResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::{Origin, Url};

/// Header map with lowercased names
pub type Headers = BTreeMap<String, String>;

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = OffcacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            other => Err(OffcacheError::User(format!("Unsupported method: {}", other))),
        }
    }
}

/// An intercepted request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    url: Url,
    headers: Headers,
}

impl Request {
    /// Create a request with the given method
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Headers::new(),
        }
    }

    /// Create a GET request
    pub fn get(url: Url) -> Self {
        Self::new(Method::Get, url)
    }

    /// Parse an absolute URL into a GET request
    pub fn parse_get(url: &str) -> OffcacheResult<Self> {
        let parsed = Url::parse(url).map_err(|e| OffcacheError::invalid_url(url, e))?;
        Ok(Self::get(parsed))
    }

    /// Add a header (name is lowercased)
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::Get
    }

    /// Whether this request targets the given origin
    pub fn same_origin(&self, origin: &Origin) -> bool {
        &self.url.origin() == origin
    }
}

/// A response, either from the network, the cache, or synthesized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(skip)]
    pub body: Vec<u8>,
}

impl Response {
    /// Create a response with a status and body
    pub fn new(status: u16, status_text: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            headers: Headers::new(),
            body: body.into(),
        }
    }

    /// A 200 OK response
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, "OK", body)
    }

    /// The synthetic 503 handed to callers instead of a transport error
    pub fn service_unavailable(message: &str) -> Self {
        Self::new(503, "Service Unavailable", message.as_bytes().to_vec())
            .with_header("content-type", "text/plain; charset=utf-8")
    }

    /// Add a header (name is lowercased)
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Only complete 200 responses are ever written to a partition
    pub fn is_cacheable(&self) -> bool {
        self.status == 200
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_len(&self) -> u64 {
        self.body.len() as u64
    }
}

/// Transport-level failure. HTTP error statuses are responses, not errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("request to {url} was aborted")]
    Aborted { url: String },
}

/// Network access used by the worker
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform the request exactly as given
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;

    /// Human-readable name for logs
    fn name(&self) -> &'static str;
}

/// Fetcher backed by a blocking `ureq` agent on the tokio blocking pool
#[derive(Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
    user_agent: String,
}

impl HttpFetcher {
    /// Create a fetcher with a global per-request timeout
    pub fn new(timeout: Duration, user_agent: impl Into<String>) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            user_agent: user_agent.into(),
        }
    }

    fn fetch_blocking(
        agent: &ureq::Agent,
        user_agent: &str,
        request: &Request,
    ) -> Result<Response, FetchError> {
        let url = request.url().as_str();
        let result = match request.method() {
            Method::Get | Method::Head | Method::Delete => {
                let mut builder = match request.method() {
                    Method::Head => agent.head(url),
                    Method::Delete => agent.delete(url),
                    _ => agent.get(url),
                };
                builder = builder.header("user-agent", user_agent);
                for (name, value) in request.headers() {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.call()
            }
            Method::Post | Method::Put | Method::Patch => {
                let mut builder = match request.method() {
                    Method::Put => agent.put(url),
                    Method::Patch => agent.patch(url),
                    _ => agent.post(url),
                };
                builder = builder.header("user-agent", user_agent);
                for (name, value) in request.headers() {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.send_empty()
            }
        };

        let mut response = result.map_err(|e| map_ureq_error(url, e))?;

        let status = response.status();
        let mut headers = Headers::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.as_str().to_ascii_lowercase(), value.to_string());
            }
        }

        // Model weights run to hundreds of megabytes; lift the default body cap
        let body = response
            .body_mut()
            .with_config()
            .limit(u64::MAX)
            .read_to_vec()
            .map_err(|e| map_ureq_error(url, e))?;

        Ok(Response {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

fn map_ureq_error(url: &str, err: ureq::Error) -> FetchError {
    match err {
        ureq::Error::Timeout(_) => FetchError::Timeout {
            url: url.to_string(),
        },
        other => FetchError::Transport {
            url: url.to_string(),
            reason: other.to_string(),
        },
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        debug!("{} {}", request.method(), request.url());
        let agent = self.agent.clone();
        let user_agent = self.user_agent.clone();
        let owned = request.clone();

        tokio::task::spawn_blocking(move || Self::fetch_blocking(&agent, &user_agent, &owned))
            .await
            .map_err(|e| FetchError::Aborted {
                url: format!("{} ({})", request.url(), e),
            })?
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

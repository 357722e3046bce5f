//! Upstream target resolution and HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode, Uri};
use bytes::Bytes;
use reqwest::{Client, Url};
use tracing::debug;

use crate::error::{ProxyError, Result};
use crate::proxy::USER_AGENT;

// == Target Resolver ==
/// Rebuilds the upstream URL embedded in a proxy request path.
///
/// `/api.example.com/1.0/Thing/5?x=1` resolves to
/// `https://api.example.com/1.0/Thing/5?x=1`.
#[derive(Debug, Clone)]
pub struct TargetResolver {
    /// Path prefix stripped before resolving
    pub mount: String,
    /// Scheme used when the embedded target has none
    pub scheme: String,
    /// Replaces scheme, host and port of every target when set
    pub origin: Option<Url>,
}

impl Default for TargetResolver {
    fn default() -> Self {
        Self {
            mount: String::new(),
            scheme: "https".to_string(),
            origin: None,
        }
    }
}

impl TargetResolver {
    pub fn resolve(&self, uri: &Uri) -> Result<Url> {
        let path = uri.path();
        let rest = path
            .strip_prefix(self.mount.as_str())
            .unwrap_or(path)
            .trim_start_matches('/');
        if rest.is_empty() {
            return Err(ProxyError::InvalidTarget("empty upstream path".to_string()));
        }

        let raw = if rest.contains("://") {
            rest.to_string()
        } else {
            format!("{}://{}", self.scheme, rest)
        };
        let mut url = Url::parse(&raw).map_err(|e| ProxyError::InvalidTarget(format!("{}: {}", raw, e)))?;
        if url.host_str().is_none() {
            return Err(ProxyError::InvalidTarget(format!("{}: missing host", raw)));
        }

        if let Some(origin) = &self.origin {
            let mut rebased = origin.clone();
            rebased.set_path(url.path());
            url = rebased;
        }
        url.set_query(uri.query());
        Ok(url)
    }
}

// == Upstream Types ==
/// An outbound GET.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub url: Url,
    /// Whitelisted headers copied from the client request
    pub headers: HeaderMap,
}

/// A fully-read upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Performs upstream fetches. Any non-2xx status is a successful fetch;
/// only transport failures are errors.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn fetch(&self, request: UpstreamRequest) -> Result<UpstreamResponse>;
}

// == HTTP Upstream ==
/// reqwest-backed upstream shared by every route.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: Client,
}

impl HttpUpstream {
    /// Builds a client with a per-request `timeout` and the fixed user agent.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .use_rustls_tls()
            .build()
            .map_err(|e| ProxyError::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn fetch(&self, request: UpstreamRequest) -> Result<UpstreamResponse> {
        let mut headers = request.headers;
        headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));

        let response = self
            .client
            .get(request.url.clone())
            .headers(headers)
            .send()
            .await
            .map_err(|e| ProxyError::Upstream(format!("{}: {}", request.url, e)))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| ProxyError::Upstream(format!("{}: failed to read response: {}", request.url, e)))?;

        debug!(url = %request.url, status = status.as_u16(), size = body.len(), "upstream fetched");

        Ok(UpstreamResponse { status, headers, body })
    }
}

//! Proxy Handler
//!
//! Serves one passthrough request: cache probe, upstream fetch on miss,
//! store-on-success, hook, and headers reporting the real remaining
//! lifetime of what was served.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::Request,
    http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::{debug, warn};

use crate::cache::{Cache, CacheEntry, Clock};
use crate::error::{ProxyError, Result};
use crate::proxy::{
    apply_identity_headers, apply_no_cache, http_date, max_age_secs, request_key, HookContext,
    KeyFn, ResponseHook, TargetResolver, Upstream, UpstreamRequest, X_CACHED,
};

// == Cached Marker ==
/// Value of the `X-Cached` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachedMarker {
    /// Fetched and stored just now
    New,
    /// Fetched and not stored
    No,
    /// Served from a cache entry stored at this time
    Hit(DateTime<Utc>),
}

impl CachedMarker {
    fn header_value(self) -> HeaderValue {
        match self {
            CachedMarker::New => HeaderValue::from_static("new"),
            CachedMarker::No => HeaderValue::from_static("no"),
            CachedMarker::Hit(at) => HeaderValue::from_str(&http_date(at))
                .unwrap_or_else(|_| HeaderValue::from_static("hit")),
        }
    }
}

// == Proxy Handler ==
/// Handler for one passthrough route.
#[derive(Clone)]
pub struct ProxyHandler {
    upstream: Arc<dyn Upstream>,
    clock: Arc<dyn Clock>,
    cache: Option<Arc<dyn Cache>>,
    ttl: Duration,
    target: TargetResolver,
    pass_headers: Vec<HeaderName>,
    keep_headers: Vec<HeaderName>,
    key_fn: KeyFn,
    hook: Option<Arc<dyn ResponseHook>>,
}

impl ProxyHandler {
    // == Constructor ==
    /// Creates an uncached handler that keeps only `Content-Type`.
    pub fn new(upstream: Arc<dyn Upstream>, clock: Arc<dyn Clock>) -> Self {
        Self {
            upstream,
            clock,
            cache: None,
            ttl: Duration::ZERO,
            target: TargetResolver::default(),
            pass_headers: Vec::new(),
            keep_headers: vec![header::CONTENT_TYPE],
            key_fn: request_key(Vec::new()),
            hook: None,
        }
    }

    /// Caches successful responses in `cache` for `ttl`.
    pub fn with_cache(mut self, cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        self.cache = Some(cache);
        self.ttl = ttl;
        self
    }

    pub fn with_target(mut self, target: TargetResolver) -> Self {
        self.target = target;
        self
    }

    /// Request headers forwarded upstream; everything else is dropped.
    pub fn with_pass_headers(mut self, headers: Vec<HeaderName>) -> Self {
        self.pass_headers = headers;
        self
    }

    /// Upstream response headers copied to the client.
    pub fn with_keep_headers(mut self, headers: Vec<HeaderName>) -> Self {
        self.keep_headers = headers;
        self
    }

    pub fn with_key_fn(mut self, key_fn: KeyFn) -> Self {
        self.key_fn = key_fn;
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn ResponseHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    // == Handle ==
    /// Serves `req` end to end. Errors are rendered, never propagated.
    pub async fn handle(&self, req: Request) -> Response {
        let (parts, _body) = req.into_parts();

        match parts.method {
            Method::OPTIONS => return options_response(),
            Method::GET | Method::HEAD => {}
            _ => return ProxyError::MethodNotAllowed.into_response(),
        }

        match self.serve(&parts).await {
            Ok(response) => response,
            Err(err) => {
                match &err {
                    ProxyError::Upstream(msg) => warn!(uri = %parts.uri, "upstream failure: {}", msg),
                    other => debug!(uri = %parts.uri, "proxy request rejected: {}", other),
                }
                err.into_response()
            }
        }
    }

    async fn serve(&self, parts: &Parts) -> Result<Response> {
        let head = parts.method == Method::HEAD;
        let key = self.cache.as_ref().map(|_| (self.key_fn)(parts));

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(entry) = cache.get(key).await {
                debug!(key = %key, "serving from cache");
                return Ok(self.cached_response(parts, entry, head));
            }
        }

        let url = self.target.resolve(&parts.uri)?;
        let mut headers = HeaderMap::new();
        for name in &self.pass_headers {
            if let Some(value) = parts.headers.get(name) {
                headers.insert(name.clone(), value.clone());
            }
        }
        let fetched = self.upstream.fetch(UpstreamRequest { url, headers }).await?;

        let mut out = HeaderMap::new();
        for name in &self.keep_headers {
            for value in fetched.headers.get_all(name) {
                out.append(name.clone(), value.clone());
            }
        }

        let content_type = fetched
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        let stored = match (&self.cache, &key) {
            (Some(cache), Some(key)) if fetched.status == StatusCode::OK => {
                let mut retained = out.clone();
                retained.remove(header::CONTENT_TYPE);
                cache
                    .put_with_headers(key, fetched.body.clone(), content_type, retained, self.ttl)
                    .await
            }
            _ => None,
        };

        match stored {
            Some(expires_at) => {
                apply_freshness(&mut out, expires_at, expires_at - self.clock.now());
                out.insert(X_CACHED, CachedMarker::New.header_value());
            }
            None => {
                if fetched.status == StatusCode::OK && self.cache.is_some() {
                    debug!(uri = %parts.uri, "response not stored");
                }
                out.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
                out.insert(X_CACHED, CachedMarker::No.header_value());
            }
        }

        self.run_hook(parts, fetched.status, &fetched.body);
        Ok(finish(fetched.status, out, fetched.body, head))
    }

    fn cached_response(&self, parts: &Parts, entry: CacheEntry, head: bool) -> Response {
        assert!(
            entry.expires_at > entry.created_at,
            "cache hit with empty lifetime: stored {} expires {}",
            entry.created_at,
            entry.expires_at
        );

        let mut out = entry.headers.clone();
        if self.keep_headers.contains(&header::CONTENT_TYPE) {
            if let Ok(value) = HeaderValue::from_str(&entry.content_type) {
                out.insert(header::CONTENT_TYPE, value);
            }
        }
        apply_freshness(&mut out, entry.expires_at, entry.remaining(self.clock.now()));
        out.insert(X_CACHED, CachedMarker::Hit(entry.created_at).header_value());

        self.run_hook(parts, StatusCode::OK, &entry.data);
        finish(StatusCode::OK, out, entry.data, head)
    }

    fn run_hook(&self, parts: &Parts, status: StatusCode, body: &Bytes) {
        let Some(hook) = self.hook.clone() else {
            return;
        };
        let ctx = HookContext {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            status,
        };
        let body = body.clone();
        tokio::spawn(async move {
            hook.on_response(&ctx, &body);
        });
    }
}

/// `Expires` and `max-age` from the time actually left, not the TTL.
fn apply_freshness(headers: &mut HeaderMap, expires_at: DateTime<Utc>, remaining: ChronoDuration) {
    if let Ok(value) = HeaderValue::from_str(&http_date(expires_at)) {
        headers.insert(header::EXPIRES, value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("max-age={}", max_age_secs(remaining))) {
        headers.insert(header::CACHE_CONTROL, value);
    }
}

/// Empty 200 carrying the CORS headers.
pub(crate) fn options_response() -> Response {
    let mut headers = HeaderMap::new();
    apply_no_cache(&mut headers);
    finish(StatusCode::OK, headers, Bytes::new(), true)
}

/// Applies identity headers and writes the body (or none, for HEAD) with
/// the real `Content-Length`.
fn finish(status: StatusCode, mut headers: HeaderMap, body: Bytes, head: bool) -> Response {
    apply_identity_headers(&mut headers);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));

    let body = if head { Body::empty() } else { Body::from(body) };
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

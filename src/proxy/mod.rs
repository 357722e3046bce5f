//! Proxy Module
//!
//! The cache-aware passthrough pipeline: key derivation, upstream fetch,
//! store-on-success, freshness headers and the response hook.

mod freshness;
mod handler;
mod hook;
mod key;
mod upstream;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

pub use freshness::{http_date, max_age_secs};
pub use handler::{CachedMarker, ProxyHandler};
pub(crate) use handler::options_response;
pub use hook::{HookContext, ResponseHook};
pub use key::{request_key, KeyFn};
pub use upstream::{HttpUpstream, TargetResolver, Upstream, UpstreamRequest, UpstreamResponse};

// == Public Constants ==
/// Value of the `Server` header and product token of the `User-Agent`
pub const SERVER_NAME: &str = "fwproxy";

/// Outbound `User-Agent` for every upstream request
pub const USER_AGENT: &str = concat!("fwproxy/", env!("CARGO_PKG_VERSION"));

/// Methods accepted on proxy and batch routes
pub const ALLOWED_METHODS: &str = "GET, HEAD, OPTIONS";

/// Marker header reporting the cache outcome
pub const X_CACHED: HeaderName = HeaderName::from_static("x-cached");

/// Request id header set by the router
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Sets the server identity and CORS headers shared by every response.
pub fn apply_identity_headers(headers: &mut HeaderMap) {
    headers.insert(header::SERVER, HeaderValue::from_static(SERVER_NAME));
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("X-Cached, X-Request-Id"),
    );
}

/// Marks a response as not cacheable by clients or intermediaries.
pub fn apply_no_cache(headers: &mut HeaderMap) {
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
}

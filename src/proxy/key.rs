//! Cache key derivation.

use std::sync::Arc;

use axum::http::{request::Parts, HeaderName};

/// Derives the cache key for a request.
pub type KeyFn = Arc<dyn Fn(&Parts) -> String + Send + Sync>;

/// Keys on the path and query plus the values of `headers`.
///
/// A missing header contributes an empty value, so requests with and
/// without it get separate cache lines.
pub fn request_key(headers: Vec<HeaderName>) -> KeyFn {
    Arc::new(move |parts: &Parts| {
        let mut key = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());
        for name in &headers {
            let value = parts
                .headers
                .get(name)
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .unwrap_or_default();
            key.push('\n');
            key.push_str(name.as_str());
            key.push('=');
            key.push_str(&value);
        }
        key
    })
}

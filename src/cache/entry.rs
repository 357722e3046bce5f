//! Cache Entry Module
//!
//! Defines the immutable record stored for each cached upstream response.

use axum::http::HeaderMap;
use bytes::Bytes;
use chrono::{DateTime, Duration as ChronoDuration, Utc};

// == Cache Entry ==
/// A stored response body with its freshness metadata.
///
/// Entries are never mutated in place; a newer `put` for the same key
/// replaces the whole entry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The response body
    pub data: Bytes,
    /// The upstream `Content-Type`
    pub content_type: String,
    /// Other retained upstream headers, replayed on hits
    pub headers: HeaderMap,
    /// When the entry was stored
    pub created_at: DateTime<Utc>,
    /// When the entry stops being served
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry stored at `now` which expires after `ttl`.
    ///
    /// Returns `None` when the expiry is not representable.
    pub fn new(data: Bytes, content_type: impl Into<String>, now: DateTime<Utc>, ttl: ChronoDuration) -> Option<Self> {
        Some(Self {
            data,
            content_type: content_type.into(),
            headers: HeaderMap::new(),
            created_at: now,
            expires_at: now.checked_add_signed(ttl)?,
        })
    }

    /// Attaches the retained upstream response headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    // == Cost ==
    /// Byte cost charged against the cache capacity.
    pub fn cost(&self) -> u64 {
        self.data.len() as u64
    }

    // == Is Expired ==
    /// An entry is expired once `now` is strictly after `expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    // == Remaining Lifetime ==
    /// Remaining lifetime at `now`, clamped at zero.
    pub fn remaining(&self, now: DateTime<Utc>) -> ChronoDuration {
        let left = self.expires_at - now;
        if left < ChronoDuration::zero() {
            ChronoDuration::zero()
        } else {
            left
        }
    }
}

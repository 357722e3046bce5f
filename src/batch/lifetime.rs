//! Batch lifetime reduction.

use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::proxy::{apply_no_cache, http_date};

/// Reads the `max-age` directive of a `Cache-Control` value.
///
/// Unparseable values are skipped; the first valid one wins.
pub fn parse_max_age(cache_control: &str) -> Option<i64> {
    cache_control.split(',').find_map(|directive| {
        let (name, value) = directive.trim().split_once('=')?;
        if name.trim().eq_ignore_ascii_case("max-age") {
            value.trim().trim_matches('"').parse().ok()
        } else {
            None
        }
    })
}

fn forbids_caching(cache_control: &str) -> bool {
    cache_control.split(',').any(|directive| {
        let directive = directive.trim();
        directive.eq_ignore_ascii_case("no-cache") || directive.eq_ignore_ascii_case("no-store")
    })
}

// == Aggregate Lifetime ==
/// How long a batch response may be cached: the shortest lifetime of its
/// items, or not at all once any item is uncacheable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateLifetime {
    pub cacheable: bool,
    pub max_age: u64,
}

impl AggregateLifetime {
    /// Starts from the batch route's own TTL.
    pub fn new(default_ttl: Duration) -> Self {
        let max_age = default_ttl.as_secs();
        Self {
            cacheable: max_age > 0,
            max_age,
        }
    }

    /// Folds in one item's status and `Cache-Control`.
    pub fn observe(&mut self, status: StatusCode, cache_control: Option<&str>) {
        if !self.cacheable {
            return;
        }
        if status != StatusCode::OK {
            self.cacheable = false;
            return;
        }
        let Some(cache_control) = cache_control else {
            return;
        };
        if forbids_caching(cache_control) {
            self.cacheable = false;
            return;
        }
        match parse_max_age(cache_control) {
            Some(age) if age <= 0 => self.cacheable = false,
            Some(age) => self.max_age = self.max_age.min(age as u64),
            None => {}
        }
    }

    /// Writes `Cache-Control` and `Expires` for the reduced lifetime.
    pub fn apply(&self, headers: &mut HeaderMap, now: DateTime<Utc>) {
        if !self.cacheable {
            apply_no_cache(headers);
            return;
        }
        if let Ok(value) = HeaderValue::from_str(&format!("max-age={}", self.max_age)) {
            headers.insert(header::CACHE_CONTROL, value);
        }
        let expires = i64::try_from(self.max_age)
            .ok()
            .and_then(ChronoDuration::try_seconds)
            .and_then(|age| now.checked_add_signed(age));
        if let Some(value) = expires.and_then(|at| HeaderValue::from_str(&http_date(at)).ok()) {
            headers.insert(header::EXPIRES, value);
        }
    }
}

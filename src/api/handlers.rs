//! API Handlers
//!
//! Shared application state and the handlers for the proxy's own
//! endpoints. Passthrough and batch requests are served by
//! [`ProxyHandler`] and [`crate::batch`].

use std::sync::Arc;

use axum::{extract::State, response::Redirect, Json, Router};

use crate::api::proxy_routes;
use crate::cache::{CacheBackend, Clock, SystemClock};
use crate::config::{Config, RouteConfig};
use crate::error::Result;
use crate::latest::{LatestTracker, LogNotifier};
use crate::models::{HealthResponse, StatsResponse};
use crate::proxy::{request_key, HttpUpstream, ProxyHandler, Upstream};

/// Where `GET /` points.
pub const HOMEPAGE: &str = "https://github.com/pgaskin/kfwproxy";

/// Application state shared across all handlers.
///
/// Every route, including batch sub-requests, sees the same cache,
/// upstream client and tracker.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: CacheBackend,
    pub upstream: Arc<dyn Upstream>,
    pub clock: Arc<dyn Clock>,
    pub latest: Arc<LatestTracker>,
    /// Router batch sub-requests run against, built once with the state.
    ///
    /// Its own batch route sees an empty `dispatch`, which is never used
    /// because every sub-request carries the recursion marker.
    pub dispatch: Router,
}

impl AppState {
    /// Creates a new AppState around an existing upstream and clock.
    pub fn new(config: Config, upstream: Arc<dyn Upstream>, clock: Arc<dyn Clock>) -> Self {
        let backend = CacheBackend::new(config.cache_backend, config.cache_limit_bytes(), clock.clone());
        let latest = LatestTracker::new().with_notifier(Arc::new(LogNotifier));
        let mut state = Self {
            config: Arc::new(config),
            backend,
            upstream,
            clock,
            latest: Arc::new(latest),
            dispatch: Router::new(),
        };
        state.dispatch = proxy_routes(state.clone());
        state
    }

    /// Creates a new AppState from configuration.
    ///
    /// Builds the shared HTTP client and uses the system clock.
    pub fn from_config(config: &Config) -> Result<Self> {
        let upstream = HttpUpstream::new(config.upstream_timeout())?;
        Ok(Self::new(config.clone(), Arc::new(upstream), Arc::new(SystemClock)))
    }

    /// Builds the handler serving one passthrough route.
    pub fn proxy_handler(&self, route: &RouteConfig) -> ProxyHandler {
        let mut handler = ProxyHandler::new(self.upstream.clone(), self.clock.clone())
            .with_cache(self.backend.as_cache(), route.ttl)
            .with_target(self.config.target())
            .with_pass_headers(route.pass_headers.clone())
            .with_key_fn(request_key(route.key_headers.clone()));
        if let Some(keep) = &route.keep_headers {
            handler = handler.with_keep_headers(keep.clone());
        }
        if route.track_latest {
            handler = handler.with_hook(self.latest.clone());
        }
        handler
    }
}

/// Handler for GET /stats
///
/// Returns the active backend's counters.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.backend.stats().await;
    Json(StatsResponse::new(
        state.backend.name(),
        stats,
        state.config.cache_limit_bytes(),
    ))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Handler for GET /
pub async fn root_handler() -> Redirect {
    Redirect::temporary(HOMEPAGE)
}

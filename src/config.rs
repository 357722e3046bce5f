//! Configuration Module
//!
//! Handles loading and managing proxy configuration from environment variables.

use std::env;
use std::time::Duration;

use axum::http::HeaderName;
use reqwest::Url;

use crate::cache::BackendKind;
use crate::proxy::TargetResolver;

/// Preview opt-in header sent by devices checking for beta firmware.
pub const PREVIEW_HEADER: HeaderName = HeaderName::from_static("x-kobo-accept-preview");

/// Proxy configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Upstream request timeout in seconds
    pub upstream_timeout: u64,
    /// Cache capacity in MB (10^6 bytes), 0 for unbounded
    pub cache_limit_mb: u64,
    /// TTL in seconds for upgrade checks and batch responses
    pub cache_ttl: u64,
    /// TTL in seconds for release notes
    pub notes_ttl: u64,
    /// Which cache implementation to run
    pub cache_backend: BackendKind,
    /// Sweep interval in seconds for the memory backend
    pub sweep_interval: u64,
    /// Maximum sub-paths in one batch request
    pub max_batch: usize,
    /// Upstream host, also the mount segment of every proxied route
    pub upstream_host: String,
    /// Scheme used when the embedded target has none
    pub upstream_scheme: String,
    /// Replaces scheme, host and port of every upstream target
    pub upstream_origin: Option<Url>,
    /// Emit logs as JSON
    pub log_json: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `PORT` / `SERVER_PORT` - HTTP server port (default: 8080, `PORT` wins)
    /// - `UPSTREAM_TIMEOUT_SECS` - Upstream timeout (default: 4)
    /// - `CACHE_LIMIT_MB` - Cache capacity (default: 50)
    /// - `CACHE_TTL_SECS` - Upgrade check TTL (default: 900)
    /// - `NOTES_TTL_SECS` - Release notes TTL (default: 10800)
    /// - `CACHE_BACKEND` - `memory` or `cost` (default: cost)
    /// - `SWEEP_INTERVAL_SECS` - Memory cache sweep interval (default: 60)
    /// - `MAX_BATCH` - Batch size limit (default: 20)
    /// - `UPSTREAM_HOST`, `UPSTREAM_SCHEME`, `UPSTREAM_ORIGIN` - upstream location
    /// - `LOG_JSON` - JSON logs when `1` or `true`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .or_else(|| env::var("SERVER_PORT").ok().and_then(|v| v.parse().ok()))
                .unwrap_or(defaults.server_port),
            upstream_timeout: env::var("UPSTREAM_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.upstream_timeout),
            cache_limit_mb: env::var("CACHE_LIMIT_MB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.cache_limit_mb),
            cache_ttl: env::var("CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.cache_ttl),
            notes_ttl: env::var("NOTES_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.notes_ttl),
            cache_backend: env::var("CACHE_BACKEND")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.cache_backend),
            sweep_interval: env::var("SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.sweep_interval),
            max_batch: env::var("MAX_BATCH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_batch),
            upstream_host: env::var("UPSTREAM_HOST")
                .ok()
                .map(|v| v.trim_matches('/').to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.upstream_host),
            upstream_scheme: env::var("UPSTREAM_SCHEME")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.upstream_scheme),
            upstream_origin: env::var("UPSTREAM_ORIGIN")
                .ok()
                .and_then(|v| Url::parse(&v).ok()),
            log_json: env::var("LOG_JSON")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true"))
                .unwrap_or(defaults.log_json),
        }
    }

    pub fn cache_limit_bytes(&self) -> u64 {
        self.cache_limit_mb.saturating_mul(1_000_000)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval)
    }

    /// Default lifetime of a batch response.
    pub fn batch_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    /// Mount path of the batch route and prefix of every sub-path.
    pub fn mount(&self) -> String {
        format!("/{}", self.upstream_host)
    }

    pub fn target(&self) -> TargetResolver {
        TargetResolver {
            mount: String::new(),
            scheme: self.upstream_scheme.clone(),
            origin: self.upstream_origin.clone(),
        }
    }

    /// The built-in passthrough routes.
    pub fn routes(&self) -> Vec<RouteConfig> {
        let mount = self.mount();
        vec![
            RouteConfig::new(
                format!("{}/1.0/UpgradeCheck/Device/:device/:affiliate/:version/:serial", mount),
                Duration::from_secs(self.cache_ttl),
            )
            .pass_header(PREVIEW_HEADER)
            .key_header(PREVIEW_HEADER)
            .track_latest(),
            RouteConfig::new(
                format!("{}/1.0/ReleaseNotes/:idx", mount),
                Duration::from_secs(self.notes_ttl),
            ),
        ]
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 8080,
            upstream_timeout: 4,
            cache_limit_mb: 50,
            cache_ttl: 900,
            notes_ttl: 10800,
            cache_backend: BackendKind::Cost,
            sweep_interval: 60,
            max_batch: 20,
            upstream_host: "api.kobobooks.com".to_string(),
            upstream_scheme: "https".to_string(),
            upstream_origin: None,
            log_json: false,
        }
    }
}

// == Route Config ==
/// One passthrough route.
#[derive(Debug, Clone)]
pub struct RouteConfig {
    /// axum path pattern
    pub pattern: String,
    pub ttl: Duration,
    /// Request headers forwarded upstream
    pub pass_headers: Vec<HeaderName>,
    /// Request headers that split the cache key
    pub key_headers: Vec<HeaderName>,
    /// Response headers kept, `None` for `Content-Type` only
    pub keep_headers: Option<Vec<HeaderName>>,
    /// Feed responses to the latest-version tracker
    pub track_latest: bool,
}

impl RouteConfig {
    pub fn new(pattern: impl Into<String>, ttl: Duration) -> Self {
        Self {
            pattern: pattern.into(),
            ttl,
            pass_headers: Vec::new(),
            key_headers: Vec::new(),
            keep_headers: None,
            track_latest: false,
        }
    }

    pub fn pass_header(mut self, name: HeaderName) -> Self {
        self.pass_headers.push(name);
        self
    }

    pub fn key_header(mut self, name: HeaderName) -> Self {
        self.key_headers.push(name);
        self
    }

    pub fn keep_headers(mut self, names: Vec<HeaderName>) -> Self {
        self.keep_headers = Some(names);
        self
    }

    pub fn track_latest(mut self) -> Self {
        self.track_latest = true;
        self
    }
}

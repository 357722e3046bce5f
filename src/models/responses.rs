//! Response DTOs for the proxy's own endpoints
//!
//! Defines the structure of outgoing JSON bodies.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::cache::CacheStats;

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Active cache implementation
    pub backend: &'static str,
    #[serde(flatten)]
    pub cache: CacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Configured capacity in bytes, 0 for unbounded
    pub limit_bytes: u64,
}

impl StatsResponse {
    /// Creates a new StatsResponse from a cache statistics snapshot
    pub fn new(backend: &'static str, cache: CacheStats, limit_bytes: u64) -> Self {
        Self {
            backend,
            hit_rate: cache.hit_rate(),
            cache,
            limit_bytes,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// One sub-request result inside a batch response.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BatchItem {
    pub status: u16,
    /// Response headers, only when the client asked for them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<BTreeMap<String, Vec<String>>>,
    pub body: String,
}

impl BatchItem {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            header: None,
            body: body.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_response_flattens_counters() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            puts: 20,
            entries: 5,
            ..Default::default()
        };
        let resp = StatsResponse::new("memory", stats, 1000);
        assert!((resp.hit_rate - 0.8).abs() < 0.001);

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["backend"], "memory");
        assert_eq!(json["hits"], 80);
        assert_eq!(json["entries"], 5);
        assert_eq!(json["limit_bytes"], 1000);
    }

    #[test]
    fn test_stats_response_zero_requests() {
        let resp = StatsResponse::new("cost", CacheStats::default(), 0);
        assert_eq!(resp.hit_rate, 0.0);
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }

    #[test]
    fn test_batch_item_omits_missing_headers() {
        let item = BatchItem::new(200, "<b>{}</b>");
        let json = serde_json::to_string(&item).unwrap();
        assert_eq!(json, r#"{"status":200,"body":"<b>{}</b>"}"#);
    }

    #[test]
    fn test_batch_item_with_headers() {
        let mut header = BTreeMap::new();
        header.insert("content-type".to_string(), vec!["application/json".to_string()]);
        let item = BatchItem {
            header: Some(header),
            ..BatchItem::new(404, "")
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["header"]["content-type"][0], "application/json");
        assert_eq!(json["status"], 404);
    }
}

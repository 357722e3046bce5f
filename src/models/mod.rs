//! Response models for the proxy's own endpoints
//!
//! This module defines the DTOs serialized into JSON bodies by the stats,
//! health and batch handlers.

pub mod responses;

// Re-export commonly used types
pub use responses::{BatchItem, HealthResponse, StatsResponse};

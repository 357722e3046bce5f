//! API Module
//!
//! Shared state and routing for the proxy.
//!
//! # Endpoints
//! - `/{host}/1.0/UpgradeCheck/Device/:device/:affiliate/:version/:serial` - cached passthrough
//! - `/{host}/1.0/ReleaseNotes/:idx` - cached passthrough
//! - `/{host}?x=..&h=1` - batch
//! - `GET /stats` - Cache statistics
//! - `GET /health` - Health check endpoint
//! - `GET /latest/...` - Latest firmware version and release notes

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::{create_router, proxy_routes};

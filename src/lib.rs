//! fwproxy - A caching reverse proxy for firmware update APIs
//!
//! Serves upgrade checks and release notes from a bounded, expiring cache,
//! aggregates batches of them into one response, and tracks the newest
//! firmware version seen.

pub mod api;
pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod latest;
pub mod models;
pub mod proxy;
pub mod tasks;

pub use api::{create_router, AppState};
pub use config::Config;
pub use tasks::spawn_sweep_task;

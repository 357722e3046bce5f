//! Latest Module
//!
//! Tracks the newest firmware version and release notes seen in proxied
//! upgrade checks, and serves them.

pub mod handlers;
mod tracker;
mod version;

pub use tracker::{LatestTracker, LogNotifier, Notifier, Snapshot};
pub use version::Version;

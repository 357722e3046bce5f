//! Latest Tracker
//!
//! Watches upgrade-check responses for the newest firmware version and
//! release notes id seen so far.

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::http::StatusCode;
use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, info};

use crate::latest::Version;
use crate::proxy::{HookContext, ResponseHook};

// == Notifier ==
/// Receives every version increase.
pub trait Notifier: Send + Sync {
    fn notify_version(&self, old: Version, new: Version);
}

/// Announces new versions in the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_version(&self, old: Version, new: Version) {
        if old.is_zero() {
            info!(version = %new, "latest version discovered");
        } else {
            info!(old = %old, new = %new, "new version released");
        }
    }
}

// == Snapshot ==
/// Immutable view of everything tracked so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub version: Version,
    /// Upgrade URL the version was read from
    pub version_url: String,
    pub notes: u64,
    pub notes_url: String,
}

#[derive(Debug, Default, Deserialize)]
struct UpgradeCheck {
    #[serde(rename = "UpgradeURL", default)]
    upgrade_url: Option<String>,
    #[serde(rename = "ReleaseNoteURL", default)]
    release_note_url: Option<String>,
}

// == Latest Tracker ==
/// Keeps the highest version and notes id observed.
///
/// Readers load the current `Arc<Snapshot>` without locking; writers build
/// a new snapshot and compare-and-swap it in only when it moves strictly
/// forward.
pub struct LatestTracker {
    current: ArcSwap<Snapshot>,
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl Default for LatestTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LatestTracker {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot::default()),
            notifiers: Vec::new(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Records the version in `url` if it is newer than the current one.
    pub fn update_version(&self, url: &str) {
        let Some(new) = Version::extract(url) else {
            debug!(url, "no version in upgrade url");
            return;
        };

        let mut old = None;
        self.current.rcu(|current| {
            if new <= current.version {
                old = None;
                return Arc::clone(current);
            }
            old = Some(current.version);
            let mut next = Snapshot::clone(current);
            next.version = new;
            next.version_url = url.to_string();
            Arc::new(next)
        });
        let Some(old) = old else {
            return;
        };

        for notifier in &self.notifiers {
            let notifier = notifier.clone();
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move { notifier.notify_version(old, new) });
                }
                Err(_) => notifier.notify_version(old, new),
            }
        }
    }

    /// Records the notes id (the number after the last `/`) if it is higher.
    pub fn update_notes(&self, url: &str) {
        let Some(id) = notes_id(url) else {
            return;
        };

        let mut moved = false;
        self.current.rcu(|current| {
            moved = id > current.notes;
            if !moved {
                return Arc::clone(current);
            }
            let mut next = Snapshot::clone(current);
            next.notes = id;
            next.notes_url = url.to_string();
            Arc::new(next)
        });
        if moved {
            debug!(notes = id, "latest release notes updated");
        }
    }

    /// Feeds an upgrade-check JSON body through both trackers.
    pub fn intercept_upgrade_check(&self, body: &[u8]) {
        let Ok(check) = serde_json::from_slice::<UpgradeCheck>(body) else {
            debug!("upgrade check body is not JSON");
            return;
        };
        if let Some(url) = check.upgrade_url.filter(|u| !u.is_empty()) {
            self.update_version(&url);
        }
        if let Some(url) = check.release_note_url.filter(|u| !u.is_empty()) {
            self.update_notes(&url);
        }
    }
}

impl ResponseHook for LatestTracker {
    fn on_response(&self, ctx: &HookContext, body: &Bytes) {
        if ctx.status == StatusCode::OK {
            self.intercept_upgrade_check(body);
        }
    }
}

fn notes_id(url: &str) -> Option<u64> {
    let last = url.rsplit('/').next()?;
    let last = last.split('?').next().unwrap_or(last);
    last.parse().ok()
}

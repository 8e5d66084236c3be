//! What a clipboard watcher hands over, and whether it should be taken at all.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum Capture {
    Text(String),
    /// Path of an image already written to disk.
    Image(String),
    Files(Vec<String>),
}

/// Admission control in front of ingestion.
///
/// Capture can be switched off, suppressed for a short window while we write to
/// the clipboard ourselves during a paste, and refused for blacklisted source
/// applications (password managers, terminals).
pub struct CaptureGate {
    enabled: AtomicBool,
    ignore_until: Mutex<Option<Instant>>,
    blacklist: Vec<String>,
}

impl Default for CaptureGate {
    fn default() -> Self {
        Self::new(Vec::<String>::new())
    }
}

impl CaptureGate {
    pub fn new<I, S>(blacklist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            enabled: AtomicBool::new(true),
            ignore_until: Mutex::new(None),
            blacklist: blacklist
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        tracing::info!(enabled, "capture toggled");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Ignore clipboard changes for `window` from now. Extends, never shortens.
    pub fn suppress_for(&self, window: Duration) {
        let until = Instant::now() + window;
        let mut slot = self
            .ignore_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.map_or(true, |cur| cur < until) {
            *slot = Some(until);
        }
    }

    pub fn is_suppressed(&self) -> bool {
        let slot = self
            .ignore_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        slot.is_some_and(|until| Instant::now() < until)
    }

    pub fn is_blacklisted(&self, app: &str) -> bool {
        let app = app.to_lowercase();
        self.blacklist.iter().any(|b| app.contains(b.as_str()))
    }

    pub fn admit(&self, source_app: Option<&str>) -> bool {
        if !self.is_enabled() || self.is_suppressed() {
            return false;
        }
        match source_app {
            Some(app) if self.is_blacklisted(app) => {
                tracing::debug!(app, "capture refused for blacklisted app");
                false
            }
            _ => true,
        }
    }
}

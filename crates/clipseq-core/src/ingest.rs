//! Create-or-merge decisions for freshly captured clipboard content.

use crate::capture::Capture;
use crate::{ItemId, ParseError, Payload, Store};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DuplicatePolicy {
    /// Bump the count of the newest identical text item instead of inserting.
    #[default]
    #[serde(rename = "count", alias = "merge", alias = "merge-by-count")]
    MergeByCount,
    #[serde(rename = "separate")]
    Separate,
}

impl DuplicatePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            DuplicatePolicy::MergeByCount => "count",
            DuplicatePolicy::Separate => "separate",
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DuplicatePolicy {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "count" | "merge" | "merge-by-count" => Ok(DuplicatePolicy::MergeByCount),
            "separate" => Ok(DuplicatePolicy::Separate),
            _ => Err(ParseError::DuplicatePolicy(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "id", rename_all = "lowercase")]
pub enum IngestOutcome {
    Created(ItemId),
    /// An existing text item's count was incremented.
    Merged(ItemId),
    /// Nothing was stored (the text was blank).
    Skipped,
}

impl IngestOutcome {
    pub fn id(self) -> Option<ItemId> {
        match self {
            IngestOutcome::Created(id) | IngestOutcome::Merged(id) => Some(id),
            IngestOutcome::Skipped => None,
        }
    }
}

/// Store `text` (trimmed) or, under [`DuplicatePolicy::MergeByCount`], count it
/// against the newest text item with the exact same payload.
///
/// Only the newest match is considered. Older items with the same payload (for
/// example ones stored while the policy was `separate`) keep their counts.
pub fn ingest_text<S: Store + ?Sized>(
    store: &S,
    text: &str,
    policy: DuplicatePolicy,
) -> anyhow::Result<IngestOutcome> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(IngestOutcome::Skipped);
    }
    if policy == DuplicatePolicy::MergeByCount {
        if let Some(existing) = store.find_latest_text(text)? {
            store.increment_occurrence(existing.id)?;
            tracing::debug!(id = existing.id, count = existing.count + 1, "merged duplicate text");
            return Ok(IngestOutcome::Merged(existing.id));
        }
    }
    create(
        store,
        Payload::Text {
            text: text.to_string(),
        },
    )
}

pub fn ingest_image<S: Store + ?Sized>(store: &S, path: &str) -> anyhow::Result<IngestOutcome> {
    create(
        store,
        Payload::Image {
            path: path.to_string(),
        },
    )
}

/// Paths are stored in the order given.
pub fn ingest_files<S: Store + ?Sized, P: AsRef<str>>(
    store: &S,
    paths: &[P],
) -> anyhow::Result<IngestOutcome> {
    create(
        store,
        Payload::Files {
            paths: paths.iter().map(|p| p.as_ref().to_string()).collect(),
        },
    )
}

pub fn ingest<S: Store + ?Sized>(
    store: &S,
    capture: &Capture,
    policy: DuplicatePolicy,
) -> anyhow::Result<IngestOutcome> {
    match capture {
        Capture::Text(text) => ingest_text(store, text, policy),
        Capture::Image(path) => ingest_image(store, path),
        Capture::Files(paths) => ingest_files(store, paths),
    }
}

fn create<S: Store + ?Sized>(store: &S, payload: Payload) -> anyhow::Result<IngestOutcome> {
    let session = store.current_session()?;
    let id = store.create_item(session, &payload)?;
    tracing::debug!(id, session, kind = %payload.kind(), "captured item");
    Ok(IngestOutcome::Created(id))
}

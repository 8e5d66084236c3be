//! clipseq-core: clipboard item model, storage trait, ingestion policy and text joiner

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use time::OffsetDateTime;

pub mod capture;
pub mod error;
pub mod images;
pub mod ingest;
pub mod joiner;
pub mod paste;

pub use capture::{Capture, CaptureGate};
pub use error::ParseError;
pub use ingest::{ingest, ingest_files, ingest_image, ingest_text, DuplicatePolicy, IngestOutcome};
pub use joiner::{join, join_texts, JoinMode};
pub use paste::{
    execute_plan, plan_paste_all, PasteAllMode, PasteOptions, PasteReport, PasteStep, PasteTarget,
    MAX_RETRIES_LIMIT,
};

pub type ItemId = i64;
pub type SessionId = i64;

/// One captured clipboard entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub session_id: Option<SessionId>,
    #[serde(flatten)]
    pub payload: Payload,
    pub count: u32,
    pub status: ItemStatus,
    pub is_favorite: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub last_used_at: Option<OffsetDateTime>,
}

impl Item {
    pub fn kind(&self) -> ItemKind {
        self.payload.kind()
    }

    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text { text } => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Payload {
    Text { text: String },
    Image { path: String },
    Files { paths: Vec<String> },
}

impl Payload {
    pub fn kind(&self) -> ItemKind {
        match self {
            Payload::Text { .. } => ItemKind::Text,
            Payload::Image { .. } => ItemKind::Image,
            Payload::Files { .. } => ItemKind::FileList,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Text,
    Image,
    #[serde(rename = "files")]
    FileList,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Text => "text",
            ItemKind::Image => "image",
            ItemKind::FileList => "files",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(ItemKind::Text),
            "image" => Ok(ItemKind::Image),
            "files" | "file" => Ok(ItemKind::FileList),
            _ => Err(ParseError::ItemKind(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Active,
    Used,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Active => "active",
            ItemStatus::Used => "used",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(ItemStatus::Active),
            "used" => Ok(ItemStatus::Used),
            _ => Err(ParseError::ItemStatus(s.to_string())),
        }
    }
}

/// A continuous run of the capturing process. At most one is open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub closed_at: Option<OffsetDateTime>,
}

impl Session {
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Query {
    pub kind: Option<ItemKind>,
    pub status: Option<ItemStatus>,
    pub favorites_only: bool,
    pub session: Option<SessionId>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn matches(&self, item: &Item) -> bool {
        self.kind.map_or(true, |k| item.kind() == k)
            && self.status.map_or(true, |s| item.status == s)
            && (!self.favorites_only || item.is_favorite)
            && self.session.map_or(true, |s| item.session_id == Some(s))
    }
}

pub trait Store: Send + Sync {
    fn init(&self) -> anyhow::Result<()> {
        Ok(())
    }
    // Ingestion
    fn find_latest_text(&self, text: &str) -> anyhow::Result<Option<Item>>;
    fn create_item(&self, session: SessionId, payload: &Payload) -> anyhow::Result<ItemId>;
    fn increment_occurrence(&self, id: ItemId) -> anyhow::Result<()>;
    // Sessions
    fn current_session(&self) -> anyhow::Result<SessionId>;
    fn close_session(&self) -> anyhow::Result<Option<SessionId>>;
    fn list_sessions(&self) -> anyhow::Result<Vec<Session>>;
    // Browsing
    fn get(&self, id: ItemId) -> anyhow::Result<Option<Item>>;
    fn list(&self, q: Query) -> anyhow::Result<Vec<Item>>;
    fn mark_used(&self, id: ItemId) -> anyhow::Result<()>;
    fn mark_active(&self, id: ItemId) -> anyhow::Result<()>;
    fn favorite(&self, id: ItemId, fav: bool) -> anyhow::Result<()>;
    fn delete(&self, ids: &[ItemId]) -> anyhow::Result<usize>;
    fn clear(&self) -> anyhow::Result<()>;
}

/// In-memory store. Used by tests and as a stand-in when SQLite is compiled out.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<MemState>,
}

#[derive(Default)]
struct MemState {
    items: Vec<Item>,
    sessions: Vec<Session>,
    last_item: ItemId,
    last_session: SessionId,
}

impl MemState {
    fn item_mut(&mut self, id: ItemId) -> anyhow::Result<&mut Item> {
        self.items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| anyhow::anyhow!("no item with id {}", id))
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> anyhow::Result<MutexGuard<'_, MemState>> {
        self.inner
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))
    }
}

impl Store for MemStore {
    fn find_latest_text(&self, text: &str) -> anyhow::Result<Option<Item>> {
        let st = self.state()?;
        Ok(st
            .items
            .iter()
            .filter(|i| i.text() == Some(text))
            .max_by_key(|i| i.id)
            .cloned())
    }

    fn create_item(&self, session: SessionId, payload: &Payload) -> anyhow::Result<ItemId> {
        let created_at = now()?;
        let mut st = self.state()?;
        st.last_item += 1;
        let id = st.last_item;
        st.items.push(Item {
            id,
            session_id: Some(session),
            payload: payload.clone(),
            count: 1,
            status: ItemStatus::Active,
            is_favorite: false,
            created_at,
            last_used_at: None,
        });
        Ok(id)
    }

    fn increment_occurrence(&self, id: ItemId) -> anyhow::Result<()> {
        let mut st = self.state()?;
        st.item_mut(id)?.count += 1;
        Ok(())
    }

    fn current_session(&self) -> anyhow::Result<SessionId> {
        let started_at = now()?;
        let mut st = self.state()?;
        if let Some(open) = st.sessions.iter().rev().find(|s| s.is_open()) {
            return Ok(open.id);
        }
        st.last_session += 1;
        let id = st.last_session;
        st.sessions.push(Session {
            id,
            started_at,
            closed_at: None,
        });
        Ok(id)
    }

    fn close_session(&self) -> anyhow::Result<Option<SessionId>> {
        let closed_at = now()?;
        let mut st = self.state()?;
        let mut closed = None;
        for s in st.sessions.iter_mut().filter(|s| s.is_open()) {
            s.closed_at = Some(closed_at);
            closed = Some(s.id);
        }
        Ok(closed)
    }

    fn list_sessions(&self) -> anyhow::Result<Vec<Session>> {
        Ok(self.state()?.sessions.clone())
    }

    fn get(&self, id: ItemId) -> anyhow::Result<Option<Item>> {
        let st = self.state()?;
        Ok(st.items.iter().find(|i| i.id == id).cloned())
    }

    fn list(&self, q: Query) -> anyhow::Result<Vec<Item>> {
        let st = self.state()?;
        let mut items: Vec<Item> = st.items.iter().filter(|i| q.matches(i)).cloned().collect();
        if let Some(limit) = q.limit {
            items.truncate(limit);
        }
        Ok(items)
    }

    fn mark_used(&self, id: ItemId) -> anyhow::Result<()> {
        let used_at = now()?;
        let mut st = self.state()?;
        let item = st.item_mut(id)?;
        item.status = ItemStatus::Used;
        item.last_used_at = Some(used_at);
        Ok(())
    }

    fn mark_active(&self, id: ItemId) -> anyhow::Result<()> {
        let mut st = self.state()?;
        st.item_mut(id)?.status = ItemStatus::Active;
        Ok(())
    }

    fn favorite(&self, id: ItemId, fav: bool) -> anyhow::Result<()> {
        let mut st = self.state()?;
        st.item_mut(id)?.is_favorite = fav;
        Ok(())
    }

    fn delete(&self, ids: &[ItemId]) -> anyhow::Result<usize> {
        let mut st = self.state()?;
        let before = st.items.len();
        st.items.retain(|i| !ids.contains(&i.id));
        Ok(before - st.items.len())
    }

    fn clear(&self) -> anyhow::Result<()> {
        self.state()?.items.clear();
        Ok(())
    }
}

/// Current time truncated to whole seconds, matching what the SQLite store persists.
pub(crate) fn now() -> anyhow::Result<OffsetDateTime> {
    Ok(OffsetDateTime::from_unix_timestamp(
        OffsetDateTime::now_utc().unix_timestamp(),
    )?)
}

#[cfg(feature = "sqlite")]
mod sqlite_store;

#[cfg(feature = "sqlite")]
pub use sqlite_store::SqliteStore;

#[cfg(feature = "sqlite")]
pub use sqlite_store::SqliteStore as StoreImpl;

#[cfg(not(feature = "sqlite"))]
pub use crate::MemStore as StoreImpl;

#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    pub current: i64,
    pub latest: i64,
    pub pending: Vec<String>,
}

#[cfg(feature = "sqlite")]
pub(crate) fn parse_version_prefix(name: &str) -> Option<u32> {
    let digits: String = name.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse::<u32>().ok()
    }
}

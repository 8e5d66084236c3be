use super::*;
use include_dir::{include_dir, Dir};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

static MIGRATIONS: Dir = include_dir!("$CARGO_MANIFEST_DIR/migrations");

const ITEM_COLUMNS: &str = "id, session_id, kind, text, image_path, paths_json, count, status, is_favorite, created_at, last_used_at";

pub struct SqliteStore {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Self::new_with(path, true)
    }

    pub fn new_with<P: AsRef<Path>>(path: P, auto_migrate: bool) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "foreign_keys", 1)?;
        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        let store = Self {
            path,
            conn: Mutex::new(conn),
        };
        store.init_with(auto_migrate)?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("sqlite connection lock poisoned"))
    }

    fn migration_files() -> Vec<(i64, String, &'static str)> {
        let mut files: Vec<(i64, String, &'static str)> = MIGRATIONS
            .files()
            .filter(|f| f.path().extension().map(|e| e == "sql").unwrap_or(false))
            .filter_map(|f| {
                let stem = f.path().file_stem()?.to_string_lossy().to_string();
                let ver = super::parse_version_prefix(&stem)? as i64;
                Some((ver, stem, f.contents_utf8()?))
            })
            .collect();
        files.sort_by_key(|(ver, _, _)| *ver);
        files
    }

    fn run_migrations(&self, conn: &Connection, auto: bool) -> anyhow::Result<()> {
        let current: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
        for (ver, name, sql) in Self::migration_files() {
            if ver <= current {
                continue;
            }
            // Without auto-migrate a fresh database only gets the base schema.
            if current == 0 && !auto && ver > 1 {
                break;
            }
            let tx = conn.unchecked_transaction()?;
            tx.execute_batch(sql)?;
            tx.execute_batch(&format!("PRAGMA user_version = {}", ver))?;
            tx.commit()?;
            tracing::debug!(version = ver, %name, "applied migration");
        }
        Ok(())
    }

    fn init_with(&self, auto_migrate: bool) -> anyhow::Result<()> {
        let conn = self.conn()?;
        let _ = conn.busy_timeout(std::time::Duration::from_millis(5000));
        self.run_migrations(&conn, auto_migrate)
    }

    pub fn migrate_all(&self) -> anyhow::Result<()> {
        let conn = self.conn()?;
        self.run_migrations(&conn, true)
    }

    pub fn migration_status(&self) -> anyhow::Result<MigrationStatus> {
        let conn = self.conn()?;
        let current: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
        let files = Self::migration_files();
        let latest = files.last().map(|(ver, _, _)| *ver).unwrap_or(0);
        let pending = files
            .into_iter()
            .filter(|(ver, _, _)| *ver > current)
            .map(|(_, name, _)| format!("{}.sql", name))
            .collect();
        Ok(MigrationStatus {
            current,
            latest,
            pending,
        })
    }
}

fn timestamp(ts: i64) -> anyhow::Result<OffsetDateTime> {
    Ok(OffsetDateTime::from_unix_timestamp(ts)?)
}

/// Newest open session, opening one if none is open.
fn open_session(conn: &Connection) -> anyhow::Result<SessionId> {
    let open: Option<SessionId> = conn
        .query_row(
            "SELECT id FROM sessions WHERE closed_at IS NULL ORDER BY id DESC LIMIT 1",
            [],
            |r| r.get(0),
        )
        .optional()?;
    if let Some(id) = open {
        return Ok(id);
    }
    conn.execute(
        "INSERT INTO sessions(started_at) VALUES(?1)",
        params![now()?.unix_timestamp()],
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!(session = id, "opened session");
    Ok(id)
}

fn ensure_changed(changed: usize, id: ItemId) -> anyhow::Result<()> {
    if changed == 0 {
        anyhow::bail!("no item with id {}", id);
    }
    Ok(())
}

struct ItemRow {
    id: ItemId,
    session_id: Option<SessionId>,
    kind: String,
    text: Option<String>,
    image_path: Option<String>,
    paths_json: Option<String>,
    count: i64,
    status: String,
    is_favorite: i64,
    created_at: i64,
    last_used_at: Option<i64>,
}

impl ItemRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            session_id: row.get(1)?,
            kind: row.get(2)?,
            text: row.get(3)?,
            image_path: row.get(4)?,
            paths_json: row.get(5)?,
            count: row.get(6)?,
            status: row.get(7)?,
            is_favorite: row.get(8)?,
            created_at: row.get(9)?,
            last_used_at: row.get(10)?,
        })
    }

    fn into_item(self) -> anyhow::Result<Item> {
        let payload = match self.kind.parse::<ItemKind>()? {
            ItemKind::Text => Payload::Text {
                text: self.text.unwrap_or_default(),
            },
            ItemKind::Image => Payload::Image {
                path: self.image_path.unwrap_or_default(),
            },
            ItemKind::FileList => Payload::Files {
                paths: serde_json::from_str(self.paths_json.as_deref().unwrap_or("[]"))?,
            },
        };
        Ok(Item {
            id: self.id,
            session_id: self.session_id,
            payload,
            count: u32::try_from(self.count)?,
            status: self.status.parse()?,
            is_favorite: self.is_favorite != 0,
            created_at: timestamp(self.created_at)?,
            last_used_at: self.last_used_at.map(timestamp).transpose()?,
        })
    }
}

impl Store for SqliteStore {
    fn find_latest_text(&self, text: &str) -> anyhow::Result<Option<Item>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM items WHERE kind = 'text' AND text = ?1 ORDER BY id DESC LIMIT 1",
            ITEM_COLUMNS
        );
        let row = conn
            .query_row(&sql, params![text], ItemRow::from_row)
            .optional()?;
        row.map(ItemRow::into_item).transpose()
    }

    fn create_item(&self, session: SessionId, payload: &Payload) -> anyhow::Result<ItemId> {
        let (text, image_path, paths_json) = match payload {
            Payload::Text { text } => (Some(text.as_str()), None, None),
            Payload::Image { path } => (None, Some(path.as_str()), None),
            Payload::Files { paths } => (None, None, Some(serde_json::to_string(paths)?)),
        };
        let created_at = now()?.unix_timestamp();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO items(session_id, kind, text, image_path, paths_json, count, status, is_favorite, created_at)
             VALUES(?1, ?2, ?3, ?4, ?5, 1, 'active', 0, ?6)",
            params![session, payload.kind().as_str(), text, image_path, paths_json, created_at],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn increment_occurrence(&self, id: ItemId) -> anyhow::Result<()> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE items SET count = count + 1 WHERE id = ?1",
            params![id],
        )?;
        ensure_changed(n, id)
    }

    fn current_session(&self) -> anyhow::Result<SessionId> {
        let conn = self.conn()?;
        open_session(&conn)
    }

    fn close_session(&self) -> anyhow::Result<Option<SessionId>> {
        let conn = self.conn()?;
        let open: Option<SessionId> = conn
            .query_row(
                "SELECT id FROM sessions WHERE closed_at IS NULL ORDER BY id DESC LIMIT 1",
                [],
                |r| r.get(0),
            )
            .optional()?;
        if open.is_some() {
            conn.execute(
                "UPDATE sessions SET closed_at = ?1 WHERE closed_at IS NULL",
                params![now()?.unix_timestamp()],
            )?;
            tracing::info!(session = ?open, "closed session");
        }
        Ok(open)
    }

    fn list_sessions(&self) -> anyhow::Result<Vec<Session>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, started_at, closed_at FROM sessions ORDER BY id")?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let closed: Option<i64> = row.get(2)?;
            out.push(Session {
                id: row.get(0)?,
                started_at: timestamp(row.get(1)?)?,
                closed_at: closed.map(timestamp).transpose()?,
            });
        }
        Ok(out)
    }

    fn get(&self, id: ItemId) -> anyhow::Result<Option<Item>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM items WHERE id = ?1", ITEM_COLUMNS);
        let row = conn
            .query_row(&sql, params![id], ItemRow::from_row)
            .optional()?;
        row.map(ItemRow::into_item).transpose()
    }

    fn list(&self, q: Query) -> anyhow::Result<Vec<Item>> {
        let conn = self.conn()?;
        let mut sql = format!("SELECT {} FROM items WHERE 1 = 1", ITEM_COLUMNS);
        let mut args: Vec<Value> = Vec::new();
        if let Some(kind) = q.kind {
            args.push(Value::Text(kind.as_str().to_string()));
            sql.push_str(&format!(" AND kind = ?{}", args.len()));
        }
        if let Some(status) = q.status {
            args.push(Value::Text(status.as_str().to_string()));
            sql.push_str(&format!(" AND status = ?{}", args.len()));
        }
        if q.favorites_only {
            sql.push_str(" AND is_favorite = 1");
        }
        if let Some(session) = q.session {
            args.push(Value::Integer(session));
            sql.push_str(&format!(" AND session_id = ?{}", args.len()));
        }
        sql.push_str(" ORDER BY id ASC");
        if let Some(limit) = q.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(args), ItemRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(ItemRow::into_item).collect()
    }

    fn mark_used(&self, id: ItemId) -> anyhow::Result<()> {
        let used_at = now()?.unix_timestamp();
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE items SET status = 'used', last_used_at = ?1 WHERE id = ?2",
            params![used_at, id],
        )?;
        ensure_changed(n, id)
    }

    fn mark_active(&self, id: ItemId) -> anyhow::Result<()> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE items SET status = 'active' WHERE id = ?1",
            params![id],
        )?;
        ensure_changed(n, id)
    }

    fn favorite(&self, id: ItemId, fav: bool) -> anyhow::Result<()> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE items SET is_favorite = ?1 WHERE id = ?2",
            params![if fav { 1 } else { 0 }, id],
        )?;
        ensure_changed(n, id)
    }

    fn delete(&self, ids: &[ItemId]) -> anyhow::Result<usize> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let mut deleted = 0usize;
        for id in ids {
            deleted += tx.execute("DELETE FROM items WHERE id = ?1", params![id])?;
        }
        tx.commit()?;
        Ok(deleted)
    }

    fn clear(&self) -> anyhow::Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM items", [])?;
        Ok(())
    }
}

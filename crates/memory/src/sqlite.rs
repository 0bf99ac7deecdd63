//! SQLite context store.
//!
//! Uses a single SQLite database file with four tables:
//! - `context_entries`: captured text, one row per unique content hash
//! - `channels`: named partitions, upserted on every new entry
//! - `checkpoints`: named snapshots of a channel
//! - `search_index`: one lowercase bag of words per entry
//!
//! Every public operation opens its own connection and drops it when done.
//! Concurrent writers from several processes rely on SQLite's own locking.

use ccom_core::entry::{format_timestamp, parse_timestamp};
use ccom_core::{
    ChannelRecord, ContextEntry, EntryFilter, InsertOutcome, MemoryError, Metadata, NewEntry,
    Priority, SessionContext, StoreStats,
};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqliteRow, SqliteSynchronous,
};
use sqlx::{ConnectOptions, Connection, QueryBuilder, Row, Sqlite};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default number of content characters returned by [`SqliteContextStore::query_by`].
pub const DEFAULT_PREVIEW_CHARS: usize = 400;

/// Schema statements, applied in order on every open.
const SCHEMA: &[(&str, &str)] = &[
    (
        "context_entries table",
        r#"
        CREATE TABLE IF NOT EXISTS context_entries (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp    TEXT NOT NULL,
            session_id   TEXT NOT NULL,
            channel      TEXT NOT NULL,
            content_type TEXT NOT NULL,
            priority     TEXT NOT NULL DEFAULT 'normal',
            content      TEXT NOT NULL,
            metadata     TEXT NOT NULL DEFAULT '{}',
            tags         TEXT NOT NULL DEFAULT '',
            git_branch   TEXT,
            project_name TEXT,
            content_hash TEXT NOT NULL
        )
        "#,
    ),
    (
        "channels table",
        r#"
        CREATE TABLE IF NOT EXISTS channels (
            name         TEXT PRIMARY KEY,
            description  TEXT NOT NULL DEFAULT '',
            git_branch   TEXT,
            project_name TEXT,
            priority     TEXT NOT NULL DEFAULT 'normal',
            metadata     TEXT NOT NULL DEFAULT '{}',
            created_at   TEXT NOT NULL,
            last_used    TEXT NOT NULL
        )
        "#,
    ),
    (
        "checkpoints table",
        r#"
        CREATE TABLE IF NOT EXISTS checkpoints (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT UNIQUE NOT NULL,
            channel     TEXT NOT NULL,
            session_id  TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            snapshot    TEXT NOT NULL,
            metadata    TEXT NOT NULL DEFAULT '{}',
            created_at  TEXT NOT NULL
        )
        "#,
    ),
    (
        "search_index table",
        r#"
        CREATE TABLE IF NOT EXISTS search_index (
            entry_id INTEGER PRIMARY KEY,
            words    TEXT NOT NULL
        )
        "#,
    ),
    (
        "channel index",
        "CREATE INDEX IF NOT EXISTS idx_context_entries_channel ON context_entries(channel)",
    ),
    (
        "timestamp index",
        "CREATE INDEX IF NOT EXISTS idx_context_entries_timestamp ON context_entries(timestamp DESC)",
    ),
    (
        "session index",
        "CREATE INDEX IF NOT EXISTS idx_context_entries_session ON context_entries(session_id)",
    ),
    (
        "content_type index",
        "CREATE INDEX IF NOT EXISTS idx_context_entries_content_type ON context_entries(content_type)",
    ),
    (
        "priority index",
        "CREATE INDEX IF NOT EXISTS idx_context_entries_priority ON context_entries(priority)",
    ),
    (
        "git_branch index",
        "CREATE INDEX IF NOT EXISTS idx_context_entries_git_branch ON context_entries(git_branch)",
    ),
];

/// Unique index backing content-hash deduplication. Created after any
/// leftover duplicates have been removed.
pub(crate) const CONTENT_HASH_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS \
     idx_context_entries_content_hash ON context_entries(content_hash)";

/// The SQLite-backed context store.
pub struct SqliteContextStore {
    options: SqliteConnectOptions,
    path: PathBuf,
    preview_chars: usize,
}

impl SqliteContextStore {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub async fn open(path: &Path) -> Result<Self, MemoryError> {
        let unavailable = |reason: String| MemoryError::Unavailable {
            path: path.to_path_buf(),
            reason,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| unavailable(e.to_string()))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let store = Self {
            options,
            path: path.to_path_buf(),
            preview_chars: DEFAULT_PREVIEW_CHARS,
        };

        let mut conn = store
            .options
            .connect()
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        run_migrations(&mut conn).await?;

        info!("Context store initialized at {}", path.display());
        Ok(store)
    }

    /// Set how many characters of content [`query_by`](Self::query_by) returns.
    pub fn with_preview_chars(mut self, preview_chars: usize) -> Self {
        self.preview_chars = preview_chars;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn preview_chars(&self) -> usize {
        self.preview_chars
    }

    /// Open a short-lived connection for one operation.
    pub(crate) async fn connect(&self) -> Result<SqliteConnection, MemoryError> {
        self.options
            .connect()
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to open SQLite: {e}")))
    }

    /// Insert an entry unless identical content is already stored.
    ///
    /// A genuinely new entry also upserts its channel (advancing
    /// `last_used`) and writes its search-index row, in one transaction.
    pub async fn insert(
        &self,
        ctx: &SessionContext,
        entry: NewEntry,
    ) -> Result<InsertOutcome, MemoryError> {
        let hash = content_hash(&entry.content);
        let timestamp = entry.timestamp.unwrap_or_else(Utc::now);
        let metadata_json = serde_json::to_string(&entry.metadata)?;
        let tags = encode_tags(&entry.tags);

        let mut conn = self.connect().await?;
        let mut tx = conn
            .begin()
            .await
            .map_err(|e| MemoryError::Storage(format!("BEGIN failed: {e}")))?;

        let result = sqlx::query(
            r#"
            INSERT INTO context_entries
                (timestamp, session_id, channel, content_type, priority, content,
                 metadata, tags, git_branch, project_name, content_hash)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(content_hash) DO NOTHING
            "#,
        )
        .bind(format_timestamp(&timestamp))
        .bind(&ctx.session_id)
        .bind(&ctx.channel)
        .bind(&entry.content_type)
        .bind(entry.priority.as_str())
        .bind(&entry.content)
        .bind(&metadata_json)
        .bind(&tags)
        .bind(&ctx.git_branch)
        .bind(&ctx.project_name)
        .bind(&hash)
        .execute(&mut *tx)
        .await
        .map_err(|e| MemoryError::Storage(format!("INSERT failed: {e}")))?;

        if result.rows_affected() == 0 {
            let existing: i64 =
                sqlx::query_scalar("SELECT id FROM context_entries WHERE content_hash = ?1")
                    .bind(&hash)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(|e| MemoryError::QueryFailed(format!("duplicate lookup: {e}")))?;
            debug!("Content already stored as entry {existing}");
            return Ok(InsertOutcome::Duplicate(existing));
        }

        let id = result.last_insert_rowid();
        upsert_channel(&mut tx, ctx, None, Utc::now()).await?;
        write_index(&mut tx, id, &entry.content).await?;

        tx.commit()
            .await
            .map_err(|e| MemoryError::Storage(format!("COMMIT failed: {e}")))?;

        debug!("Stored entry {id} in channel {}", ctx.channel);
        Ok(InsertOutcome::Inserted(id))
    }

    /// Newest-first entries matching `filter`, content cut to the preview length.
    pub async fn query_by(
        &self,
        filter: &EntryFilter,
        limit: usize,
    ) -> Result<Vec<ContextEntry>, MemoryError> {
        let mut conn = self.connect().await?;
        let entries = fetch_entries(&mut conn, filter, Some(limit)).await?;
        Ok(entries
            .iter()
            .map(|e| e.preview(self.preview_chars))
            .collect())
    }

    /// Fetch one entry with its full content.
    pub async fn get(&self, id: i64) -> Result<Option<ContextEntry>, MemoryError> {
        let mut conn = self.connect().await?;
        let row = sqlx::query("SELECT e.* FROM context_entries e WHERE e.id = ?1")
            .bind(id)
            .fetch_optional(&mut conn)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("GET by ID: {e}")))?;

        row.as_ref().map(row_to_entry).transpose()
    }

    /// Total number of stored entries.
    pub async fn count(&self) -> Result<i64, MemoryError> {
        let mut conn = self.connect().await?;
        count_entries(&mut conn).await
    }

    /// Create the context's channel if absent and mark it used now.
    pub async fn touch_channel(
        &self,
        ctx: &SessionContext,
        description: Option<&str>,
    ) -> Result<ChannelRecord, MemoryError> {
        let mut conn = self.connect().await?;
        upsert_channel(&mut conn, ctx, description, Utc::now()).await?;
        fetch_channel(&mut conn, &ctx.channel)
            .await?
            .ok_or_else(|| MemoryError::QueryFailed(format!("channel {} vanished", ctx.channel)))
    }

    pub async fn get_channel(&self, name: &str) -> Result<Option<ChannelRecord>, MemoryError> {
        let mut conn = self.connect().await?;
        fetch_channel(&mut conn, name).await
    }

    /// All channels, most recently used first.
    pub async fn list_channels(&self) -> Result<Vec<ChannelRecord>, MemoryError> {
        let mut conn = self.connect().await?;
        fetch_channels(&mut conn).await
    }

    pub async fn stats(&self) -> Result<StoreStats, MemoryError> {
        let mut conn = self.connect().await?;
        fetch_stats(&mut conn).await
    }
}

/// Create tables and indexes. Safe to run on every open.
async fn run_migrations(conn: &mut SqliteConnection) -> Result<(), MemoryError> {
    for (label, sql) in SCHEMA {
        sqlx::query(sql)
            .execute(&mut *conn)
            .await
            .map_err(|e| MemoryError::MigrationFailed(format!("{label}: {e}")))?;
    }

    // A database copied from an older layout may hold duplicate hashes,
    // which would make the unique index fail.
    let repaired = crate::consolidate::delete_hash_duplicates(conn)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("duplicate repair: {e}")))?;
    if !repaired.removed_ids.is_empty() {
        info!(
            "Removed {} duplicate entries before indexing content hashes",
            repaired.removed_ids.len()
        );
    }

    sqlx::query(CONTENT_HASH_INDEX)
        .execute(&mut *conn)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("content_hash index: {e}")))?;

    debug!("SQLite migrations complete");
    Ok(())
}

/// Insert or touch the context's channel row.
pub(crate) async fn upsert_channel(
    conn: &mut SqliteConnection,
    ctx: &SessionContext,
    description: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), MemoryError> {
    let now = format_timestamp(&now);
    sqlx::query(
        r#"
        INSERT INTO channels
            (name, description, git_branch, project_name, priority, metadata, created_at, last_used)
        VALUES (?1, ?2, ?3, ?4, 'normal', '{}', ?5, ?5)
        ON CONFLICT(name) DO UPDATE SET
            last_used = excluded.last_used,
            description = CASE
                WHEN excluded.description != '' THEN excluded.description
                ELSE channels.description
            END
        "#,
    )
    .bind(&ctx.channel)
    .bind(description.unwrap_or_default())
    .bind(&ctx.git_branch)
    .bind(&ctx.project_name)
    .bind(&now)
    .execute(&mut *conn)
    .await
    .map_err(|e| MemoryError::Storage(format!("channel upsert: {e}")))?;
    Ok(())
}

/// Replace an entry's search-index row.
pub(crate) async fn write_index(
    conn: &mut SqliteConnection,
    entry_id: i64,
    content: &str,
) -> Result<(), MemoryError> {
    sqlx::query("INSERT OR REPLACE INTO search_index (entry_id, words) VALUES (?1, ?2)")
        .bind(entry_id)
        .bind(index_words(content))
        .execute(&mut *conn)
        .await
        .map_err(|e| MemoryError::Storage(format!("search index write: {e}")))?;
    Ok(())
}

/// Delete entries and their search-index rows.
pub(crate) async fn delete_entries(
    conn: &mut SqliteConnection,
    ids: &[i64],
) -> Result<u64, MemoryError> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM search_index WHERE entry_id IN (");
    let mut list = qb.separated(", ");
    for id in ids {
        list.push_bind(*id);
    }
    list.push_unseparated(")");
    qb.build()
        .execute(&mut *conn)
        .await
        .map_err(|e| MemoryError::Storage(format!("search index delete: {e}")))?;

    let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM context_entries WHERE id IN (");
    let mut list = qb.separated(", ");
    for id in ids {
        list.push_bind(*id);
    }
    list.push_unseparated(")");
    let result = qb
        .build()
        .execute(&mut *conn)
        .await
        .map_err(|e| MemoryError::Storage(format!("DELETE failed: {e}")))?;

    Ok(result.rows_affected())
}

/// Append `AND ...` clauses for every constraint set in `filter`.
/// Assumes the entries table is aliased `e`.
pub(crate) fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &EntryFilter) {
    if let Some(channel) = &filter.channel {
        qb.push(" AND e.channel = ").push_bind(channel.clone());
    }
    if let Some(priority) = filter.priority {
        qb.push(" AND e.priority = ").push_bind(priority.as_str());
    }
    if let Some(content_type) = &filter.content_type {
        qb.push(" AND e.content_type = ").push_bind(content_type.clone());
    }
    if let Some(branch) = &filter.git_branch {
        qb.push(" AND e.git_branch = ").push_bind(branch.clone());
    }
    if let Some(since) = &filter.since {
        qb.push(" AND e.timestamp >= ").push_bind(format_timestamp(since));
    }
}

/// Entries matching `filter`, newest first, full content.
pub(crate) async fn fetch_entries(
    conn: &mut SqliteConnection,
    filter: &EntryFilter,
    limit: Option<usize>,
) -> Result<Vec<ContextEntry>, MemoryError> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT e.* FROM context_entries e WHERE 1 = 1");
    push_filter(&mut qb, filter);
    qb.push(" ORDER BY e.timestamp DESC, e.id DESC");
    if let Some(limit) = limit {
        qb.push(" LIMIT ").push_bind(limit as i64);
    }

    let rows = qb
        .build()
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("entry listing: {e}")))?;

    rows.iter().map(row_to_entry).collect()
}

pub(crate) async fn count_entries(conn: &mut SqliteConnection) -> Result<i64, MemoryError> {
    sqlx::query_scalar("SELECT COUNT(*) FROM context_entries")
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("COUNT: {e}")))
}

pub(crate) async fn fetch_channel(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Option<ChannelRecord>, MemoryError> {
    let row = sqlx::query("SELECT * FROM channels WHERE name = ?1")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("channel lookup: {e}")))?;

    row.as_ref().map(row_to_channel).transpose()
}

pub(crate) async fn fetch_channels(
    conn: &mut SqliteConnection,
) -> Result<Vec<ChannelRecord>, MemoryError> {
    let rows = sqlx::query("SELECT * FROM channels ORDER BY last_used DESC, name")
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("channel listing: {e}")))?;

    rows.iter().map(row_to_channel).collect()
}

pub(crate) async fn fetch_stats(conn: &mut SqliteConnection) -> Result<StoreStats, MemoryError> {
    let total_entries = count_entries(conn).await?;
    let total_channels: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM channels")
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("channel count: {e}")))?;
    let total_checkpoints: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM checkpoints")
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("checkpoint count: {e}")))?;

    let mut stats = StoreStats {
        total_entries,
        total_channels,
        total_checkpoints,
        ..StoreStats::default()
    };

    for column in ["channel", "content_type", "priority"] {
        let sql = format!(
            "SELECT {column} AS bucket, COUNT(*) AS cnt FROM context_entries GROUP BY {column}"
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("{column} breakdown: {e}")))?;

        let target = match column {
            "channel" => &mut stats.by_channel,
            "content_type" => &mut stats.by_content_type,
            _ => &mut stats.by_priority,
        };
        for row in &rows {
            let bucket: String = row
                .try_get("bucket")
                .map_err(|e| MemoryError::QueryFailed(format!("{column} bucket: {e}")))?;
            let cnt: i64 = row
                .try_get("cnt")
                .map_err(|e| MemoryError::QueryFailed(format!("{column} count: {e}")))?;
            target.insert(bucket, cnt);
        }
    }

    stats.database_size_bytes = sqlx::query_scalar::<_, i64>(
        "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
    )
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| MemoryError::QueryFailed(format!("database size: {e}")))?;

    Ok(stats)
}

/// Parse a `ContextEntry` from a SQLite row.
///
/// Malformed metadata degrades to an empty object rather than failing the row.
pub(crate) fn row_to_entry(row: &SqliteRow) -> Result<ContextEntry, MemoryError> {
    let column = |name: &str, e: sqlx::Error| MemoryError::QueryFailed(format!("{name} column: {e}"));

    let id: i64 = row.try_get("id").map_err(|e| column("id", e))?;
    let timestamp: String = row.try_get("timestamp").map_err(|e| column("timestamp", e))?;
    let session_id: String = row.try_get("session_id").map_err(|e| column("session_id", e))?;
    let channel: String = row.try_get("channel").map_err(|e| column("channel", e))?;
    let content_type: String = row
        .try_get("content_type")
        .map_err(|e| column("content_type", e))?;
    let priority: String = row.try_get("priority").map_err(|e| column("priority", e))?;
    let content: String = row.try_get("content").map_err(|e| column("content", e))?;
    let metadata: String = row.try_get("metadata").map_err(|e| column("metadata", e))?;
    let tags: String = row.try_get("tags").map_err(|e| column("tags", e))?;
    let git_branch: Option<String> = row.try_get("git_branch").map_err(|e| column("git_branch", e))?;
    let project_name: Option<String> = row
        .try_get("project_name")
        .map_err(|e| column("project_name", e))?;
    let content_hash: String = row
        .try_get("content_hash")
        .map_err(|e| column("content_hash", e))?;

    Ok(ContextEntry {
        id,
        timestamp: stored_timestamp(&timestamp, "entry", id),
        session_id,
        channel,
        content_type,
        priority: Priority::parse_lenient(&priority),
        content,
        metadata: decode_metadata(&metadata, id),
        tags: decode_tags(&tags),
        git_branch,
        project_name,
        content_hash,
    })
}

fn row_to_channel(row: &SqliteRow) -> Result<ChannelRecord, MemoryError> {
    let column = |name: &str, e: sqlx::Error| MemoryError::QueryFailed(format!("{name} column: {e}"));

    let name: String = row.try_get("name").map_err(|e| column("name", e))?;
    let description: String = row.try_get("description").map_err(|e| column("description", e))?;
    let git_branch: Option<String> = row.try_get("git_branch").map_err(|e| column("git_branch", e))?;
    let project_name: Option<String> = row
        .try_get("project_name")
        .map_err(|e| column("project_name", e))?;
    let priority: String = row.try_get("priority").map_err(|e| column("priority", e))?;
    let metadata: String = row.try_get("metadata").map_err(|e| column("metadata", e))?;
    let created_at: String = row.try_get("created_at").map_err(|e| column("created_at", e))?;
    let last_used: String = row.try_get("last_used").map_err(|e| column("last_used", e))?;
    let created_at = stored_timestamp(&created_at, "channel", &name);
    let last_used = stored_timestamp(&last_used, "channel", &name);
    let metadata = serde_json::from_str(&metadata).unwrap_or_else(|e| {
        debug!("Channel {name} has malformed metadata ({e}); using empty object");
        Metadata::new()
    });

    Ok(ChannelRecord {
        name,
        description,
        git_branch,
        project_name,
        priority: Priority::parse_lenient(&priority),
        metadata,
        created_at,
        last_used,
    })
}

/// Parse a stored timestamp. Unreadable values fall back to the Unix epoch
/// so a corrupt row sorts as oldest.
pub(crate) fn stored_timestamp(
    raw: &str,
    kind: &str,
    key: impl std::fmt::Display,
) -> DateTime<Utc> {
    parse_timestamp(raw).unwrap_or_else(|| {
        warn!("{kind} {key} has unreadable timestamp {raw:?}; using the Unix epoch");
        DateTime::<Utc>::UNIX_EPOCH
    })
}

fn decode_metadata(raw: &str, entry_id: i64) -> Metadata {
    match serde_json::from_str(raw) {
        Ok(metadata) => metadata,
        Err(e) => {
            debug!("Entry {entry_id} has malformed metadata ({e}); using empty object");
            Metadata::new()
        }
    }
}

/// SHA-256 of the raw content, lowercase hex.
pub fn content_hash(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

/// Tags are stored comma-joined; commas inside a tag are dropped.
pub(crate) fn encode_tags(tags: &[String]) -> String {
    let mut seen = HashSet::new();
    tags.iter()
        .map(|t| t.replace(',', "").trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect::<Vec<_>>()
        .join(",")
}

pub(crate) fn decode_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Lowercased whitespace tokens, first occurrence order, no repeats.
pub(crate) fn index_words(content: &str) -> String {
    let lower = content.to_lowercase();
    let mut seen = HashSet::new();
    lower
        .split_whitespace()
        .filter(|w| seen.insert(*w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// A `LIKE` pattern matching `needle` anywhere, with wildcards escaped.
/// Use with `ESCAPE '\'`.
pub(crate) fn like_contains(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

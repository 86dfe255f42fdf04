//! Local embedded backend: one SQLite file holding the `comments` table.

use std::{collections::HashMap, fs, path::Path, sync::Arc};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension, Row};

use crate::{
    comment::{AuthorKind, Comment, CommentId},
    moderation::CommentStatus,
    storage::{CommentBackend, CommentFilter, CommentInsert, CommentPatch, ParentFilter},
};

/// Table created on open. Replies reference their parent by id; cascading is
/// decided by the repository, not by a foreign key.
const COMMENTS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS comments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    page_id TEXT NOT NULL,
    nickname TEXT NOT NULL,
    content TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    rating INTEGER NOT NULL DEFAULT 5,
    parent_id INTEGER,
    author_kind TEXT NOT NULL DEFAULT 'visitor',
    ip_address TEXT,
    user_agent TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_comments_page_status ON comments(page_id, status);
CREATE INDEX IF NOT EXISTS idx_comments_parent ON comments(parent_id);
";

const COMMENT_COLUMNS: &str = "id, page_id, nickname, content, status, rating, parent_id, \
                               author_kind, ip_address, user_agent, created_at, updated_at";

/// [`CommentBackend`] over a single SQLite connection.
///
/// Statements run on tokio's blocking pool; the connection is shared behind
/// a mutex so each call sees a consistent view.
#[derive(Clone)]
pub struct SqliteCommentBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCommentBackend {
    /// Opens (or creates) the database file and ensures the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open comments database {}", path.display()))?;
        Self::from_connection(conn)
    }

    /// Private in-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(COMMENTS_SCHEMA)
            .context("failed to create comments table")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await
        .context("sqlite worker task failed")?
    }
}

#[async_trait]
impl CommentBackend for SqliteCommentBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn insert(&self, row: CommentInsert) -> Result<Comment> {
        self.with_conn(move |conn| {
            let created_at = row.created_at.timestamp_millis();
            conn.execute(
                "INSERT INTO comments (page_id, nickname, content, status, rating, parent_id, \
                 author_kind, ip_address, user_agent, created_at, updated_at) VALUES (?1, ?2, ?3, \
                 ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
                params![
                    row.page_id,
                    row.nickname,
                    row.content,
                    row.status.as_str(),
                    i64::from(row.rating),
                    row.parent_id.map(CommentId::value),
                    row.author_kind.as_str(),
                    row.ip_address,
                    row.user_agent,
                    created_at,
                ],
            )
            .context("failed to insert comment")?;
            let id = CommentId(conn.last_insert_rowid());
            Ok(row.into_comment(id))
        })
        .await
    }

    async fn get(&self, id: CommentId) -> Result<Option<Comment>> {
        self.with_conn(move |conn| fetch_one(conn, id)).await
    }

    async fn select(&self, filter: &CommentFilter) -> Result<Vec<Comment>> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            let (where_clause, mut values) = build_where(&filter);
            let mut sql = format!(
                "SELECT {COMMENT_COLUMNS} FROM comments{where_clause} ORDER BY created_at DESC, \
                 id ASC"
            );
            if let Some(limit) = filter.limit {
                sql.push_str(" LIMIT ?");
                values.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
            }

            let mut stmt = conn.prepare(&sql).context("failed to prepare comment query")?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), read_raw_row)
                .context("failed to query comments")?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("failed to read comment rows")?;
            rows.into_iter().map(RawCommentRow::into_comment).collect()
        })
        .await
    }

    async fn update(&self, id: CommentId, patch: CommentPatch) -> Result<Option<Comment>> {
        self.with_conn(move |conn| {
            let tx = conn.transaction().context("failed to begin comment update")?;
            let changed = tx
                .execute(
                    "UPDATE comments SET status = COALESCE(?1, status), content = COALESCE(?2, \
                     content), updated_at = ?3 WHERE id = ?4",
                    params![
                        patch.status.map(CommentStatus::as_str),
                        patch.content,
                        patch.updated_at.timestamp_millis(),
                        id.value(),
                    ],
                )
                .context("failed to update comment")?;
            if changed == 0 {
                return Ok(None);
            }
            let updated = fetch_one(&tx, id)?;
            tx.commit().context("failed to commit comment update")?;
            Ok(updated)
        })
        .await
    }

    async fn delete(&self, ids: &[CommentId]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids = ids.to_vec();
        self.with_conn(move |conn| {
            let sql = format!("DELETE FROM comments WHERE id IN ({})", placeholders(ids.len()));
            let deleted = conn
                .execute(&sql, params_from_iter(ids.iter().map(|id| id.value())))
                .context("failed to delete comments")?;
            Ok(deleted)
        })
        .await
    }

    async fn status_counts(&self, page_id: Option<&str>) -> Result<HashMap<CommentStatus, usize>> {
        let page_id = page_id.map(str::to_string);
        self.with_conn(move |conn| {
            let mut values = Vec::new();
            let mut sql = "SELECT status, COUNT(*) FROM comments".to_string();
            if let Some(page_id) = page_id {
                sql.push_str(" WHERE page_id = ?");
                values.push(Value::Text(page_id));
            }
            sql.push_str(" GROUP BY status");

            let mut stmt = conn.prepare(&sql).context("failed to prepare status count")?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })
                .context("failed to count comments")?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("failed to read status counts")?;

            let mut counts = HashMap::new();
            for (status, count) in rows {
                match status.parse::<CommentStatus>() {
                    Ok(status) => {
                        *counts.entry(status).or_insert(0) += usize::try_from(count).unwrap_or(0);
                    },
                    Err(err) => tracing::warn!("skipping comments with {err}"),
                }
            }
            Ok(counts)
        })
        .await
    }
}

struct RawCommentRow {
    id: i64,
    page_id: String,
    nickname: String,
    content: String,
    status: String,
    rating: i64,
    parent_id: Option<i64>,
    author_kind: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl RawCommentRow {
    fn into_comment(self) -> Result<Comment> {
        Ok(Comment {
            id: CommentId(self.id),
            page_id: self.page_id,
            nickname: self.nickname,
            content: self.content,
            rating: self.rating.clamp(1, 5) as u8,
            status: self
                .status
                .parse()
                .with_context(|| format!("comment {} has a corrupt status", self.id))?,
            parent_id: self.parent_id.map(CommentId),
            author_kind: self.author_kind.parse().unwrap_or(AuthorKind::Visitor),
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            created_at: millis_to_utc(self.created_at)?,
            updated_at: millis_to_utc(self.updated_at)?,
        })
    }
}

fn read_raw_row(row: &Row<'_>) -> rusqlite::Result<RawCommentRow> {
    Ok(RawCommentRow {
        id: row.get("id")?,
        page_id: row.get("page_id")?,
        nickname: row.get("nickname")?,
        content: row.get("content")?,
        status: row.get("status")?,
        rating: row.get("rating")?,
        parent_id: row.get("parent_id")?,
        author_kind: row.get("author_kind")?,
        ip_address: row.get("ip_address")?,
        user_agent: row.get("user_agent")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn fetch_one(conn: &Connection, id: CommentId) -> Result<Option<Comment>> {
    let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?1");
    let raw = conn
        .query_row(&sql, params![id.value()], read_raw_row)
        .optional()
        .with_context(|| format!("failed to load comment {id}"))?;
    raw.map(RawCommentRow::into_comment).transpose()
}

fn build_where(filter: &CommentFilter) -> (String, Vec<Value>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut values = Vec::new();

    if let Some(page_id) = &filter.page_id {
        clauses.push("page_id = ?".to_string());
        values.push(Value::Text(page_id.clone()));
    }
    if let Some(status) = filter.status {
        clauses.push("status = ?".to_string());
        values.push(Value::Text(status.as_str().to_string()));
    }
    match &filter.parent {
        ParentFilter::Any => {},
        ParentFilter::TopLevel => clauses.push("parent_id IS NULL".to_string()),
        ParentFilter::Replies => clauses.push("parent_id IS NOT NULL".to_string()),
        ParentFilter::ChildOf(ids) if ids.is_empty() => clauses.push("0".to_string()),
        ParentFilter::ChildOf(ids) => {
            clauses.push(format!("parent_id IN ({})", placeholders(ids.len())));
            values.extend(ids.iter().map(|id| Value::Integer(id.value())));
        },
    }

    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), values)
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn millis_to_utc(value: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(value)
        .with_context(|| format!("timestamp out of range: {value}"))
}

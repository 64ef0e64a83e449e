//! SQLite implementation of the CommentSource port.

use crate::domain::{Comment, CommentId};
use crate::ports::CommentSource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;

const COLUMNS: &str =
    "id, parent_comment_id, top_level_comment_id, base_score, author, body, posted_at";

pub struct SqliteCommentSource {
    conn: Mutex<Connection>,
    initial: usize,
}

impl SqliteCommentSource {
    /// Open a comment database. The initial batch is the `initial`
    /// best-scored top-level comments.
    pub fn open(path: &Path, initial: usize) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open comment database: {}", path.display()))?;
        Self::with_connection(conn, initial)
    }

    pub fn with_connection(conn: Connection, initial: usize) -> Result<Self> {
        // Initialize schema
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS comments (
                id TEXT PRIMARY KEY,
                parent_comment_id TEXT,
                top_level_comment_id TEXT,
                base_score REAL NOT NULL DEFAULT 0,
                author TEXT NOT NULL DEFAULT '',
                body TEXT NOT NULL DEFAULT '',
                posted_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_comments_parent
                ON comments(parent_comment_id);
            ",
        )
        .context("Failed to initialize comment schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
            initial,
        })
    }

    /// Insert or replace one comment.
    pub fn upsert(&self, comment: &Comment) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO comments
                (id, parent_comment_id, top_level_comment_id, base_score, author, body, posted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            (
                comment.id.as_str(),
                comment.parent_comment_id.as_ref().map(CommentId::as_str),
                comment.top_level_comment_id.as_ref().map(CommentId::as_str),
                comment.base_score,
                &comment.author,
                &comment.body,
                comment.posted_at,
            ),
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("comment database lock poisoned"))
    }

    fn map_comment(row: &Row<'_>) -> rusqlite::Result<Comment> {
        Ok(Comment {
            id: CommentId(row.get(0)?),
            parent_comment_id: row.get::<_, Option<String>>(1)?.map(CommentId),
            top_level_comment_id: row.get::<_, Option<String>>(2)?.map(CommentId),
            base_score: row.get(3)?,
            author: row.get(4)?,
            body: row.get(5)?,
            posted_at: row.get(6)?,
        })
    }

    fn query(&self, sql: &str, limit: usize) -> Result<Vec<Comment>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        // SQLite limits are signed
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let comments = stmt
            .query_map((limit,), Self::map_comment)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read comments")?;
        Ok(comments)
    }
}

#[async_trait]
impl CommentSource for SqliteCommentSource {
    async fn initial_comments(&self) -> Result<Vec<Comment>> {
        // Best threads first, insertion order on ties
        self.query(
            &format!(
                "SELECT {COLUMNS} FROM comments
                 WHERE parent_comment_id IS NULL
                 ORDER BY base_score DESC, rowid
                 LIMIT ?1"
            ),
            self.initial,
        )
    }

    async fn load_all(&self, limit: usize) -> Result<Vec<Comment>> {
        // Oldest first
        self.query(
            &format!("SELECT {COLUMNS} FROM comments ORDER BY posted_at, rowid LIMIT ?1"),
            limit,
        )
    }

    async fn fetch_comment(&self, id: &CommentId) -> Result<Option<Comment>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM comments WHERE id = ?1"))?;
        let comment = stmt
            .query_row((id.as_str(),), Self::map_comment)
            .optional()
            .with_context(|| format!("Failed to fetch comment {id}"))?;
        Ok(comment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn source_with(comments: &[Comment], initial: usize) -> SqliteCommentSource {
        let source =
            SqliteCommentSource::with_connection(Connection::open_in_memory().unwrap(), initial)
                .unwrap();
        for comment in comments {
            source.upsert(comment).unwrap();
        }
        source
    }

    fn posted(mut comment: Comment, minute: u32) -> Comment {
        comment.posted_at = Some(Utc.with_ymd_and_hms(2024, 5, 1, 9, minute, 0).unwrap());
        comment
    }

    fn sample() -> Vec<Comment> {
        vec![
            posted(Comment::new("low", None, None).with_score(1.0), 3),
            posted(Comment::new("high", None, None).with_score(8.0), 2),
            posted(Comment::new("reply", Some("high"), Some("high")), 1),
        ]
    }

    #[tokio::test]
    async fn initial_batch_is_best_top_level() {
        let source = source_with(&sample(), 1);
        let initial = source.initial_comments().await.unwrap();
        assert_eq!(initial.len(), 1);
        assert_eq!(initial[0].id.as_str(), "high");
    }

    #[tokio::test]
    async fn bulk_load_is_chronological_and_limited() {
        let source = source_with(&sample(), 0);
        let ids: Vec<String> = source
            .load_all(2)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id.0)
            .collect();
        assert_eq!(ids, vec!["reply", "high"]);
    }

    #[tokio::test]
    async fn round_trips_structural_fields() {
        let source = source_with(&sample(), 0);
        let reply = source
            .fetch_comment(&CommentId::from("reply"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply, sample()[2]);
        assert!(source
            .fetch_comment(&CommentId::from("missing"))
            .await
            .unwrap()
            .is_none());
    }
}

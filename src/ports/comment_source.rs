//! Comment source port (trait).
//! Defines where comments come from without coupling to any backend.

use crate::domain::{Comment, CommentId};
use anyhow::Result;
use async_trait::async_trait;

/// Port for fetching comments.
/// Implementations may read a file, a database, a remote API, or be test fakes.
#[async_trait]
pub trait CommentSource: Send + Sync {
    /// Comments shown when the pool is first created.
    async fn initial_comments(&self) -> Result<Vec<Comment>>;

    /// Fetch up to `limit` comments in one batch.
    ///
    /// May return duplicates of comments already known, replies to comments
    /// in the same batch, or replies whose parent is never returned.
    async fn load_all(&self, limit: usize) -> Result<Vec<Comment>>;

    /// Re-fetch one comment. `None` if the source no longer has it.
    async fn fetch_comment(&self, id: &CommentId) -> Result<Option<Comment>>;
}

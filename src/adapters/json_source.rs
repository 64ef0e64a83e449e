//! JSON file implementation of the CommentSource port.

use crate::domain::{Comment, CommentId};
use crate::ports::CommentSource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Reads a JSON array of comments. The first `initial` entries are the
/// initial batch; the file is re-read on every fetch so edits show up on
/// invalidation.
pub struct JsonCommentSource {
    path: PathBuf,
    initial: usize,
}

impl JsonCommentSource {
    pub fn new(path: &Path, initial: usize) -> Self {
        Self {
            path: path.to_path_buf(),
            initial,
        }
    }

    fn read(&self) -> Result<Vec<Comment>> {
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read comments: {}", self.path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse comments: {}", self.path.display()))
    }
}

#[async_trait]
impl CommentSource for JsonCommentSource {
    async fn initial_comments(&self) -> Result<Vec<Comment>> {
        let mut comments = self.read()?;
        comments.truncate(self.initial);
        Ok(comments)
    }

    async fn load_all(&self, limit: usize) -> Result<Vec<Comment>> {
        let mut comments = self.read()?;
        comments.truncate(limit);
        Ok(comments)
    }

    async fn fetch_comment(&self, id: &CommentId) -> Result<Option<Comment>> {
        Ok(self.read()?.into_iter().find(|c| &c.id == id))
    }
}

//! Pure data types for the comment-thread domain.
//! No I/O; serde derives only describe how comments arrive from a source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a comment. Opaque to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(pub String);

impl CommentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A comment as supplied by the data source. Read-only to this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: CommentId,
    #[serde(default)]
    pub parent_comment_id: Option<CommentId>,
    /// Root of the thread. Sources commonly leave this unset on top-level
    /// comments themselves.
    #[serde(default)]
    pub top_level_comment_id: Option<CommentId>,
    #[serde(default)]
    pub base_score: f64,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub posted_at: Option<DateTime<Utc>>,
}

impl Comment {
    /// Bare comment with only the structural fields set.
    pub fn new(id: impl Into<String>, parent: Option<&str>, top_level: Option<&str>) -> Self {
        Self {
            id: CommentId::new(id),
            parent_comment_id: parent.map(CommentId::from),
            top_level_comment_id: top_level.map(CommentId::from),
            base_score: 0.0,
            author: String::new(),
            body: String::new(),
            posted_at: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.base_score = score;
        self
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_comment_id.is_none()
    }

    /// Id of the thread root this comment belongs to; its own id when top-level.
    pub fn thread_root_id(&self) -> &CommentId {
        self.top_level_comment_id.as_ref().unwrap_or(&self.id)
    }

    /// First line of the body, for single-line display.
    pub fn summary(&self) -> &str {
        self.body.lines().next().unwrap_or(&self.body)
    }
}

/// A node in a reconstructed comment forest.
///
/// `item` is `None` for a placeholder: an ancestor that something refers to
/// but that has not been loaded.
///
/// Reply chains can be thousands of levels deep, so cloning, comparing and
/// dropping walk the tree with an explicit stack instead of recursing.
#[derive(Debug)]
pub struct TreeNode {
    pub id: CommentId,
    pub item: Option<Comment>,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn is_placeholder(&self) -> bool {
        self.item.is_none()
    }
}

impl Clone for TreeNode {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            item: self.item.clone(),
            children: clone_forest(&self.children),
        }
    }
}

/// Copy a forest in post-order: a node is built once all its children are.
fn clone_forest(forest: &[TreeNode]) -> Vec<TreeNode> {
    let mut built: Vec<TreeNode> = Vec::new();
    let mut stack: Vec<(&TreeNode, bool)> = forest.iter().rev().map(|n| (n, false)).collect();
    while let Some((node, children_done)) = stack.pop() {
        if children_done {
            let children = built.split_off(built.len() - node.children.len());
            built.push(TreeNode {
                id: node.id.clone(),
                item: node.item.clone(),
                children,
            });
        } else {
            stack.push((node, true));
            stack.extend(node.children.iter().rev().map(|child| (child, false)));
        }
    }
    built
}

impl PartialEq for TreeNode {
    fn eq(&self, other: &Self) -> bool {
        let mut pairs = vec![(self, other)];
        while let Some((a, b)) = pairs.pop() {
            if a.id != b.id || a.item != b.item || a.children.len() != b.children.len() {
                return false;
            }
            pairs.extend(a.children.iter().zip(&b.children));
        }
        true
    }
}

impl Drop for TreeNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Whether a pooled comment is currently shown. Only ever moves to `Visible`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Visibility {
    #[default]
    Hidden,
    Visible,
}

/// How a visible comment is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Expansion {
    #[default]
    Default,
    Expanded,
    Truncated,
    SingleLine,
    SingleLineGroupable,
}

impl Expansion {
    pub fn is_single_line(self) -> bool {
        matches!(self, Expansion::SingleLine | Expansion::SingleLineGroupable)
    }
}

impl fmt::Display for Expansion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Expansion::Default => "default",
            Expansion::Expanded => "expanded",
            Expansion::Truncated => "truncated",
            Expansion::SingleLine => "single-line",
            Expansion::SingleLineGroupable => "single-line-groupable",
        };
        f.write_str(name)
    }
}

//! Hand-tuned thresholds for how much of a thread each reveal surfaces.

use serde::{Deserialize, Serialize};

/// Most comments requested by the one-time bulk load.
pub const DEFAULT_BULK_LOAD_LIMIT: usize = 5000;
/// Top-level comments revealed per "load more".
pub const DEFAULT_TOP_LEVEL_BATCH: usize = 10;
/// Replies revealed per "show more replies".
pub const DEFAULT_CHILDREN_BATCH: usize = 10;
/// Replies revealed alongside each newly revealed top-level comment.
pub const DEFAULT_CHILDREN_WITH_TOP_LEVEL: usize = 2;
/// Replies revealed when a single-line comment is opened up.
pub const DEFAULT_CHILDREN_ON_EXPAND: usize = 5;

/// Reveal sizes used by a [`CommentPool`](super::CommentPool).
/// Any field may be overridden from configuration; the rest keep defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolLimits {
    pub bulk_load_limit: usize,
    pub top_level_batch: usize,
    pub children_batch: usize,
    pub children_with_top_level: usize,
    pub children_on_expand: usize,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            bulk_load_limit: DEFAULT_BULK_LOAD_LIMIT,
            top_level_batch: DEFAULT_TOP_LEVEL_BATCH,
            children_batch: DEFAULT_CHILDREN_BATCH,
            children_with_top_level: DEFAULT_CHILDREN_WITH_TOP_LEVEL,
            children_on_expand: DEFAULT_CHILDREN_ON_EXPAND,
        }
    }
}

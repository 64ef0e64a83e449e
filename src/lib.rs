//! comment-pool - incremental comment-thread reconstruction and disclosure
//!
//! Rebuilds reply trees from partially loaded, flat comment lists, collapses
//! single-reply chains, and keeps a pool of discovered comments whose
//! visibility and expansion evolve as more of a discussion is revealed.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod outline;
pub mod pool;
pub mod ports;

pub use domain::{build_tree, group_thread, Comment, CommentId, Expansion, TreeNode, Visibility};
pub use pool::{CommentPool, PoolLimits, PoolOperation, PoolState};
pub use ports::CommentSource;

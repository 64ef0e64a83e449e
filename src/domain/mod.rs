//! Pure comment-thread logic.
//! No I/O - all functions are data in, data out.

pub mod grouping;
pub mod tree;
pub mod types;

pub use grouping::{group_thread, GroupedThread, MIN_GROUP_LENGTH};
pub use tree::{build_tree, count_descendants, find_node, flatten, same_shape};
pub use types::{Comment, CommentId, Expansion, TreeNode, Visibility};

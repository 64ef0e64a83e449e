//! Mutable pool of discovered comments and their display state.

pub mod limits;
pub mod state;
pub mod store;

pub use limits::PoolLimits;
pub use state::{PoolEntry, PoolState};
pub use store::{CommentPool, ListenerId, PoolOperation};

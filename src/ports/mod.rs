pub mod comment_source;

pub use comment_source::CommentSource;

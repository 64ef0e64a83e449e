pub mod json_source;
pub mod sqlite_source;

pub use json_source::JsonCommentSource;
pub use sqlite_source::SqliteCommentSource;

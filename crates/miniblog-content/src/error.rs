use thiserror::Error;

/// Errors that can occur during content operations.
#[derive(Debug, Error)]
pub enum ContentError {
    /// The requested post does not exist.
    #[error("post not found: {id}")]
    PostNotFound { id: i64 },

    /// Input rejected before touching the database.
    #[error("invalid input: {0}")]
    Invalid(String),

    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, ContentError>;

use thiserror::Error;

/// Errors that can occur during memory operations.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// No fact with the given id exists.
    #[error("memory not found: {id}")]
    NotFound { id: String },

    /// The caller supplied an unusable argument.
    #[error("invalid memory {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The database directory could not be created.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MemoryError>;

use thiserror::Error;

/// Errors that can occur during conversation persistence.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The requested conversation does not exist in the database.
    #[error("conversation not found: {id}")]
    NotFound { id: String },

    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored payload could not be decoded as JSON.
    #[error("payload decode error: {0}")]
    Payload(#[from] serde_json::Error),

    /// The database directory could not be created.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HistoryError>;

use serde::Serialize;

/// A stored fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Memory {
    /// Monotonically-allocated row id; also the FTS content rowid.
    pub doc_id: i64,
    /// User-chosen unique identifier.
    pub id: String,
    pub content: String,
}

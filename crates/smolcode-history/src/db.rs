use rusqlite::Connection;

use crate::error::Result;

/// Initialise the conversation tables. Safe to call on every open — uses
/// `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS conversations (
            id         TEXT PRIMARY KEY,
            created_at TIMESTAMP
        );
        CREATE TABLE IF NOT EXISTS messages (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            conversation_id TEXT NOT NULL REFERENCES conversations(id),
            sequence_number INTEGER NOT NULL,
            payload         BLOB NOT NULL,
            created_at      TIMESTAMP,
            UNIQUE(conversation_id, sequence_number)
        );
        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, sequence_number);",
    )?;
    Ok(())
}

use rusqlite::Connection;

use crate::error::Result;

/// Initialise the memory tables. Safe to call on every startup (idempotent).
///
/// The FTS5 index is an external-content table over `memories(content)`,
/// kept synchronized by triggers so every write path — including raw SQL —
/// maintains the invariant that an index row exists iff its memory row does.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS memories (
            docid   INTEGER PRIMARY KEY AUTOINCREMENT,
            id      TEXT UNIQUE NOT NULL,
            content TEXT NOT NULL
        );
        CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts
            USING fts5(content, content='memories', content_rowid='docid');
        CREATE TRIGGER IF NOT EXISTS memories_fts_insert
            AFTER INSERT ON memories BEGIN
                INSERT INTO memories_fts(rowid, content)
                VALUES (new.docid, new.content);
            END;
        CREATE TRIGGER IF NOT EXISTS memories_fts_delete
            AFTER DELETE ON memories BEGIN
                INSERT INTO memories_fts(memories_fts, rowid, content)
                VALUES ('delete', old.docid, old.content);
            END;
        CREATE TRIGGER IF NOT EXISTS memories_fts_update
            AFTER UPDATE ON memories BEGIN
                INSERT INTO memories_fts(memories_fts, rowid, content)
                VALUES ('delete', old.docid, old.content);
                INSERT INTO memories_fts(rowid, content)
                VALUES (new.docid, new.content);
            END;",
    )?;
    Ok(())
}

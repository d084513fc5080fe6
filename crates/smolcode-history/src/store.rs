use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use crate::db;
use crate::error::{HistoryError, Result};
use crate::types::{Conversation, ConversationSummary, Message};

/// Store for persisted conversations.
///
/// Opens a fresh connection per operation; the schema is declared
/// idempotently at every open.
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    /// Create a store rooted at the given database file. The parent
    /// directory is created if absent; the schema is verified immediately.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self { path: path.into() };
        store.connect()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let conn = Connection::open(&self.path)?;
        db::init_db(&conn)?;
        Ok(conn)
    }

    /// Allocate a new conversation: fresh id, empty message list. Nothing
    /// is written until the first `save`.
    pub fn new_conversation(&self) -> Conversation {
        Conversation {
            id: Uuid::now_v7().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            messages: Vec::new(),
        }
    }

    /// Persist the whole conversation: replace every message row for this
    /// id in one transaction, re-numbering from zero.
    pub fn save(&self, conversation: &Conversation) -> Result<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT OR IGNORE INTO conversations (id, created_at) VALUES (?1, ?2)",
            rusqlite::params![conversation.id, conversation.created_at],
        )?;
        tx.execute(
            "DELETE FROM messages WHERE conversation_id = ?1",
            rusqlite::params![conversation.id],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO messages (conversation_id, sequence_number, payload, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (i, msg) in conversation.messages.iter().enumerate() {
                let payload = serde_json::to_vec(&msg.payload)?;
                stmt.execute(rusqlite::params![
                    conversation.id,
                    i as i64,
                    payload,
                    msg.created_at,
                ])?;
            }
        }

        tx.commit()?;
        debug!(
            id = %conversation.id,
            messages = conversation.messages.len(),
            "conversation saved"
        );
        Ok(())
    }

    /// Load a conversation with its messages in sequence order.
    pub fn load(&self, id: &str) -> Result<Conversation> {
        let conn = self.connect()?;

        let created_at: String = match conn.query_row(
            "SELECT created_at FROM conversations WHERE id = ?1",
            rusqlite::params![id],
            |row| row.get(0),
        ) {
            Ok(t) => t,
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                return Err(HistoryError::NotFound { id: id.to_string() })
            }
            Err(e) => return Err(HistoryError::Database(e)),
        };

        let mut stmt = conn.prepare(
            "SELECT sequence_number, payload, created_at
             FROM messages
             WHERE conversation_id = ?1
             ORDER BY sequence_number ASC",
        )?;
        let rows = stmt.query_map(rusqlite::params![id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;

        let mut numbered: Vec<(i64, Message)> = Vec::new();
        for row in rows {
            let (seq, payload, created_at) = row?;
            numbered.push((
                seq,
                Message {
                    payload: serde_json::from_slice(&payload)?,
                    created_at: created_at.unwrap_or_default(),
                },
            ));
        }
        // The query already orders by sequence number; sort again so a
        // writer that interleaved sequence numbers cannot scramble the log.
        numbered.sort_by_key(|(seq, _)| *seq);

        Ok(Conversation {
            id: id.to_string(),
            created_at,
            messages: numbered.into_iter().map(|(_, m)| m).collect(),
        })
    }

    /// Metadata for every stored conversation, newest first.
    pub fn list(&self) -> Result<Vec<ConversationSummary>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT c.id, c.created_at, COUNT(m.id), MAX(m.created_at)
             FROM conversations c
             LEFT JOIN messages m ON m.conversation_id = c.id
             GROUP BY c.id
             ORDER BY c.created_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ConversationSummary {
                id: row.get(0)?,
                created_at: row.get(1)?,
                message_count: row.get::<_, i64>(2)? as u64,
                latest_message_time: row.get(3)?,
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// The id with the largest `created_at`, for `--continue latest`.
    pub fn latest_id(&self) -> Result<String> {
        let conn = self.connect()?;
        match conn.query_row(
            "SELECT id FROM conversations ORDER BY created_at DESC LIMIT 1",
            [],
            |row| row.get(0),
        ) {
            Ok(id) => Ok(id),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(HistoryError::NotFound {
                id: "latest".to_string(),
            }),
            Err(e) => Err(HistoryError::Database(e)),
        }
    }

    /// Append a plain user text message to a stored conversation. Used by
    /// the `history append` subcommand.
    pub fn append_user_text(&self, id: &str, text: &str) -> Result<()> {
        let mut conversation = self.load(id)?;
        conversation.append(serde_json::json!({
            "role": "user",
            "parts": [{ "text": text }],
        }));
        self.save(&conversation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, HistoryStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = HistoryStore::open(dir.path().join("history.db")).expect("open");
        (dir, store)
    }

    #[test]
    fn save_then_load_preserves_order_and_payloads() {
        let (_dir, store) = store();
        let mut convo = store.new_conversation();
        for i in 0..5 {
            convo.append(serde_json::json!({ "role": "user", "parts": [{ "text": format!("msg {i}") }] }));
        }
        store.save(&convo).expect("save");

        let loaded = store.load(&convo.id).expect("load");
        assert_eq!(loaded.messages.len(), 5);
        for (i, msg) in loaded.messages.iter().enumerate() {
            assert_eq!(
                msg.payload["parts"][0]["text"],
                serde_json::json!(format!("msg {i}"))
            );
        }
    }

    #[test]
    fn save_is_replace_all() {
        let (_dir, store) = store();
        let mut convo = store.new_conversation();
        convo.append(serde_json::json!({ "text": "one" }));
        store.save(&convo).expect("first save");
        convo.append(serde_json::json!({ "text": "two" }));
        store.save(&convo).expect("second save");

        let loaded = store.load(&convo.id).expect("load");
        assert_eq!(loaded.messages.len(), 2);
    }

    #[test]
    fn load_unknown_id_is_not_found() {
        let (_dir, store) = store();
        match store.load("no-such-id") {
            Err(HistoryError::NotFound { id }) => assert_eq!(id, "no-such-id"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn latest_id_on_empty_store_is_not_found() {
        let (_dir, store) = store();
        assert!(matches!(
            store.latest_id(),
            Err(HistoryError::NotFound { .. })
        ));
    }

    #[test]
    fn latest_id_returns_newest_conversation() {
        let (_dir, store) = store();
        let mut first = store.new_conversation();
        first.created_at = "2026-01-01T00:00:00Z".into();
        store.save(&first).expect("save first");
        let mut second = store.new_conversation();
        second.created_at = "2026-02-01T00:00:00Z".into();
        store.save(&second).expect("save second");

        assert_eq!(store.latest_id().expect("latest"), second.id);
    }

    #[test]
    fn list_reports_counts_and_latest_time() {
        let (_dir, store) = store();
        let mut convo = store.new_conversation();
        convo.append(serde_json::json!({ "text": "hello" }));
        convo.append(serde_json::json!({ "text": "world" }));
        store.save(&convo).expect("save");

        let summaries = store.list().expect("list");
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].message_count, 2);
        assert!(summaries[0].latest_message_time.is_some());
    }

    #[test]
    fn append_user_text_extends_stored_log() {
        let (_dir, store) = store();
        let convo = store.new_conversation();
        store.save(&convo).expect("save");
        store
            .append_user_text(&convo.id, "added later")
            .expect("append");

        let loaded = store.load(&convo.id).expect("load");
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(
            loaded.messages[0].payload["parts"][0]["text"],
            serde_json::json!("added later")
        );
    }
}

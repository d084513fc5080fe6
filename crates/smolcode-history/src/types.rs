use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single persisted message. The payload is the JSON-serialized content
/// value exactly as the agent appended it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub payload: Value,
    /// RFC3339 timestamp of when the message was appended.
    pub created_at: String,
}

impl Message {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// An in-memory conversation: identity plus the ordered message log.
///
/// Mutated append-only by the agent; the store replaces all rows for this
/// id on save, so sequence numbers are always contiguous 0..N-1 on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    /// RFC3339 creation timestamp.
    pub created_at: String,
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn append(&mut self, payload: Value) {
        self.messages.push(Message::new(payload));
    }
}

/// Listing row for `history list`.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub id: String,
    pub created_at: String,
    pub message_count: u64,
    pub latest_message_time: Option<String>,
}

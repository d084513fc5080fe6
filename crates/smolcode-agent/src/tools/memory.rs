//! Memory tools — persist and recall facts across sessions.
//!
//! Three tools over the shared `MemoryStore`:
//! - `create_memory` — upsert a batch of facts.
//! - `recall_memory` — fetch by id, or full-text search by topic.
//! - `forget_memory` — delete a batch of facts; unknown ids are ignored.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use smolcode_memory::{MemoryError, MemoryStore};

use super::{output, parse_args, Tool, ToolArgs, ToolError, ToolOutput};

/// Cap on matches returned by a recall search; further hits are reported by
/// id only.
const MAX_RECALLED: usize = 5;

// ---------------------------------------------------------------------------
// create_memory
// ---------------------------------------------------------------------------

pub struct CreateMemoryTool {
    store: Arc<MemoryStore>,
}

impl CreateMemoryTool {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[derive(Deserialize)]
struct CreateArgs {
    facts: Vec<FactArg>,
}

#[derive(Deserialize)]
struct FactArg {
    id: String,
    fact: String,
}

#[async_trait]
impl Tool for CreateMemoryTool {
    fn name(&self) -> &str {
        "create_memory"
    }

    fn description(&self) -> &str {
        "Save facts to persistent memory for future sessions. Each fact has \
         a stable id (e.g. 'build_command') and free-text content. Existing \
         facts with the same id are overwritten."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "facts": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": {
                                "type": "string",
                                "description": "Stable identifier for the fact."
                            },
                            "fact": {
                                "type": "string",
                                "description": "The fact text to remember."
                            }
                        },
                        "required": ["id", "fact"]
                    }
                }
            },
            "required": ["facts"]
        })
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let args: CreateArgs = parse_args(args)?;
        let mut created = Vec::with_capacity(args.facts.len());
        for fact in &args.facts {
            self.store
                .add(&fact.id, &fact.fact)
                .map_err(|e| ToolError::Failed(e.to_string()))?;
            created.push(fact.id.clone());
        }
        Ok(output(serde_json::json!({ "created": created })))
    }
}

// ---------------------------------------------------------------------------
// recall_memory
// ---------------------------------------------------------------------------

pub struct RecallMemoryTool {
    store: Arc<MemoryStore>,
}

impl RecallMemoryTool {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[derive(Deserialize)]
struct RecallArgs {
    #[serde(rename = "factID", default)]
    fact_id: Option<String>,
    #[serde(default)]
    about: Option<String>,
}

#[async_trait]
impl Tool for RecallMemoryTool {
    fn name(&self) -> &str {
        "recall_memory"
    }

    fn description(&self) -> &str {
        "Recall facts from persistent memory. Pass factID for an exact \
         lookup, or about for a full-text search. factID wins when both are \
         present."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "factID": {
                    "type": "string",
                    "description": "Exact id of the fact to recall."
                },
                "about": {
                    "type": "string",
                    "description": "Free-text topic to search for."
                }
            }
        })
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let args: RecallArgs = parse_args(args)?;

        if let Some(id) = args.fact_id.filter(|id| !id.is_empty()) {
            let memory = self.store.get(&id).map_err(|e| match e {
                MemoryError::NotFound { id } => ToolError::Failed(format!("no fact with id '{id}'")),
                other => ToolError::Failed(other.to_string()),
            })?;
            return Ok(output(serde_json::json!({
                "id": memory.id,
                "fact": memory.content,
            })));
        }

        let about = args.about.unwrap_or_default();
        if about.trim().is_empty() {
            return Err(ToolError::InvalidInput {
                field: "about",
                reason: "pass factID or a non-empty about query".to_string(),
            });
        }

        let hits = self
            .store
            .search(&about)
            .map_err(|e| ToolError::Failed(e.to_string()))?;

        let matches: Vec<Value> = hits
            .iter()
            .take(MAX_RECALLED)
            .map(|m| serde_json::json!({ "id": m.id, "fact": m.content }))
            .collect();

        let mut result = serde_json::json!({ "matches": matches });
        if hits.len() > MAX_RECALLED {
            let remaining: Vec<&str> = hits[MAX_RECALLED..].iter().map(|m| m.id.as_str()).collect();
            result["remaining_ids"] = serde_json::json!(remaining);
        }
        Ok(output(result))
    }
}

// ---------------------------------------------------------------------------
// forget_memory
// ---------------------------------------------------------------------------

pub struct ForgetMemoryTool {
    store: Arc<MemoryStore>,
}

impl ForgetMemoryTool {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[derive(Deserialize)]
struct ForgetArgs {
    #[serde(rename = "factIDs")]
    fact_ids: Vec<String>,
}

#[async_trait]
impl Tool for ForgetMemoryTool {
    fn name(&self) -> &str {
        "forget_memory"
    }

    fn description(&self) -> &str {
        "Delete facts from persistent memory by id. Ids that do not exist \
         are ignored."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "factIDs": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Ids of the facts to forget."
                }
            },
            "required": ["factIDs"]
        })
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let args: ForgetArgs = parse_args(args)?;
        let mut forgotten = Vec::new();
        for id in &args.fact_ids {
            match self.store.forget(id) {
                Ok(()) => forgotten.push(id.clone()),
                Err(MemoryError::NotFound { .. }) => {}
                Err(e) => return Err(ToolError::Failed(e.to_string())),
            }
        }
        Ok(output(serde_json::json!({ "forgotten": forgotten })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::open_in_memory().unwrap())
    }

    fn args(json: Value) -> ToolArgs {
        json.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn create_then_recall_by_id() {
        let store = store();
        let created = CreateMemoryTool::new(store.clone())
            .execute(args(serde_json::json!({
                "facts": [{ "id": "lang", "fact": "Go" }]
            })))
            .await
            .unwrap();
        assert_eq!(created["created"], serde_json::json!(["lang"]));

        let recalled = RecallMemoryTool::new(store)
            .execute(args(serde_json::json!({ "factID": "lang" })))
            .await
            .unwrap();
        assert_eq!(recalled["fact"], "Go");
    }

    #[tokio::test]
    async fn fact_id_takes_precedence_over_about() {
        let store = store();
        store.add("alpha", "first fact").unwrap();
        store.add("beta", "second fact").unwrap();

        let recalled = RecallMemoryTool::new(store)
            .execute(args(serde_json::json!({
                "factID": "alpha",
                "about": "second",
            })))
            .await
            .unwrap();
        assert_eq!(recalled["id"], "alpha");
    }

    #[tokio::test]
    async fn search_results_are_capped_with_remaining_ids() {
        let store = store();
        for i in 0..8 {
            store.add(&format!("fact-{i}"), "rust tooling note").unwrap();
        }

        let recalled = RecallMemoryTool::new(store)
            .execute(args(serde_json::json!({ "about": "rust" })))
            .await
            .unwrap();
        assert_eq!(recalled["matches"].as_array().unwrap().len(), MAX_RECALLED);
        assert_eq!(recalled["remaining_ids"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn forget_ignores_unknown_ids() {
        let store = store();
        store.add("keep", "something").unwrap();
        store.add("drop", "something else").unwrap();

        let out = ForgetMemoryTool::new(store.clone())
            .execute(args(serde_json::json!({
                "factIDs": ["drop", "never-existed"]
            })))
            .await
            .unwrap();
        assert_eq!(out["forgotten"], serde_json::json!(["drop"]));
        assert!(store.get("keep").is_ok());
    }

    #[tokio::test]
    async fn recall_without_parameters_is_invalid_input() {
        let err = RecallMemoryTool::new(store())
            .execute(ToolArgs::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput { field: "about", .. }));
    }
}

//! Tool system for model tool calling.
//!
//! Defines the `Tool` trait that all tools implement, plus a registry for
//! managing available tools and flattening them into the declaration list
//! the model API expects. Tool arguments arrive as the raw name→value map
//! from the model; each tool converts that map into a typed argument record
//! before doing any work.

pub mod edit_file;
pub mod git;
pub mod list_files;
pub mod memory;
pub mod plan;
pub mod read_file;
pub mod run_command;
pub mod search_code;
pub mod write_file;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::FunctionDeclaration;
use crate::schema::adapt_schema;

/// The name→value mapping a tool receives and returns.
pub type ToolArgs = Map<String, Value>;
pub type ToolOutput = Map<String, Value>;

/// Errors a tool can produce. The agent converts these into function
/// responses of the form `{error: "<tool>: <message>"}` so the model can
/// recover.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A parameter was missing or had the wrong shape. Names the field.
    #[error("invalid parameter {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    /// The tool ran and failed.
    #[error("{0}")]
    Failed(String),

    /// An underlying filesystem or process operation failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Trait that all tools must implement.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name for this tool (e.g. "read_file").
    fn name(&self) -> &str;
    /// Human-readable description of what this tool does.
    fn description(&self) -> &str;
    /// JSON Schema for the tool's input parameters.
    fn input_schema(&self) -> Value;
    /// Execute the tool with the given argument map.
    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError>;
}

/// Registry of available tools, looked up by exact name.
///
/// Read-only after construction; the agent holds it for the session.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A later registration under the same name replaces
    /// the earlier one.
    pub fn add(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Flatten the registry into the declaration list sent to the model,
    /// with each parameter schema normalized for the vendor's decoder.
    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        let mut declarations: Vec<FunctionDeclaration> = self
            .tools
            .values()
            .map(|t| FunctionDeclaration {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: adapt_schema(t.input_schema()),
            })
            .collect();
        declarations.sort_by(|a, b| a.name.cmp(&b.name));
        declarations
    }
}

/// Deserialize an argument map into a typed record. serde's error message
/// names the offending field.
pub fn parse_args<T: serde::de::DeserializeOwned>(args: ToolArgs) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(args)).map_err(|e| ToolError::InvalidInput {
        field: "arguments",
        reason: e.to_string(),
    })
}

/// Build a tool output map from a JSON object literal.
pub fn output(value: Value) -> ToolOutput {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("result".to_string(), other);
            map
        }
    }
}

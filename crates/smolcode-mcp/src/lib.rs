//! MCP tool adapter — exposes tools from an external JSON-RPC tool server
//! as local tools in the registry.
//!
//! Handshake per server: `initialize` → `notifications/initialized` →
//! `tools/list`. Each discovered descriptor becomes a local tool whose
//! invocation issues `tools/call {name, arguments}` and returns the
//! server's structured reply verbatim.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use smolcode_agent::tools::{Tool, ToolArgs, ToolError, ToolOutput};
use smolcode_rpc::{RpcClient, RpcError, StdioTransport};

const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("rpc error: {0}")]
    Rpc(#[from] RpcError),

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("invalid MCP server spec '{0}' (expected id:command)")]
    InvalidSpec(String),
}

/// Split a `--mcp id:command` flag value into its parts.
pub fn parse_server_spec(spec: &str) -> Result<(String, String), McpError> {
    match spec.split_once(':') {
        Some((id, command)) if !id.trim().is_empty() && !command.trim().is_empty() => {
            Ok((id.trim().to_string(), command.trim().to_string()))
        }
        _ => Err(McpError::InvalidSpec(spec.to_string())),
    }
}

/// A remote tool descriptor from `tools/list`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpToolDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_schema")]
    pub input_schema: Value,
}

fn default_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

#[derive(Debug, Deserialize)]
struct ToolsListResult {
    tools: Vec<McpToolDef>,
}

/// One connected tool server.
pub struct McpServer {
    pub id: String,
    client: RpcClient,
    tools: Vec<McpToolDef>,
}

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer")
            .field("id", &self.id)
            .field("tools", &self.tools)
            .finish()
    }
}

impl McpServer {
    /// Spawn `command` (whitespace-split program + args), run the
    /// handshake, and discover tools. A failure at any step leaves no
    /// usable server; the caller logs and omits it.
    pub async fn connect(id: &str, command: &str) -> Result<Self, McpError> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| McpError::InvalidSpec(format!("{id}:{command}")))?;
        let args: Vec<String> = parts.map(String::from).collect();

        let transport = Arc::new(StdioTransport::spawn(program, &args)?);
        let client = RpcClient::new(transport);
        client.listen();

        let init = client
            .call(
                "initialize",
                Some(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "smolcode",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                })),
            )
            .await?;
        debug!(server = id, ?init, "initialize complete");

        client.notify("notifications/initialized", None).await?;

        let raw = client.call("tools/list", None).await?;
        let listed: ToolsListResult = serde_json::from_value(raw)
            .map_err(|e| McpError::Protocol(format!("bad tools/list result: {e}")))?;

        info!(server = id, tools = listed.tools.len(), "MCP server connected");
        Ok(Self {
            id: id.to_string(),
            client,
            tools: listed.tools,
        })
    }

    /// Local tool wrappers for every discovered remote tool. Names are
    /// prefixed with the server id to avoid registry collisions.
    pub fn tools(&self) -> Vec<Arc<dyn Tool>> {
        self.tools
            .iter()
            .map(|def| {
                Arc::new(McpTool {
                    local_name: format!("{}_{}", self.id, def.name),
                    remote_name: def.name.clone(),
                    description: def.description.clone(),
                    input_schema: def.input_schema.clone(),
                    client: self.client.clone(),
                }) as Arc<dyn Tool>
            })
            .collect()
    }

    pub async fn shutdown(&self) {
        self.client.close().await;
    }
}

/// A registry entry backed by a remote server.
struct McpTool {
    local_name: String,
    remote_name: String,
    description: String,
    input_schema: Value,
    client: RpcClient,
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.local_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        self.input_schema.clone()
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let result = self
            .client
            .call(
                "tools/call",
                Some(json!({
                    "name": self.remote_name,
                    "arguments": Value::Object(args),
                })),
            )
            .await
            .map_err(|e| ToolError::Failed(e.to_string()))?;

        // The server's structured reply passes through verbatim.
        match result {
            Value::Object(map) => Ok(map),
            other => {
                warn!(tool = %self.local_name, "non-object tool result, wrapping");
                let mut map = Map::new();
                map.insert("result".to_string(), other);
                Ok(map)
            }
        }
    }
}

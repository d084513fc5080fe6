//! Model client interface.
//!
//! The vendor SDK is out of scope; this module pins down exactly the
//! request/response shape the agent needs: generate a completion over a
//! content list, and manage server-side cached prompt prefixes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use smolcode_core::content::Content;

/// A tool declaration in the shape the model API expects, with its
/// parameter schema already normalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// One completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ModelRequest {
    pub model: String,
    /// Omitted when `cached_content` is set — the cache already carries it.
    pub system_instruction: Option<String>,
    pub contents: Vec<Content>,
    /// Omitted when `cached_content` is set.
    pub tools: Vec<FunctionDeclaration>,
    /// Server-side cache name covering system instruction, tools, and a
    /// history prefix.
    pub cached_content: Option<String>,
    pub max_output_tokens: u32,
}

/// The single candidate content the agent consumes, if any.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub content: Option<Content>,
}

/// Request to create a cached prompt prefix.
#[derive(Debug, Clone, Serialize)]
pub struct CacheRequest {
    pub model: String,
    pub system_instruction: String,
    pub tools: Vec<FunctionDeclaration>,
    pub contents: Vec<Content>,
    pub ttl_secs: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl ModelError {
    /// Transient server-class failures are worth the retry schedule;
    /// anything else surfaces immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            ModelError::Api { status, .. } => *status == 429 || *status >= 500,
            ModelError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ModelError::Parse(_) | ModelError::Cancelled => false,
        }
    }
}

/// Interface the agent loop drives. One implementation speaks to the real
/// API; tests substitute their own.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError>;

    /// Create a cached prompt prefix, returning its server-side name.
    async fn create_cache(&self, request: &CacheRequest) -> Result<String, ModelError>;

    /// Best-effort delete of a cache entry.
    async fn delete_cache(&self, name: &str) -> Result<(), ModelError>;
}

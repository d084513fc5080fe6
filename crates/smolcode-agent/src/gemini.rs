//! Gemini implementation of the model client.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use smolcode_core::content::Content;

use crate::model::{CacheRequest, ModelClient, ModelError, ModelRequest, ModelResponse};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value, ModelError> {
        let resp = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "model API error");
            return Err(ModelError::Api {
                status,
                message: text,
            });
        }

        resp.json().await.map_err(|e| ModelError::Parse(e.to_string()))
    }
}

fn system_instruction_value(text: &str) -> Value {
    json!({ "parts": [{ "text": text }] })
}

fn build_generate_body(request: &ModelRequest) -> Value {
    let mut body = json!({
        "contents": request.contents,
        "generationConfig": { "maxOutputTokens": request.max_output_tokens },
    });
    if let Some(cache) = &request.cached_content {
        body["cachedContent"] = Value::String(cache.clone());
    } else {
        if let Some(system) = &request.system_instruction {
            body["systemInstruction"] = system_instruction_value(system);
        }
        if !request.tools.is_empty() {
            body["tools"] = json!([{ "functionDeclarations": request.tools }]);
        }
    }
    body
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, request.model
        );
        debug!(model = %request.model, cached = request.cached_content.is_some(), "sending generate request");

        let raw = self.post(&url, &build_generate_body(request)).await?;
        let parsed: ApiResponse =
            serde_json::from_value(raw).map_err(|e| ModelError::Parse(e.to_string()))?;

        Ok(ModelResponse {
            content: parsed.candidates.into_iter().next().and_then(|c| c.content),
        })
    }

    async fn create_cache(&self, request: &CacheRequest) -> Result<String, ModelError> {
        let url = format!("{}/v1beta/cachedContents", self.base_url);
        let body = json!({
            "model": format!("models/{}", request.model),
            "systemInstruction": system_instruction_value(&request.system_instruction),
            "tools": [{ "functionDeclarations": request.tools }],
            "contents": request.contents,
            "ttl": format!("{}s", request.ttl_secs),
        });
        debug!(model = %request.model, contents = request.contents.len(), "creating cached content");

        let raw = self.post(&url, &body).await?;
        raw.get("name")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| ModelError::Parse("cachedContents response without name".to_string()))
    }

    async fn delete_cache(&self, name: &str) -> Result<(), ModelError> {
        let url = format!("{}/v1beta/{}", self.base_url, name);
        let resp = self
            .client
            .delete(&url)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status,
                message: text,
            });
        }
        Ok(())
    }
}

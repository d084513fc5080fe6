//! The agent loop — the turn state machine coordinating user, model, and
//! tools.
//!
//! Flow: read input → model → if function calls → run tools → inject
//! results → model → repeat. Returns to the prompt on a text-only
//! response. Every append batch is persisted so a crash loses at most the
//! turn in flight.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use smolcode_core::content::{Content, FunctionCall, Part, Role};
use smolcode_history::{Conversation, HistoryStore};

use crate::model::{CacheRequest, ModelClient, ModelError, ModelRequest, ModelResponse};
use crate::snapshot;
use crate::tools::{ToolOutput, ToolRegistry};

/// Fixed backoff schedule for transient model failures; five attempts
/// total.
const RETRY_DELAYS_SECS: [u64; 5] = [5, 10, 15, 30, 30];
const MAX_ATTEMPTS: usize = 5;

/// The vendor rejects caches below a minimum size, so small histories are
/// sent explicitly.
const MIN_CACHE_CHARS: usize = 32_768;
const CACHE_TTL_SECS: u64 = 600;

const SYSTEM_INSTRUCTION: &str = "\
You are smolcode, a coding assistant running in the user's terminal. \
Use the available tools to read, edit, and search the project, run \
commands, manage plans, and remember facts. Prefer small, verifiable \
steps; check in with the user when a decision is theirs to make. Keep \
answers short — this is a terminal.";

const HELP: &str = "\
/help      show this help
/tools     list available tools
/trace     dump raw model requests and responses
/no-trace  stop dumping raw traffic
/reload    rebuild and restart, carrying the session over";

/// Where the loop gets user lines from. `None` means end of stream.
#[async_trait]
pub trait InputSource: Send {
    async fn read_line(&mut self) -> Option<String>;
}

/// Where the loop renders to. The tracer is passive: implementations must
/// never fail the turn.
pub trait Ui: Send {
    fn model_text(&mut self, text: &str);
    fn tool_call(&mut self, name: &str, args: &Map<String, Value>);
    fn tool_error(&mut self, name: &str, message: &str);
    fn notice(&mut self, message: &str);
    fn trace(&mut self, label: &str, payload: &Value);
}

/// How a session ended.
#[derive(Debug)]
pub enum AgentExit {
    /// Input reached end of stream.
    Quit { snapshot: Option<PathBuf> },
    /// The user asked for `/reload`; the launcher rebuilds and re-execs
    /// with this snapshot.
    Restart { snapshot: PathBuf },
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The model kept failing through the whole retry schedule.
    #[error("model unavailable: {0}")]
    Model(#[from] ModelError),
}

/// A server-side cached prompt prefix and how much history it covers.
struct PromptCache {
    name: String,
    prefix_len: usize,
}

pub struct Agent {
    model: Box<dyn ModelClient>,
    model_name: String,
    max_output_tokens: u32,
    registry: Arc<ToolRegistry>,
    store: HistoryStore,
    conversation: Conversation,
    /// Typed view of `conversation.messages`, in the same order.
    history: Vec<Content>,
    cache: Option<PromptCache>,
    trace_enabled: bool,
    snapshot_prefix: String,
}

impl Agent {
    pub fn new(
        model: Box<dyn ModelClient>,
        model_name: String,
        max_output_tokens: u32,
        registry: Arc<ToolRegistry>,
        store: HistoryStore,
        conversation: Conversation,
        snapshot_prefix: String,
    ) -> Self {
        let history = conversation
            .messages
            .iter()
            .filter_map(|m| match serde_json::from_value(m.payload.clone()) {
                Ok(content) => Some(content),
                Err(e) => {
                    warn!(error = %e, "skipping undecodable message payload");
                    None
                }
            })
            .collect();
        Self {
            model,
            model_name,
            max_output_tokens,
            registry,
            store,
            conversation,
            history,
            cache: None,
            trace_enabled: false,
            snapshot_prefix,
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation.id
    }

    pub fn history(&self) -> &[Content] {
        &self.history
    }

    /// Replace the session history with snapshot contents (reload path).
    pub fn restore_history(&mut self, contents: Vec<Content>) {
        self.conversation.messages.clear();
        for content in &contents {
            if let Ok(value) = serde_json::to_value(content) {
                self.conversation.append(value);
            }
        }
        self.history = contents;
        self.cache = None;
    }

    /// Run until the input source ends or the user requests a restart.
    pub async fn run(
        &mut self,
        input: &mut dyn InputSource,
        ui: &mut dyn Ui,
    ) -> Result<AgentExit, AgentError> {
        loop {
            let Some(line) = input.read_line().await else {
                return Ok(AgentExit::Quit {
                    snapshot: self.write_snapshot(),
                });
            };
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }

            match line.as_str() {
                "/trace" => {
                    self.trace_enabled = true;
                    ui.notice("tracing enabled");
                    continue;
                }
                "/no-trace" => {
                    self.trace_enabled = false;
                    ui.notice("tracing disabled");
                    continue;
                }
                "/help" => {
                    ui.notice(HELP);
                    continue;
                }
                "/tools" => {
                    ui.notice(&self.registry.names().join("\n"));
                    continue;
                }
                "/reload" => match self.write_snapshot() {
                    // A failed snapshot must not lose the session; stay put.
                    Some(path) => return Ok(AgentExit::Restart { snapshot: path }),
                    None => {
                        ui.notice("could not write a snapshot; staying in this session");
                        continue;
                    }
                },
                _ => {}
            }

            self.append(Content::user_text(line));
            self.persist();

            if let Err(e) = self.exchange(ui).await {
                // Retries exhausted: snapshot what we have and exit.
                let _ = self.write_snapshot();
                return Err(e);
            }
        }
    }

    /// Drive the model until it answers with a text-only response, running
    /// tools between rounds.
    async fn exchange(&mut self, ui: &mut dyn Ui) -> Result<(), AgentError> {
        loop {
            self.refresh_cache().await;
            let request = self.build_request();
            if self.trace_enabled {
                if let Ok(v) = serde_json::to_value(&request) {
                    ui.trace("request", &v);
                }
            }

            let response = match self.generate_with_retry(&request, ui).await {
                Ok(r) => r,
                Err(ModelError::Cancelled) => {
                    ui.notice("model call cancelled");
                    return Ok(());
                }
                Err(e) if e.is_retryable() => return Err(AgentError::Model(e)),
                Err(e) => {
                    // Invalid request or similar: show it and resume the
                    // prompt so the user can steer.
                    ui.notice(&format!("model error: {e}"));
                    return Ok(());
                }
            };

            let Some(content) = response.content else {
                ui.notice("the model returned no content; try rephrasing");
                return Ok(());
            };
            if self.trace_enabled {
                if let Ok(v) = serde_json::to_value(&content) {
                    ui.trace("response", &v);
                }
            }
            if content.is_empty() {
                ui.notice("the model returned an empty response; try rephrasing");
                return Ok(());
            }

            let content = Content {
                role: Role::Model,
                parts: content.parts,
            };
            self.append(content.clone());
            self.persist();

            let mut ran_tools = false;
            for part in &content.parts {
                if let Some(text) = part.text.as_deref() {
                    if !text.is_empty() {
                        ui.model_text(text);
                    }
                }
                if let Some(call) = &part.function_call {
                    ui.tool_call(&call.name, &call.args);
                    let result = self.dispatch(call, ui).await;
                    let response = Content::function_responses(vec![Part::function_response(
                        &call.name, result,
                    )]);
                    self.append(response);
                    self.persist();
                    ran_tools = true;
                }
            }

            if !ran_tools {
                return Ok(());
            }
        }
    }

    /// Look the tool up and run it. Failures become `{error: ...}` maps so
    /// the model can see them and recover.
    async fn dispatch(&self, call: &FunctionCall, ui: &mut dyn Ui) -> ToolOutput {
        let Some(tool) = self.registry.get(&call.name) else {
            let message = format!("tool not found: {}", call.name);
            ui.tool_error(&call.name, &message);
            return error_output(message);
        };
        match tool.execute(call.args.clone()).await {
            Ok(result) => result,
            Err(e) => {
                let message = format!("{}: {}", call.name, e);
                ui.tool_error(&call.name, &message);
                error_output(message)
            }
        }
    }

    async fn generate_with_retry(
        &self,
        request: &ModelRequest,
        ui: &mut dyn Ui,
    ) -> Result<ModelResponse, ModelError> {
        let mut attempt = 0;
        loop {
            match self.model.generate(request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt + 1 < MAX_ATTEMPTS => {
                    let delay = RETRY_DELAYS_SECS[attempt];
                    warn!(attempt = attempt + 1, delay, error = %e, "transient model failure, retrying");
                    ui.notice(&format!("model hiccup ({e}); retrying in {delay}s"));
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Keep the cached prompt prefix fresh. Purely an optimization: every
    /// failure path leaves a working (possibly uncached) request behind.
    ///
    /// The cache covers system instruction, tool declarations, and all
    /// history except the newest content, so the follow-up request always
    /// carries at least one content.
    async fn refresh_cache(&mut self) {
        if self.history.len() < 2 {
            return;
        }
        let target_prefix = self.history.len() - 1;
        if let Some(cache) = &self.cache {
            if cache.prefix_len == target_prefix {
                return;
            }
        }

        let prefix = &self.history[..target_prefix];
        let serialized_len = serde_json::to_string(prefix).map(|s| s.len()).unwrap_or(0);
        if serialized_len < MIN_CACHE_CHARS {
            return;
        }

        let request = CacheRequest {
            model: self.model_name.clone(),
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            tools: self.registry.declarations(),
            contents: prefix.to_vec(),
            ttl_secs: CACHE_TTL_SECS,
        };
        match self.model.create_cache(&request).await {
            Ok(name) => {
                if let Some(old) = self.cache.take() {
                    if let Err(e) = self.model.delete_cache(&old.name).await {
                        debug!(cache = %old.name, error = %e, "stale cache delete failed");
                    }
                }
                info!(cache = %name, prefix = target_prefix, "cached prompt prefix");
                self.cache = Some(PromptCache {
                    name,
                    prefix_len: target_prefix,
                });
            }
            Err(e) => {
                // Keep any older cache: it still covers a valid prefix.
                warn!(error = %e, "cache create failed, continuing uncached");
            }
        }
    }

    fn build_request(&self) -> ModelRequest {
        match &self.cache {
            Some(cache) if cache.prefix_len < self.history.len() => ModelRequest {
                model: self.model_name.clone(),
                system_instruction: None,
                contents: self.history[cache.prefix_len..].to_vec(),
                tools: Vec::new(),
                cached_content: Some(cache.name.clone()),
                max_output_tokens: self.max_output_tokens,
            },
            _ => ModelRequest {
                model: self.model_name.clone(),
                system_instruction: Some(SYSTEM_INSTRUCTION.to_string()),
                contents: self.history.clone(),
                tools: self.registry.declarations(),
                cached_content: None,
                max_output_tokens: self.max_output_tokens,
            },
        }
    }

    /// Append to the in-memory history. Empty contents are never appended.
    fn append(&mut self, content: Content) {
        if content.is_empty() {
            debug!("dropping empty content");
            return;
        }
        match serde_json::to_value(&content) {
            Ok(value) => {
                self.conversation.append(value);
                self.history.push(content);
            }
            Err(e) => warn!(error = %e, "content did not serialize, dropping"),
        }
    }

    /// Persistence failures are logged but never halt the turn; the
    /// in-memory history stays authoritative until the next save lands.
    fn persist(&mut self) {
        if let Err(e) = self.store.save(&self.conversation) {
            warn!(error = %e, "failed to persist conversation");
        }
    }

    fn write_snapshot(&self) -> Option<PathBuf> {
        match snapshot::write(&self.snapshot_prefix, &self.history) {
            Ok(path) => {
                info!(path = %path.display(), "history snapshot written");
                Some(path)
            }
            Err(e) => {
                warn!(error = %e, "failed to write history snapshot");
                None
            }
        }
    }
}

fn error_output(message: String) -> ToolOutput {
    let mut map = Map::new();
    map.insert("error".to_string(), Value::String(message));
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::tools::read_file::ReadFileTool;

    struct ScriptedModel {
        responses: Mutex<VecDeque<Result<ModelResponse, ModelError>>>,
        requests: Mutex<Vec<ModelRequest>>,
    }

    impl ScriptedModel {
        fn new(responses: Vec<Result<ModelResponse, ModelError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedModel {
        async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ModelError::Parse("script exhausted".into())))
        }

        async fn create_cache(&self, _request: &CacheRequest) -> Result<String, ModelError> {
            Ok("cachedContents/test".to_string())
        }

        async fn delete_cache(&self, _name: &str) -> Result<(), ModelError> {
            Ok(())
        }
    }

    struct VecInput(VecDeque<String>);

    #[async_trait]
    impl InputSource for VecInput {
        async fn read_line(&mut self) -> Option<String> {
            self.0.pop_front()
        }
    }

    #[derive(Default)]
    struct RecordingUi {
        texts: Vec<String>,
        notices: Vec<String>,
        tool_errors: Vec<String>,
    }

    impl Ui for RecordingUi {
        fn model_text(&mut self, text: &str) {
            self.texts.push(text.to_string());
        }
        fn tool_call(&mut self, _name: &str, _args: &Map<String, Value>) {}
        fn tool_error(&mut self, _name: &str, message: &str) {
            self.tool_errors.push(message.to_string());
        }
        fn notice(&mut self, message: &str) {
            self.notices.push(message.to_string());
        }
        fn trace(&mut self, _label: &str, _payload: &Value) {}
    }

    fn text_response(text: &str) -> Result<ModelResponse, ModelError> {
        Ok(ModelResponse {
            content: Some(Content::model_text(text)),
        })
    }

    fn call_response(name: &str, args: Value) -> Result<ModelResponse, ModelError> {
        Ok(ModelResponse {
            content: Some(Content {
                role: Role::Model,
                parts: vec![Part::function_call(
                    name,
                    args.as_object().cloned().unwrap_or_default(),
                )],
            }),
        })
    }

    fn agent(model: ScriptedModel, dir: &tempfile::TempDir) -> Agent {
        let mut registry = ToolRegistry::new();
        registry.add(Arc::new(ReadFileTool));
        let store = HistoryStore::open(dir.path().join("history.db")).unwrap();
        let conversation = store.new_conversation();
        Agent::new(
            Box::new(model),
            "test-model".into(),
            1024,
            Arc::new(registry),
            store,
            conversation,
            dir.path().join("reload").to_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn tool_error_is_surfaced_as_function_response() {
        let dir = tempfile::tempdir().unwrap();
        let model = ScriptedModel::new(vec![
            call_response(
                "read_file",
                serde_json::json!({ "filepath": "nonexistent" }),
            ),
            text_response("I could not read that file."),
        ]);
        let mut agent = agent(model, &dir);
        let mut input = VecInput(VecDeque::from(["read nonexistent".to_string()]));
        let mut ui = RecordingUi::default();

        let exit = agent.run(&mut input, &mut ui).await.unwrap();
        assert!(matches!(exit, AgentExit::Quit { .. }));

        // user, model(call), function-response, model(text)
        assert_eq!(agent.history().len(), 4);
        let response = agent.history()[2].parts[0]
            .function_response
            .as_ref()
            .unwrap();
        let error = response.response["error"].as_str().unwrap();
        assert!(error.starts_with("read_file:"));
        assert!(error.to_lowercase().contains("no such file") || error.contains("failed to read"));
        assert_eq!(ui.texts, vec!["I could not read that file.".to_string()]);
    }

    #[tokio::test]
    async fn unknown_tool_synthesizes_not_found_response() {
        let dir = tempfile::tempdir().unwrap();
        let model = ScriptedModel::new(vec![
            call_response("bogus_tool", serde_json::json!({})),
            text_response("done"),
        ]);
        let mut agent = agent(model, &dir);
        let mut input = VecInput(VecDeque::from(["hello".to_string()]));
        let mut ui = RecordingUi::default();

        agent.run(&mut input, &mut ui).await.unwrap();
        let response = agent.history()[2].parts[0]
            .function_response
            .as_ref()
            .unwrap();
        assert_eq!(response.name, "bogus_tool");
        assert_eq!(response.response["error"], "tool not found: bogus_tool");
    }

    #[tokio::test]
    async fn empty_model_content_is_never_appended() {
        let dir = tempfile::tempdir().unwrap();
        let model = ScriptedModel::new(vec![Ok(ModelResponse {
            content: Some(Content {
                role: Role::Model,
                parts: vec![Part::text("")],
            }),
        })]);
        let mut agent = agent(model, &dir);
        let mut input = VecInput(VecDeque::from(["hello".to_string()]));
        let mut ui = RecordingUi::default();

        agent.run(&mut input, &mut ui).await.unwrap();
        assert_eq!(agent.history().len(), 1); // just the user message
        assert!(ui.notices.iter().any(|n| n.contains("empty response")));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_retry_then_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let model = ScriptedModel::new(vec![
            Err(ModelError::Api {
                status: 503,
                message: "overloaded".into(),
            }),
            Err(ModelError::Api {
                status: 500,
                message: "try later".into(),
            }),
            text_response("finally"),
        ]);
        let mut agent = agent(model, &dir);
        let mut input = VecInput(VecDeque::from(["hi".to_string()]));
        let mut ui = RecordingUi::default();

        agent.run(&mut input, &mut ui).await.unwrap();
        assert_eq!(ui.texts, vec!["finally".to_string()]);
        assert_eq!(agent.history().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_exit_with_error() {
        let dir = tempfile::tempdir().unwrap();
        let failures: Vec<Result<ModelResponse, ModelError>> = (0..MAX_ATTEMPTS)
            .map(|_| {
                Err(ModelError::Api {
                    status: 500,
                    message: "down".into(),
                })
            })
            .collect();
        let model = ScriptedModel::new(failures);
        let mut agent = agent(model, &dir);
        let mut input = VecInput(VecDeque::from(["hi".to_string()]));
        let mut ui = RecordingUi::default();

        assert!(matches!(
            agent.run(&mut input, &mut ui).await,
            Err(AgentError::Model(_))
        ));
    }

    #[tokio::test]
    async fn non_retryable_error_resumes_the_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let model = ScriptedModel::new(vec![
            Err(ModelError::Api {
                status: 400,
                message: "bad request".into(),
            }),
            text_response("second turn works"),
        ]);
        let mut agent = agent(model, &dir);
        let mut input = VecInput(VecDeque::from([
            "first".to_string(),
            "second".to_string(),
        ]));
        let mut ui = RecordingUi::default();

        agent.run(&mut input, &mut ui).await.unwrap();
        assert!(ui.notices.iter().any(|n| n.contains("model error")));
        assert_eq!(ui.texts, vec!["second turn works".to_string()]);
    }

    #[tokio::test]
    async fn every_turn_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let model = ScriptedModel::new(vec![text_response("ack")]);
        let mut agent = agent(model, &dir);
        let mut input = VecInput(VecDeque::from(["remember this".to_string()]));
        let mut ui = RecordingUi::default();

        agent.run(&mut input, &mut ui).await.unwrap();

        let store = HistoryStore::open(dir.path().join("history.db")).unwrap();
        let loaded = store.load(agent.conversation_id()).unwrap();
        assert_eq!(loaded.messages.len(), agent.history().len());
        assert_eq!(loaded.messages.len(), 2);
    }

    #[tokio::test]
    async fn reload_returns_restart_with_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let model = ScriptedModel::new(vec![text_response("noted")]);
        let mut agent = agent(model, &dir);
        let mut input = VecInput(VecDeque::from([
            "hello".to_string(),
            "/reload".to_string(),
        ]));
        let mut ui = RecordingUi::default();

        let exit = agent.run(&mut input, &mut ui).await.unwrap();
        let AgentExit::Restart { snapshot } = exit else {
            panic!("expected restart");
        };
        let restored = snapshot::consume(&snapshot).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored, agent.history());
    }

    #[tokio::test]
    async fn slash_commands_do_not_reach_the_model() {
        let dir = tempfile::tempdir().unwrap();
        let model = ScriptedModel::new(vec![]);
        let mut agent = agent(model, &dir);
        let mut input = VecInput(VecDeque::from([
            "/help".to_string(),
            "/tools".to_string(),
            "/trace".to_string(),
            "/no-trace".to_string(),
        ]));
        let mut ui = RecordingUi::default();

        agent.run(&mut input, &mut ui).await.unwrap();
        assert!(agent.history().is_empty());
        assert_eq!(ui.notices.len(), 4);
    }
}

//! Local daemon backend (Ollama HTTP API)
//!
//! Connects to any Ollama-compatible server. Chat goes through `/api/chat`
//! with streaming disabled; embeddings use the single-prompt
//! `/api/embeddings` endpoint, one request per input text.

use async_trait::async_trait;
use domain::{
    BackendKind, ChatMessage, CompletionRequest, Embedding, EmbeddingInput, MessageContent,
    MessageRole, NormalizedResponse,
};
use futures::future::try_join_all;
use reqwest::Client;
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument};

use crate::{
    config::LocalDaemonConfig,
    error::InferenceError,
    http::{join_url, send_json},
    normalize,
    payload::{chat_tools, merge_whitelisted},
    ports::InferenceBackend,
};

const BACKEND: BackendKind = BackendKind::LocalDaemon;

/// Caller options forwarded into the daemon's `options` object
const DAEMON_OPTIONS: &[&str] = &[
    "seed",
    "top_k",
    "min_p",
    "num_ctx",
    "repeat_penalty",
    "presence_penalty",
    "frequency_penalty",
];

/// Adapter for an Ollama-compatible daemon
#[derive(Debug)]
pub struct OllamaBackend {
    client: Client,
    config: LocalDaemonConfig,
}

impl OllamaBackend {
    /// Create an adapter sharing `client`
    pub fn new(client: Client, config: LocalDaemonConfig) -> Self {
        info!(
            base_url = %config.base_url,
            model = %config.model,
            "Initialized local daemon backend"
        );
        Self { client, config }
    }

    fn chat_body(&self, request: &CompletionRequest) -> Value {
        let mut options = Map::new();
        if let Some(temperature) = request.temperature {
            options.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(top_p) = request.top_p {
            options.insert("top_p".to_string(), json!(top_p));
        }
        if let Some(tokens) = request.max_output_tokens {
            options.insert("num_predict".to_string(), json!(tokens.max(1)));
        }
        if !request.stop.is_empty() {
            options.insert("stop".to_string(), json!(request.stop));
        }
        merge_whitelisted(&mut options, request.options.clone(), |key| {
            DAEMON_OPTIONS.contains(&key)
        });

        let mut body = Map::new();
        body.insert("model".to_string(), json!(self.config.model));
        body.insert("messages".to_string(), Value::Array(daemon_messages(request)));
        body.insert("stream".to_string(), json!(false));
        body.insert("options".to_string(), Value::Object(options));
        if !request.tools.is_empty() {
            body.insert("tools".to_string(), Value::Array(chat_tools(&request.tools)));
        }
        if wants_json(request) {
            body.insert("format".to_string(), json!("json"));
        }
        Value::Object(body)
    }

    #[instrument(skip(self, text), fields(text_len = text.len()))]
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, InferenceError> {
        let body = json!({"model": self.config.embedding_model, "prompt": text});
        let request = self
            .client
            .post(join_url(&self.config.base_url, "/api/embeddings"));
        let value = send_json(BACKEND, request, &body, false).await?;
        let vector = normalize::vector(BACKEND, &value, "embedding")?;
        debug!(dimensions = vector.len(), "Received embedding from daemon");
        Ok(vector)
    }
}

/// Chat history in daemon shape: tool-call arguments stay objects
fn daemon_messages(request: &CompletionRequest) -> Vec<Value> {
    let mut messages = Vec::with_capacity(request.chat_history.len() + 2);
    if let Some(system) = request.system_prompt.as_deref().filter(|s| !s.trim().is_empty()) {
        messages.push(json!({"role": "system", "content": system}));
    }
    messages.extend(request.chat_history.iter().map(daemon_message));
    if !request.prompt.trim().is_empty() || request.chat_history.is_empty() {
        messages.push(json!({"role": "user", "content": request.prompt}));
    }
    messages
}

fn daemon_message(message: &ChatMessage) -> Value {
    match &message.content {
        MessageContent::Text(text) => json!({"role": message.role.as_str(), "content": text}),
        MessageContent::ToolCalls(calls) => {
            let tool_calls: Vec<Value> = calls
                .iter()
                .map(|call| json!({"function": {"name": call.name, "arguments": call.arguments}}))
                .collect();
            json!({
                "role": MessageRole::Assistant.as_str(),
                "content": "",
                "tool_calls": tool_calls,
            })
        },
        MessageContent::ToolResult { content, .. } => json!({"role": "tool", "content": content}),
    }
}

fn wants_json(request: &CompletionRequest) -> bool {
    request.option_str("output_format") == Some("json")
        || request
            .response_format
            .as_ref()
            .and_then(|f| f.get("type"))
            .and_then(Value::as_str)
            .is_some_and(|t| t.starts_with("json"))
}

#[async_trait]
impl InferenceBackend for OllamaBackend {
    fn kind(&self) -> BackendKind {
        BACKEND
    }

    #[instrument(skip(self, request), fields(model = %self.config.model))]
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<NormalizedResponse, InferenceError> {
        let body = self.chat_body(request);
        let http = self.client.post(join_url(&self.config.base_url, "/api/chat"));
        let value = send_json(BACKEND, http, &body, request.debug).await?;
        normalize::daemon_chat(BACKEND, &value)
    }

    #[instrument(skip(self, input), fields(model = %self.config.embedding_model, count = input.len()))]
    async fn embed(&self, input: &EmbeddingInput) -> Result<Embedding, InferenceError> {
        let vectors = try_join_all(input.texts().into_iter().map(|text| self.embed_one(text))).await?;
        normalize::embedding(BACKEND, input, vectors)
    }
}

#[cfg(test)]
mod tests {
    use domain::{ToolCall, ToolDeclaration};

    use super::*;
    use crate::http::build_client;

    fn backend() -> OllamaBackend {
        OllamaBackend::new(build_client().unwrap(), LocalDaemonConfig::default())
    }

    #[test]
    fn chat_body_maps_sampling_into_options() {
        let mut request = CompletionRequest::simple("hi")
            .with_temperature(0.5)
            .with_max_output_tokens(128)
            .with_option("seed", json!(7))
            .with_option("logit_bias", json!({}));
        request.stop = vec!["\n\n".to_string()];

        let body = backend().chat_body(&request);
        assert_eq!(body["stream"], json!(false));
        assert_eq!(body["options"]["temperature"], json!(0.5));
        assert_eq!(body["options"]["num_predict"], json!(128));
        assert_eq!(body["options"]["stop"], json!(["\n\n"]));
        assert_eq!(body["options"]["seed"], json!(7));
        assert!(body["options"].get("logit_bias").is_none());
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn system_prompt_is_only_sent_when_given() {
        let body = backend().chat_body(&CompletionRequest::simple("hi"));
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);

        let body = backend().chat_body(&CompletionRequest::with_system("Be brief.", "hi"));
        assert_eq!(body["messages"][0]["role"], "system");
    }

    #[test]
    fn tool_history_keeps_object_arguments() {
        let request = CompletionRequest::simple("")
            .with_tools(vec![ToolDeclaration::new("clock", "", json!({}))])
            .with_history(vec![
                ChatMessage::assistant_tool_calls(vec![ToolCall::new(
                    "call_1",
                    "clock",
                    json!({"tz": "UTC"}),
                )]),
                ChatMessage::tool_result("call_1", "clock", "12:00"),
            ]);
        let body = backend().chat_body(&request);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[0]["tool_calls"][0]["function"]["arguments"],
            json!({"tz": "UTC"})
        );
        assert_eq!(messages[1]["role"], "tool");
        assert_eq!(body["tools"][0]["function"]["name"], "clock");
    }

    #[test]
    fn json_output_sets_format() {
        let request = CompletionRequest::simple("hi").with_option("output_format", json!("json"));
        assert_eq!(backend().chat_body(&request)["format"], "json");
    }
}

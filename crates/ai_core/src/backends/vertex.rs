//! Cloud multi-modal backend (Vertex AI Gemini)
//!
//! Every call fetches a bearer token from the [`CredentialManager`] first,
//! so an expiring credential is refreshed before the request goes out.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{
    BackendKind, ChatMessage, CompletionRequest, Embedding, EmbeddingInput, MessageContent,
    MessageRole, NormalizedResponse, ToolChoice, ToolDeclaration,
};
use reqwest::Client;
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument};

use crate::{
    config::CloudConfig,
    credentials::CredentialManager,
    error::InferenceError,
    http::send_json,
    normalize,
    ports::InferenceBackend,
};

const BACKEND: BackendKind = BackendKind::CloudMultimodal;

/// Options passed through into `generationConfig` under their Gemini names
const GENERATION_OPTIONS: &[(&str, &str)] = &[
    ("top_k", "topK"),
    ("seed", "seed"),
    ("candidate_count", "candidateCount"),
    ("presence_penalty", "presencePenalty"),
    ("frequency_penalty", "frequencyPenalty"),
];

/// Adapter for Gemini models on Vertex AI
#[derive(Debug)]
pub struct VertexBackend {
    client: Client,
    config: CloudConfig,
    credentials: Arc<CredentialManager>,
}

impl VertexBackend {
    /// Create an adapter sharing `client` and the credential manager
    pub fn new(client: Client, config: CloudConfig, credentials: Arc<CredentialManager>) -> Self {
        info!(
            project = %config.project_id,
            region = %config.region,
            model = %config.model,
            "Initialized cloud multimodal backend"
        );
        Self {
            client,
            config,
            credentials,
        }
    }

    fn method_url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/v1/{}:{method}",
            self.config.resolved_base_url(),
            self.config.model_resource(model)
        )
    }

    async fn post(&self, url: &str, body: &Value, log_body: bool) -> Result<Value, InferenceError> {
        let token = self
            .credentials
            .access_token(&self.config.credential_key, &self.config.oauth)
            .await?;
        let request = self.client.post(url).bearer_auth(token);
        send_json(BACKEND, request, body, log_body).await
    }
}

/// `generateContent` request body
fn generate_body(request: &CompletionRequest) -> Value {
    let mut body = Map::new();
    body.insert("contents".to_string(), Value::Array(contents(request)));

    if let Some(system) = request.system_prompt.as_deref().filter(|s| !s.trim().is_empty()) {
        body.insert(
            "systemInstruction".to_string(),
            json!({"parts": [{"text": system}]}),
        );
    }
    if !request.tools.is_empty() {
        body.insert(
            "tools".to_string(),
            json!([{"functionDeclarations": function_declarations(&request.tools)}]),
        );
        if let Some(choice) = &request.tool_choice {
            body.insert(
                "toolConfig".to_string(),
                json!({"functionCallingConfig": function_calling_config(choice)}),
            );
        }
    }

    let generation = generation_config(request);
    if !generation.is_empty() {
        body.insert("generationConfig".to_string(), Value::Object(generation));
    }
    Value::Object(body)
}

fn contents(request: &CompletionRequest) -> Vec<Value> {
    let mut contents: Vec<Value> = request.chat_history.iter().map(content).collect();
    if !request.prompt.trim().is_empty() || request.chat_history.is_empty() {
        contents.push(json!({"role": "user", "parts": [{"text": request.prompt}]}));
    }
    contents
}

fn content(message: &ChatMessage) -> Value {
    let role = match message.role {
        MessageRole::Assistant => "model",
        MessageRole::User | MessageRole::System => "user",
    };
    let parts = match &message.content {
        MessageContent::Text(text) => json!([{"text": text}]),
        MessageContent::ToolCalls(calls) => Value::Array(
            calls
                .iter()
                .map(|call| json!({"functionCall": {"name": call.name, "args": call.arguments}}))
                .collect(),
        ),
        MessageContent::ToolResult { name, content, .. } => json!([{
            "functionResponse": {"name": name, "response": {"content": content}}
        }]),
    };
    json!({"role": role, "parts": parts})
}

fn function_declarations(tools: &[ToolDeclaration]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters,
            })
        })
        .collect()
}

fn function_calling_config(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!({"mode": "AUTO"}),
        ToolChoice::None => json!({"mode": "NONE"}),
        ToolChoice::Required => json!({"mode": "ANY"}),
        ToolChoice::Function(name) => json!({"mode": "ANY", "allowedFunctionNames": [name]}),
    }
}

fn generation_config(request: &CompletionRequest) -> Map<String, Value> {
    let mut config = Map::new();
    if let Some(temperature) = request.temperature {
        config.insert("temperature".to_string(), json!(temperature));
    }
    if let Some(top_p) = request.top_p {
        config.insert("topP".to_string(), json!(top_p));
    }
    if let Some(tokens) = request.max_output_tokens {
        config.insert("maxOutputTokens".to_string(), json!(tokens.max(1)));
    }
    if !request.stop.is_empty() {
        config.insert("stopSequences".to_string(), json!(request.stop));
    }
    if wants_json(request) {
        config.insert("responseMimeType".to_string(), json!("application/json"));
    }
    for (option, field) in GENERATION_OPTIONS {
        if let Some(value) = request.options.get(*option) {
            config.insert((*field).to_string(), value.clone());
        }
    }
    config
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
impl InferenceBackend for VertexBackend {
    fn kind(&self) -> BackendKind {
        BACKEND
    }

    #[instrument(skip(self, request), fields(model = %self.config.model))]
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<NormalizedResponse, InferenceError> {
        let url = self.method_url(&self.config.model, "generateContent");
        let body = generate_body(request);
        let value = self.post(&url, &body, request.debug).await?;
        normalize::gemini(BACKEND, &value)
    }

    #[instrument(skip(self, input), fields(model = %self.config.embedding_model, count = input.len()))]
    async fn embed(&self, input: &EmbeddingInput) -> Result<Embedding, InferenceError> {
        let url = self.method_url(&self.config.embedding_model, "predict");
        let instances: Vec<Value> = input
            .texts()
            .into_iter()
            .map(|text| json!({"content": text}))
            .collect();
        let value = self.post(&url, &json!({"instances": instances}), false).await?;

        let predictions = value
            .get("predictions")
            .and_then(Value::as_array)
            .ok_or_else(|| InferenceError::malformed(BACKEND, "missing 'predictions'"))?;
        let vectors = predictions
            .iter()
            .map(|prediction| {
                prediction
                    .get("embeddings")
                    .ok_or_else(|| InferenceError::malformed(BACKEND, "prediction without 'embeddings'"))
                    .and_then(|embeddings| normalize::vector(BACKEND, embeddings, "values"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = vectors.len(), "Received embeddings from Vertex AI");
        normalize::embedding(BACKEND, input, vectors)
    }
}

#[cfg(test)]
mod tests {
    use domain::ToolCall;

    use super::*;

    #[test]
    fn history_maps_roles_and_tool_parts() {
        let request = CompletionRequest::with_system("Be brief.", "").with_history(vec![
            ChatMessage::user("Weather in Oslo?"),
            ChatMessage::assistant_tool_calls(vec![ToolCall::new(
                "call_1",
                "weather",
                json!({"city": "Oslo"}),
            )]),
            ChatMessage::tool_result("call_1", "weather", "4°C"),
        ]);
        let body = generate_body(&request);

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be brief.");
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][0]["functionCall"]["args"], json!({"city": "Oslo"}));
        assert_eq!(
            contents[2]["parts"][0]["functionResponse"]["response"]["content"],
            "4°C"
        );
    }

    #[test]
    fn tool_choice_maps_to_calling_mode() {
        let request = CompletionRequest::simple("hi")
            .with_tools(vec![ToolDeclaration::new("clock", "Current time", json!({}))])
            .with_tool_choice(ToolChoice::Function("clock".to_string()));
        let body = generate_body(&request);

        assert_eq!(body["tools"][0]["functionDeclarations"][0]["name"], "clock");
        assert_eq!(
            body["toolConfig"]["functionCallingConfig"],
            json!({"mode": "ANY", "allowedFunctionNames": ["clock"]})
        );
    }

    #[test]
    fn tool_choice_without_tools_is_dropped() {
        let request = CompletionRequest::simple("hi").with_tool_choice(ToolChoice::Required);
        assert!(generate_body(&request).get("toolConfig").is_none());
    }

    #[test]
    fn sampling_goes_into_generation_config() {
        let mut request = CompletionRequest::simple("hi")
            .with_temperature(0.25)
            .with_max_output_tokens(0)
            .with_option("top_k", json!(40))
            .with_option("output_format", json!("json"));
        request.stop = vec!["END".to_string()];

        let config = &generate_body(&request)["generationConfig"];
        assert_eq!(config["temperature"], json!(0.25));
        assert_eq!(config["maxOutputTokens"], json!(1));
        assert_eq!(config["stopSequences"], json!(["END"]));
        assert_eq!(config["topK"], json!(40));
        assert_eq!(config["responseMimeType"], "application/json");
    }

    #[test]
    fn bare_prompt_has_no_generation_config() {
        let body = generate_body(&CompletionRequest::simple("hi"));
        assert!(body.get("generationConfig").is_none());
        assert_eq!(body["contents"], json!([{"role": "user", "parts": [{"text": "hi"}]}]));
    }
}

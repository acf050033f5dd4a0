//! Chat completions payloads

use domain::{
    ChatMessage, CompletionRequest, MessageContent, MessageRole, ModelMetadata, ToolDeclaration,
};
use serde_json::{Map, Value, json};

use super::{DEFAULT_SYSTEM_PROMPT, chat_tool_choice, merge_whitelisted, request_params};

/// Chat payload for a catalog model
///
/// `model` is the id as requested by the caller (possibly a dated variant of
/// `meta.id`). Only parameters in `meta.supported_params` reach the body.
pub fn build_chat_payload(model: &str, meta: &ModelMetadata, request: &CompletionRequest) -> Value {
    let instruction_role = if meta.is_reasoning() { "developer" } else { "system" };

    let mut body = Map::new();
    body.insert("model".to_string(), json!(model));
    body.insert(
        "messages".to_string(),
        Value::Array(chat_messages(request, instruction_role)),
    );

    let mut params = request_params(request);
    if let Some(requested) = request.max_output_tokens {
        let key = if meta.supports("max_completion_tokens") {
            "max_completion_tokens"
        } else {
            "max_tokens"
        };
        params.insert(key.to_string(), json!(meta.clamp_output_tokens(requested)));
    }
    if !request.tools.is_empty() {
        params.insert("tools".to_string(), Value::Array(chat_tools(&request.tools)));
    }
    if let Some(choice) = &request.tool_choice {
        params.insert("tool_choice".to_string(), chat_tool_choice(choice));
    }

    merge_whitelisted(&mut body, params, |key| meta.supports(key));
    Value::Object(body)
}

/// Chat payload for an OpenAI-compatible server without catalog metadata
///
/// Every request option passes except the reserved keys.
pub fn build_compatible_payload(model: &str, request: &CompletionRequest) -> Value {
    let mut body = Map::new();
    body.insert("model".to_string(), json!(model));
    body.insert(
        "messages".to_string(),
        Value::Array(chat_messages(request, "system")),
    );

    let mut params = request_params(request);
    if let Some(tokens) = request.max_output_tokens {
        params.insert("max_tokens".to_string(), json!(tokens.max(1)));
    }
    if !request.tools.is_empty() {
        params.insert("tools".to_string(), Value::Array(chat_tools(&request.tools)));
    }
    if let Some(choice) = &request.tool_choice {
        params.insert("tool_choice".to_string(), chat_tool_choice(choice));
    }

    merge_whitelisted(&mut body, params, |_| true);
    Value::Object(body)
}

/// `[instruction, ...history, user]` in chat API shape
///
/// The instruction is the system prompt (or a default) under
/// `instruction_role`. History system messages use the same role. The final
/// user turn is omitted when the prompt is blank and history is present,
/// which is how callers feed tool results back.
pub fn chat_messages(request: &CompletionRequest, instruction_role: &str) -> Vec<Value> {
    let instruction = request
        .system_prompt
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);

    let mut messages = Vec::with_capacity(request.chat_history.len() + 2);
    messages.push(json!({"role": instruction_role, "content": instruction}));
    messages.extend(
        request
            .chat_history
            .iter()
            .map(|message| history_message(message, instruction_role)),
    );
    if !request.prompt.trim().is_empty() || request.chat_history.is_empty() {
        messages.push(json!({"role": "user", "content": request.prompt}));
    }
    messages
}

fn history_message(message: &ChatMessage, instruction_role: &str) -> Value {
    match &message.content {
        MessageContent::Text(text) => {
            let role = match message.role {
                MessageRole::System => instruction_role,
                other => other.as_str(),
            };
            json!({"role": role, "content": text})
        },
        MessageContent::ToolCalls(calls) => {
            let tool_calls: Vec<Value> = calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": {"name": call.name, "arguments": call.arguments_json()},
                    })
                })
                .collect();
            json!({"role": "assistant", "content": Value::Null, "tool_calls": tool_calls})
        },
        MessageContent::ToolResult {
            call_id, content, ..
        } => json!({"role": "tool", "tool_call_id": call_id, "content": content}),
    }
}

/// Tools as `{type:"function", function:{name, description, parameters}}`
pub fn chat_tools(tools: &[ToolDeclaration]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters,
                },
            })
        })
        .collect()
}

//! Structured-response (`/v1/responses`) payloads

use domain::{
    ChatMessage, CompletionRequest, MessageContent, MessageRole, ModelMetadata, ToolChoice,
    ToolDeclaration,
};
use serde_json::{Map, Value, json};

use super::{DEFAULT_SYSTEM_PROMPT, merge_whitelisted, request_params};

const DEFAULT_REASONING: &str = "auto";

/// Options consumed by this builder instead of being forwarded
const SHORTHAND_OPTIONS: &[&str] = &["reasoning_effort", "reasoning_summary", "output_format"];

/// Structured-response payload for a catalog model
///
/// Fixed fields are `model`, `input`, `text` and, for reasoning requests,
/// `reasoning`. Everything else passes through the model whitelist.
pub fn build_responses_payload(
    model: &str,
    meta: &ModelMetadata,
    request: &CompletionRequest,
) -> Value {
    let instruction_role = if meta.is_reasoning() { "developer" } else { "system" };

    let mut body = Map::new();
    body.insert("model".to_string(), json!(model));
    body.insert(
        "input".to_string(),
        Value::Array(input_items(request, instruction_role)),
    );

    let effort = request.option_str("reasoning_effort");
    let summary = request.option_str("reasoning_summary");
    if meta.reasoning_required || effort.is_some() || summary.is_some() {
        body.insert(
            "reasoning".to_string(),
            json!({
                "effort": effort.unwrap_or(DEFAULT_REASONING),
                "summary": summary.unwrap_or(DEFAULT_REASONING),
            }),
        );
    }
    body.insert("text".to_string(), json!({"format": output_format(request)}));

    let mut params = request_params(request);
    for key in SHORTHAND_OPTIONS {
        params.remove(*key);
    }
    params.remove("response_format");
    if let Some(requested) = request.max_output_tokens {
        params.insert(
            "max_output_tokens".to_string(),
            json!(meta.clamp_output_tokens(requested)),
        );
    }
    if !request.tools.is_empty() {
        params.insert("tools".to_string(), Value::Array(flat_tools(&request.tools)));
    }
    if let Some(choice) = &request.tool_choice {
        params.insert("tool_choice".to_string(), flat_tool_choice(choice));
    }

    merge_whitelisted(&mut body, params, |key| meta.supports(key));
    Value::Object(body)
}

/// Explicit `response_format`, else the `output_format` shorthand, else text
fn output_format(request: &CompletionRequest) -> Value {
    if let Some(format) = &request.response_format {
        return format.clone();
    }
    match request.options.get("output_format") {
        Some(Value::String(kind)) if kind == "json" => json!({"type": "json_object"}),
        Some(Value::String(kind)) => json!({"type": kind}),
        Some(format @ Value::Object(_)) => format.clone(),
        _ => json!({"type": "text"}),
    }
}

fn input_items(request: &CompletionRequest, instruction_role: &str) -> Vec<Value> {
    let instruction = request
        .system_prompt
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);

    let mut items = vec![text_item(instruction_role, "input_text", instruction)];
    for message in &request.chat_history {
        items.extend(history_items(message, instruction_role));
    }
    if !request.prompt.trim().is_empty() || request.chat_history.is_empty() {
        items.push(text_item("user", "input_text", &request.prompt));
    }
    items
}

fn history_items(message: &ChatMessage, instruction_role: &str) -> Vec<Value> {
    match &message.content {
        MessageContent::Text(text) => {
            let item = match message.role {
                MessageRole::System => text_item(instruction_role, "input_text", text),
                MessageRole::User => text_item("user", "input_text", text),
                MessageRole::Assistant => text_item("assistant", "output_text", text),
            };
            vec![item]
        },
        MessageContent::ToolCalls(calls) => calls
            .iter()
            .map(|call| {
                json!({
                    "type": "function_call",
                    "call_id": call.id,
                    "name": call.name,
                    "arguments": call.arguments_json(),
                })
            })
            .collect(),
        MessageContent::ToolResult {
            call_id, content, ..
        } => vec![json!({
            "type": "function_call_output",
            "call_id": call_id,
            "output": content,
        })],
    }
}

fn text_item(role: &str, part_type: &str, text: &str) -> Value {
    json!({"role": role, "content": [{"type": part_type, "text": text}]})
}

fn flat_tools(tools: &[ToolDeclaration]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters,
            })
        })
        .collect()
}

fn flat_tool_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::None => json!("none"),
        ToolChoice::Required => json!("required"),
        ToolChoice::Function(name) => json!({"type": "function", "name": name}),
    }
}

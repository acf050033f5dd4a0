//! Response normalization
//!
//! Maps each provider's success envelope to a [`NormalizedResponse`] and
//! extracts human-readable messages from error envelopes.

use domain::{BackendKind, Embedding, EmbeddingInput, NormalizedResponse, ToolCall};
use serde::Deserialize;
use serde_json::Value;

use crate::error::InferenceError;

/// Message carried by a provider error envelope, if any
///
/// Recognizes `{"error": {"message": ...}}`, `{"error": "..."}` and a bare
/// `{"message": ...}`.
pub fn error_message(body: &Value) -> Option<String> {
    match body.get("error") {
        Some(Value::Object(error)) => error
            .get("message")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .or_else(|| Some(Value::Object(error.clone()).to_string())),
        Some(Value::String(message)) => Some(message.clone()),
        _ => body
            .get("message")
            .and_then(Value::as_str)
            .map(ToString::to_string),
    }
}

/// Chat completions envelope: `choices[0].message`
///
/// Tolerates missing `id`, `usage` and `finish_reason`. Content may be a
/// string, null, or a list of text parts.
pub fn chat_completion(
    backend: BackendKind,
    body: &Value,
) -> Result<NormalizedResponse, InferenceError> {
    let message = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| InferenceError::malformed(backend, "missing 'choices[0].message'"))?;

    let text = match message.get("content") {
        Some(Value::String(text)) => Some(text.clone()),
        Some(Value::Array(parts)) => Some(
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<String>(),
        ),
        _ => None,
    };

    let tool_calls = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .map(|call| chat_tool_call(backend, call))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?
        .unwrap_or_default();

    if text.is_none() && tool_calls.is_empty() {
        return Err(InferenceError::malformed(
            backend,
            "message has neither content nor tool calls",
        ));
    }
    Ok(NormalizedResponse::from_parts(
        text.unwrap_or_default(),
        tool_calls,
    ))
}

fn chat_tool_call(backend: BackendKind, call: &Value) -> Result<ToolCall, InferenceError> {
    let function = call
        .get("function")
        .ok_or_else(|| InferenceError::malformed(backend, "tool call without 'function'"))?;
    let name = function
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| InferenceError::malformed(backend, "tool call without function name"))?;
    let arguments = arguments_value(function.get("arguments"));

    Ok(match call.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => ToolCall::new(id, name, arguments),
        _ => ToolCall::synthesized(name, arguments),
    })
}

/// Arguments delivered either as a JSON-encoded string or as an object
fn arguments_value(raw: Option<&Value>) -> Value {
    match raw {
        Some(Value::String(encoded)) => ToolCall::parse_arguments(encoded),
        Some(Value::Null) | None => serde_json::json!({}),
        Some(other) => other.clone(),
    }
}

/// Structured-response envelope: `output[]` of message and function-call items
pub fn responses(backend: BackendKind, body: &Value) -> Result<NormalizedResponse, InferenceError> {
    let Some(output) = body.get("output").and_then(Value::as_array) else {
        return body
            .get("output_text")
            .and_then(Value::as_str)
            .map(NormalizedResponse::text)
            .ok_or_else(|| InferenceError::malformed(backend, "missing 'output'"));
    };

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    let mut saw_message = false;

    for item in output {
        match item.get("type").and_then(Value::as_str) {
            Some("message") => {
                saw_message = true;
                let parts = item.get("content").and_then(Value::as_array);
                for part in parts.into_iter().flatten() {
                    if part.get("type").and_then(Value::as_str) == Some("output_text") {
                        if let Some(chunk) = part.get("text").and_then(Value::as_str) {
                            text.push_str(chunk);
                        }
                    }
                }
            },
            Some("function_call") => {
                let name = item.get("name").and_then(Value::as_str).ok_or_else(|| {
                    InferenceError::malformed(backend, "function_call without name")
                })?;
                let arguments = arguments_value(item.get("arguments"));
                let id = item
                    .get("call_id")
                    .or_else(|| item.get("id"))
                    .and_then(Value::as_str);
                tool_calls.push(match id {
                    Some(id) => ToolCall::new(id, name, arguments),
                    None => ToolCall::synthesized(name, arguments),
                });
            },
            // reasoning summaries and other item types carry no answer
            _ => {},
        }
    }

    if !saw_message && tool_calls.is_empty() {
        return Err(InferenceError::malformed(
            backend,
            "output has no message or function_call item",
        ));
    }
    Ok(NormalizedResponse::from_parts(text, tool_calls))
}

/// Local daemon chat envelope: `message.{content, tool_calls}`
///
/// Tool calls carry object arguments and no ids; ids are synthesized.
pub fn daemon_chat(backend: BackendKind, body: &Value) -> Result<NormalizedResponse, InferenceError> {
    let message = body
        .get("message")
        .ok_or_else(|| InferenceError::malformed(backend, "missing 'message'"))?;
    let text = message.get("content").and_then(Value::as_str);

    let tool_calls = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .map(|call| chat_tool_call(backend, call))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?
        .unwrap_or_default();

    if text.is_none() && tool_calls.is_empty() {
        return Err(InferenceError::malformed(
            backend,
            "message has neither content nor tool calls",
        ));
    }
    Ok(NormalizedResponse::from_parts(
        text.unwrap_or_default().to_string(),
        tool_calls,
    ))
}

/// Gemini envelope: `candidates[0].content.parts[]`
///
/// `functionCall` parts get a synthesized id. A prompt blocked by safety
/// filters is reported as a provider error.
pub fn gemini(backend: BackendKind, body: &Value) -> Result<NormalizedResponse, InferenceError> {
    let candidate = body
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first());

    let Some(candidate) = candidate else {
        if let Some(reason) = body
            .pointer("/promptFeedback/blockReason")
            .and_then(Value::as_str)
        {
            return Err(InferenceError::provider(
                backend,
                None,
                format!("prompt blocked: {reason}"),
            ));
        }
        return Err(InferenceError::malformed(backend, "missing 'candidates'"));
    };

    let Some(parts) = candidate.pointer("/content/parts").and_then(Value::as_array) else {
        let reason = candidate
            .get("finishReason")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        return Err(InferenceError::malformed(
            backend,
            format!("candidate has no content parts (finishReason: {reason})"),
        ));
    };

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for part in parts {
        if let Some(chunk) = part.get("text").and_then(Value::as_str) {
            text.push_str(chunk);
        } else if let Some(call) = part.get("functionCall") {
            let name = call.get("name").and_then(Value::as_str).ok_or_else(|| {
                InferenceError::malformed(backend, "functionCall without name")
            })?;
            let arguments = call
                .get("args")
                .cloned()
                .unwrap_or_else(|| serde_json::json!({}));
            tool_calls.push(ToolCall::synthesized(name, arguments));
        }
    }
    Ok(NormalizedResponse::from_parts(text, tool_calls))
}

/// Embedding vector stored at `field`; missing or empty vectors are malformed
pub fn vector(backend: BackendKind, value: &Value, field: &str) -> Result<Vec<f32>, InferenceError> {
    let raw = value
        .get(field)
        .ok_or_else(|| InferenceError::malformed(backend, format!("missing '{field}'")))?;
    let vector = Vec::<f32>::deserialize(raw)
        .map_err(|e| InferenceError::malformed(backend, format!("invalid '{field}': {e}")))?;
    if vector.is_empty() {
        return Err(InferenceError::malformed(backend, format!("empty '{field}'")));
    }
    Ok(vector)
}

/// Embeddings envelope `data[{index, embedding}]`, ordered by `index`
pub fn openai_embeddings(
    backend: BackendKind,
    body: &Value,
) -> Result<Vec<Vec<f32>>, InferenceError> {
    let data = body
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| InferenceError::malformed(backend, "missing 'data'"))?;

    let mut indexed = data
        .iter()
        .enumerate()
        .map(|(position, item)| {
            let index = item
                .get("index")
                .and_then(Value::as_u64)
                .unwrap_or(position as u64);
            vector(backend, item, "embedding").map(|v| (index, v))
        })
        .collect::<Result<Vec<_>, _>>()?;
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

/// Shape ordered vectors like the input; a count mismatch is malformed
pub fn embedding(
    backend: BackendKind,
    input: &EmbeddingInput,
    vectors: Vec<Vec<f32>>,
) -> Result<Embedding, InferenceError> {
    Embedding::for_input(input, vectors).map_err(|e| InferenceError::malformed(backend, e.to_string()))
}

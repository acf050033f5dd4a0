//! Request payload builders
//!
//! Pure functions turning a [`CompletionRequest`] or [`ImageRequest`] plus
//! model metadata into a provider request body. Every optional parameter
//! reaches the body through [`merge_whitelisted`], so a parameter the model
//! does not declare is dropped instead of being forwarded.
//!
//! [`ImageRequest`]: domain::ImageRequest

mod chat;
mod image;
mod responses;

use domain::{CompletionRequest, ToolChoice};
use serde_json::{Map, Value, json};
use tracing::debug;

pub use self::{
    chat::{build_chat_payload, build_compatible_payload, chat_messages, chat_tools},
    image::build_image_payload,
    responses::build_responses_payload,
};

/// Instruction used when the caller supplies no system prompt
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Request keys callers can never override through options
pub const RESERVED_KEYS: &[&str] = &["model", "messages", "input", "stream"];

/// Copy every entry of `params` whose key passes `allowed` into `body`
///
/// Keys in [`RESERVED_KEYS`] are never copied. Dropped keys are logged at
/// debug level.
pub fn merge_whitelisted<F>(body: &mut Map<String, Value>, params: Map<String, Value>, allowed: F)
where
    F: Fn(&str) -> bool,
{
    for (key, value) in params {
        if RESERVED_KEYS.contains(&key.as_str()) || !allowed(&key) {
            debug!(param = %key, "Dropping parameter not accepted by model");
            continue;
        }
        body.insert(key, value);
    }
}

/// Caller parameters of a request in their canonical (chat API) names
///
/// Includes sampling settings, stop sequences, response format, tool choice
/// and the free-form `options`. Output tokens and tools are handled by each
/// builder because their key and shape differ per endpoint.
pub fn request_params(request: &CompletionRequest) -> Map<String, Value> {
    let mut params = request.options.clone();

    if let Some(temperature) = request.temperature {
        params.insert("temperature".to_string(), json!(temperature));
    }
    if let Some(top_p) = request.top_p {
        params.insert("top_p".to_string(), json!(top_p));
    }
    if !request.stop.is_empty() {
        params.insert("stop".to_string(), json!(request.stop));
    }
    if let Some(format) = &request.response_format {
        params.insert("response_format".to_string(), format.clone());
    }
    params
}

/// Chat API rendering of a tool choice
pub fn chat_tool_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::None => json!("none"),
        ToolChoice::Required => json!("required"),
        ToolChoice::Function(name) => json!({"type": "function", "function": {"name": name}}),
    }
}

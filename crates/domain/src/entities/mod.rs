//! Domain entities - requests, responses and model capability records

mod chat_message;
mod completion_request;
mod embedding;
mod image_request;
mod model_metadata;
mod response;
mod tool;

pub use chat_message::{ChatMessage, MessageContent, MessageRole};
pub use completion_request::CompletionRequest;
pub use embedding::{Embedding, EmbeddingInput};
pub use image_request::ImageRequest;
pub use model_metadata::{EndpointKind, ModelMetadata, ParameterSchema};
pub use response::NormalizedResponse;
pub use tool::{ToolCall, ToolChoice, ToolDeclaration};

//! Backend adapters
//!
//! One adapter per [`domain::BackendKind`], each implementing
//! [`crate::ports::InferenceBackend`].

mod compatible;
mod hosted;
mod llama_cpp;
mod ollama;
mod vertex;

pub use compatible::CompatibleBackend;
pub use hosted::HostedBackend;
pub use llama_cpp::LlamaCppBackend;
pub use ollama::OllamaBackend;
pub use vertex::VertexBackend;

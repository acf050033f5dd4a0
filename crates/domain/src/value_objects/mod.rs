//! Value Objects - Immutable, identity-less domain primitives

mod backend_kind;
mod execution_context;
mod model_category;

pub use backend_kind::BackendKind;
pub use execution_context::ExecutionContext;
pub use model_category::ModelCategory;

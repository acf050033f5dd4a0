//! Domain layer for ModelGate
//!
//! Contains the request, response and model-capability types shared by every
//! inference backend. This layer performs no I/O and defines the ubiquitous
//! language of the dispatcher.

pub mod entities;
pub mod errors;
pub mod value_objects;

pub use entities::*;
pub use errors::DomainError;
pub use value_objects::*;

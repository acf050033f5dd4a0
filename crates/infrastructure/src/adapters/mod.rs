//! Infrastructure adapters
//!
//! Adapters implement `ai_core` ports and resolve secrets for its
//! configuration types.

mod env_secret_resolver;
mod file_credential_store;

pub use env_secret_resolver::EnvSecretResolver;
pub use file_credential_store::FileCredentialStore;

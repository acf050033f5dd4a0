//! Infrastructure layer - Configuration, logging and credential persistence
//!
//! Implements the credential store port defined in `ai_core`, loads the
//! layered application configuration and wires a ready-to-use dispatcher.

pub mod adapters;
pub mod bootstrap;
pub mod config;
pub mod telemetry;

pub use adapters::{EnvSecretResolver, FileCredentialStore};
pub use bootstrap::build_dispatcher;
pub use config::{AppConfig, ConfigError, CredentialsConfig, LogFormat, LoggingConfig};
pub use telemetry::init_logging;

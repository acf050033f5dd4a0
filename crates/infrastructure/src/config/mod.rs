//! Application configuration
//!
//! Split into focused sub-modules:
//! - `credentials`: OAuth credential store location and refresh skew
//! - `logging`: log filter and format
//!
//! Backend and dispatcher settings are the `ai_core` types themselves.
//!
//! Sources are layered: built-in defaults, then `modelgate.toml` (or an
//! explicit file), then `MODELGATE_*` environment variables with `__`
//! separating nested keys, e.g. `MODELGATE_DISPATCH__MODEL=gpt-4o`.

mod credentials;
mod logging;

use std::path::Path;

use ai_core::{ConfigOverrides, DispatchConfig, DispatcherConfig, InferenceError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub use credentials::CredentialsConfig;
pub use logging::{LogFormat, LoggingConfig};

/// Prefix of environment variables read by [`AppConfig::load`]
pub const ENV_PREFIX: &str = "MODELGATE";

/// Configuration file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "modelgate";

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or deserialized
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// Values were read but do not describe a usable backend
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] InferenceError),
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default backend and named alternates
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Dispatcher settings (default timeout, catalog file)
    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    /// OAuth credential store
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// [`AppConfig`] as read from the sources, before backend tags are checked
#[derive(Debug, Deserialize)]
struct RawAppConfig {
    #[serde(default)]
    dispatch: serde_json::Value,
    #[serde(default)]
    dispatcher: DispatcherConfig,
    #[serde(default)]
    credentials: CredentialsConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

impl RawAppConfig {
    fn into_config(self) -> Result<AppConfig, InferenceError> {
        let dispatch = match self.dispatch {
            serde_json::Value::Null => DispatchConfig::default(),
            value => DispatchConfig::from_value(value)?,
        };
        Ok(AppConfig {
            dispatch,
            dispatcher: self.dispatcher,
            credentials: self.credentials,
            logging: self.logging,
        })
    }
}

impl AppConfig {
    /// Load configuration from defaults, a file, and the environment
    ///
    /// With `path` set the file must exist; otherwise `modelgate.toml` in
    /// the working directory is read when present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let builder = config::Config::builder()
            // Start with defaults
            .set_default("dispatch.backend", "hosted")?
            .set_default("logging.filter", "info")?;

        // Load from file
        let builder = match path {
            Some(path) => {
                debug!(path = %path.display(), "Reading configuration file");
                builder.add_source(config::File::from(path).required(true))
            },
            None => builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        // Override with environment variables (e.g., MODELGATE_DISPATCH__MODEL)
        let builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let raw: RawAppConfig = builder.build()?.try_deserialize()?;
        let config = raw.into_config()?;
        config.validate()?;
        info!(
            backend = %config.dispatch.backend.kind(),
            alternates = config.dispatch.alternates.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Check that the default backend and every alternate can be built
    pub fn validate(&self) -> Result<(), InferenceError> {
        self.dispatch.resolve(&ConfigOverrides::default())?;
        for (name, alternate) in &self.dispatch.alternates {
            alternate.validate().map_err(|e| {
                InferenceError::Configuration(format!("alternate '{name}': {e}"))
            })?;
        }
        Ok(())
    }
}

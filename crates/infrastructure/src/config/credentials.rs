//! Credential store configuration

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// Where OAuth credentials live and when they are refreshed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// TOML file holding the credentials
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Refresh tokens this many seconds before they expire
    #[serde(default = "default_refresh_skew_secs")]
    pub refresh_skew_secs: u64,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("credentials.toml")
}

const fn default_refresh_skew_secs() -> u64 {
    60
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            refresh_skew_secs: default_refresh_skew_secs(),
        }
    }
}

impl CredentialsConfig {
    /// Refresh skew as a duration
    #[must_use]
    pub const fn refresh_skew(&self) -> Duration {
        Duration::from_secs(self.refresh_skew_secs)
    }
}

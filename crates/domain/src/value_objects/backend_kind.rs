//! Backend kind value object
//!
//! The closed set of inference backends the dispatcher can route to.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Kind of inference backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Hosted API whose request shape is driven by the model catalog
    Hosted,
    /// Any server speaking the OpenAI-compatible chat protocol
    Compatible,
    /// Local long-running daemon reached over HTTP (Ollama)
    LocalDaemon,
    /// Local executable spawned per request (llama.cpp)
    LocalSubprocess,
    /// Cloud multi-modal provider authenticated with OAuth2 (Vertex AI)
    CloudMultimodal,
}

impl BackendKind {
    /// All backend kinds, in declaration order
    pub const ALL: [Self; 5] = [
        Self::Hosted,
        Self::Compatible,
        Self::LocalDaemon,
        Self::LocalSubprocess,
        Self::CloudMultimodal,
    ];

    /// Wire name used in configuration files
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hosted => "hosted",
            Self::Compatible => "compatible",
            Self::LocalDaemon => "local_daemon",
            Self::LocalSubprocess => "local_subprocess",
            Self::CloudMultimodal => "cloud_multimodal",
        }
    }

    /// Whether the backend can generate images
    #[must_use]
    pub const fn supports_images(&self) -> bool {
        matches!(self, Self::Hosted | Self::Compatible)
    }

    /// Whether the backend can produce embeddings
    #[must_use]
    pub const fn supports_embeddings(&self) -> bool {
        !matches!(self, Self::LocalSubprocess)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "hosted" => Ok(Self::Hosted),
            "compatible" => Ok(Self::Compatible),
            "local_daemon" => Ok(Self::LocalDaemon),
            "local_subprocess" => Ok(Self::LocalSubprocess),
            "cloud_multimodal" => Ok(Self::CloudMultimodal),
            _ => Err(DomainError::UnknownBackend(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_wire_name() {
        for kind in BackendKind::ALL {
            assert_eq!(kind.as_str().parse::<BackendKind>().unwrap(), kind);
        }
    }

    #[test]
    fn parse_accepts_dashes_and_case() {
        assert_eq!(
            "Local-Daemon".parse::<BackendKind>().unwrap(),
            BackendKind::LocalDaemon
        );
    }

    #[test]
    fn parse_rejects_unknown_names() {
        let err = "bedrock".parse::<BackendKind>().unwrap_err();
        assert!(matches!(err, DomainError::UnknownBackend(name) if name == "bedrock"));
    }

    #[test]
    fn image_support_is_limited_to_openai_style_backends() {
        assert!(BackendKind::Hosted.supports_images());
        assert!(BackendKind::Compatible.supports_images());
        assert!(!BackendKind::LocalDaemon.supports_images());
        assert!(!BackendKind::LocalSubprocess.supports_images());
        assert!(!BackendKind::CloudMultimodal.supports_images());
    }

    #[test]
    fn subprocess_has_no_embeddings() {
        assert!(!BackendKind::LocalSubprocess.supports_embeddings());
        assert!(BackendKind::LocalDaemon.supports_embeddings());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&BackendKind::CloudMultimodal).unwrap();
        assert_eq!(json, "\"cloud_multimodal\"");
    }
}

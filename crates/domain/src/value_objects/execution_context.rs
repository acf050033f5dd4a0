//! Execution context of a dispatcher call
//!
//! Some backends (the local subprocess) may only run on behalf of the
//! single operator that owns the host, never for an arbitrary tenant.

use serde::{Deserialize, Serialize};

/// Who a call is executed for
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum ExecutionContext {
    /// The host operator (single-tenant / root context)
    Privileged,
    /// A regular tenant of a multi-tenant host
    Tenant(String),
    /// No identity supplied
    #[default]
    Anonymous,
}

impl ExecutionContext {
    /// Create a tenant context
    pub fn tenant(id: impl Into<String>) -> Self {
        Self::Tenant(id.into())
    }

    /// Whether the call runs in the privileged operator context
    #[must_use]
    pub const fn is_privileged(&self) -> bool {
        matches!(self, Self::Privileged)
    }

    /// Short description used in error messages
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Privileged => "privileged".to_string(),
            Self::Tenant(id) => format!("tenant '{id}'"),
            Self::Anonymous => "anonymous".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_not_privileged() {
        assert!(!ExecutionContext::default().is_privileged());
    }

    #[test]
    fn only_privileged_is_privileged() {
        assert!(ExecutionContext::Privileged.is_privileged());
        assert!(!ExecutionContext::tenant("site-2").is_privileged());
    }

    #[test]
    fn describe_names_the_tenant() {
        assert_eq!(ExecutionContext::tenant("site-2").describe(), "tenant 'site-2'");
    }
}

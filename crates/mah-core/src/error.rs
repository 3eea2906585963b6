/// Errors raised while loading, validating, or persisting the gateway setting.
///
/// Every variant is fatal to the operation that produced it. Nothing in the
/// config layer retries on its own.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A stored value is present but cannot be coerced to its declared type.
    #[error("Failed to parse config key '{key}': {reason}")]
    Parse { key: String, reason: String },

    /// A value is well-typed but semantically invalid.
    #[error("Invalid config value for '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// Writing the setting back to storage failed.
    #[error("Failed to persist config to {target}: {reason}")]
    Persist { target: String, reason: String },
}

impl ConfigError {
    pub fn parse(key: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Parse {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub fn validation(field: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.to_string(),
        }
    }

    pub fn persist(target: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Persist {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    pub fn is_persist(&self) -> bool {
        matches!(self, Self::Persist { .. })
    }
}

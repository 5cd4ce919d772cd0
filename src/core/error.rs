//! Engine error types

use thiserror::Error;

/// Errors that can occur in the permission engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// Profile id did not resolve
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    /// Rule id did not resolve within its profile
    #[error("Rule not found: {0}")]
    RuleNotFound(String),

    /// Attempt to modify or delete a built-in profile's rule set
    #[error("Built-in profile is immutable: {0}")]
    BuiltInImmutable(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persistence collaborator failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EngineError {
    /// Create a storage error from a message
    pub fn storage(msg: impl Into<String>) -> Self {
        EngineError::Storage(msg.into())
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::ProfileNotFound("abc123".into());
        assert_eq!(err.to_string(), "Profile not found: abc123");

        let err = EngineError::BuiltInImmutable("conservative".into());
        assert_eq!(err.to_string(), "Built-in profile is immutable: conservative");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let engine_err: EngineError = io_err.into();
        assert!(matches!(engine_err, EngineError::Io(_)));
    }
}

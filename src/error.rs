use thiserror::Error;

/// Engine error types.
///
/// Configuration and data errors are raised synchronously before any I/O;
/// connection/execution/metadata errors wrap driver failures unmodified
/// (no retry, no partial result).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Field resolution error: {0}")]
    FieldResolution(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query execution failed: {0}")]
    Execution(String),

    #[error("Metadata retrieval failed: {0}")]
    Metadata(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// True for errors detected while compiling the request, before any I/O.
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            EngineError::Configuration(_)
                | EngineError::FieldResolution(_)
                | EngineError::Validation(_)
        )
    }
}

/// Convert anyhow::Error to EngineError
impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_classification() {
        assert!(EngineError::Validation("between needs two values".into()).is_compile_error());
        assert!(EngineError::FieldResolution("no such field".into()).is_compile_error());
        assert!(!EngineError::Execution("boom".into()).is_compile_error());
    }

    #[test]
    fn test_error_display() {
        let err = EngineError::Configuration("unsupported engine type: foo".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: unsupported engine type: foo"
        );
    }
}

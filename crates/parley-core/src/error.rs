use thiserror::Error;

/// Top-level error type for Parley.
#[derive(Debug, Error)]
pub enum ParleyError {
    /// The operation was superseded by a newer message and abandoned.
    #[error("operation cancelled")]
    Cancelled,

    /// Error from an LLM backend.
    #[error("provider error: {0}")]
    Provider(String),

    /// Error from a transcription, vision, or diffusion backend.
    #[error("enhancer error: {0}")]
    Enhancer(String),

    /// Error from a messaging connector.
    #[error("channel error: {0}")]
    Channel(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Storage error.
    #[error("memory error: {0}")]
    Memory(String),

    /// The bot owner has no model configuration stored.
    #[error("owner {0} has no model config")]
    MissingModelConfig(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ParleyError {
    /// Whether this error means the work was superseded rather than failed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_is_distinguishable() {
        assert!(ParleyError::Cancelled.is_cancelled());
        assert!(!ParleyError::Provider("boom".into()).is_cancelled());
        assert!(!ParleyError::MissingModelConfig("owner".into()).is_cancelled());
    }

    #[test]
    fn test_missing_model_config_display() {
        let err = ParleyError::MissingModelConfig("u-1".into());
        assert_eq!(err.to_string(), "owner u-1 has no model config");
    }
}

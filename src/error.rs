use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Confirmed price ${price:.2} is outside the permitted range ${floor:.2}..=${ceiling:.2}")]
    PolicyViolation {
        price: f64,
        floor: f64,
        ceiling: f64,
    },

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Generation exceeded the maximum wait of {max_wait_seconds}s")]
    GenerationTimeout { max_wait_seconds: u64 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl EngineError {
    /// Whether the caller may retry the same request unchanged. Provider and
    /// network failures never consume a negotiation turn.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::ProviderUnavailable(_) | EngineError::Network(_)
        )
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}

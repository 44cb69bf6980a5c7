use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    // Generation errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    #[error("Provider not supported: {0}")]
    UnsupportedProvider(String),

    #[error("No API key configured for provider: {0}")]
    MissingCredential(String),

    // Retrieval errors
    #[error("Embedding request failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Database error: {0}")]
    Database(String),

    // Web search errors
    #[error("Web search failed: {provider}: {message}")]
    WebSearch { provider: String, message: String },

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    #[error("Unknown component kind: {0}")]
    UnknownComponentKind(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FlowError {
    /// Whether this error stems from misconfiguration rather than a failed call.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            FlowError::UnsupportedProvider(_)
                | FlowError::MissingCredential(_)
                | FlowError::Config(_)
                | FlowError::ConfigNotFound(_)
                | FlowError::UnknownComponentKind(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;

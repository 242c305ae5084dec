use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrollError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Request error: {0}")]
    RequestError(String),
    #[error("Response error: {0}")]
    ResponseError(String),
    #[error("Backend error: {0}")]
    TransientBackendError(String),
    #[error("Timed out: {0}")]
    TimeoutError(String),
    #[error("Image processing error: {0}")]
    ImageProcessingError(String),
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),
    #[error("Prompt evolution error: {0}")]
    PromptEvolutionError(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Generation failed: {0}")]
    GenerationFailed(String),
}

impl ScrollError {
    /// Stable class name reported in HTTP error bodies.
    pub fn error_class(&self) -> &'static str {
        match self {
            ScrollError::ConfigError(_) => "ConfigurationError",
            ScrollError::RequestError(_)
            | ScrollError::ResponseError(_)
            | ScrollError::TransientBackendError(_)
            | ScrollError::TimeoutError(_) => "TransientBackendError",
            ScrollError::ImageProcessingError(_) => "ImageProcessingError",
            ScrollError::DegenerateGeometry(_) => "DegenerateGeometryError",
            ScrollError::PromptEvolutionError(_) => "PromptEvolutionError",
            ScrollError::InvalidInput(_) => "InvalidInput",
            ScrollError::GenerationFailed(_) => "GenerationFailed",
        }
    }

    /// Errors that the pipeline routes into its next fallback strategy.
    /// A rejected credential fails the same way on every model, so it ends the attempt.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            ScrollError::InvalidInput(_) | ScrollError::ConfigError(_)
        )
    }
}

impl From<image::ImageError> for ScrollError {
    fn from(e: image::ImageError) -> Self {
        ScrollError::ImageProcessingError(e.to_string())
    }
}

/// The request URL is stripped; it may carry credentials.
impl From<reqwest::Error> for ScrollError {
    fn from(e: reqwest::Error) -> Self {
        let e = e.without_url();
        if e.is_timeout() {
            ScrollError::TimeoutError(e.to_string())
        } else if e.is_decode() {
            ScrollError::ResponseError(e.to_string())
        } else {
            ScrollError::TransientBackendError(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ScrollError>;

use crate::{
    error::Result,
    models::{ImageGenerationRequest, ImageGenerationResponse, TextGenerationRequest, TextGenerationResponse},
};
use async_trait::async_trait;

#[async_trait]
pub trait ImageBackend: Send + Sync {
    async fn generate(&self, request: ImageGenerationRequest) -> Result<ImageGenerationResponse>;

    /// Whether credentials for this backend are present.
    fn is_configured(&self) -> bool;
}

#[async_trait]
pub trait TextBackend: Send + Sync {
    async fn generate(&self, request: TextGenerationRequest) -> Result<TextGenerationResponse>;

    fn is_configured(&self) -> bool;
}

/// Resolves an image reference (http(s) URL or data URL) to encoded bytes.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn load(&self, reference: &str) -> Result<Vec<u8>>;
}

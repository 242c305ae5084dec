pub mod gemini;
pub mod replicate;
pub mod source;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use crate::{config::AppConfig, error::Result};

pub use gemini::GeminiClient;
pub use replicate::ReplicateClient;
pub use source::HttpImageSource;
pub use traits::{ImageBackend, ImageSource, TextBackend};

/// The three external collaborators a tile request talks to.
#[derive(Clone)]
pub struct Backends {
    image: Arc<dyn ImageBackend>,
    text: Arc<dyn TextBackend>,
    source: Arc<dyn ImageSource>,
}

impl Backends {
    pub fn new(
        image: Arc<dyn ImageBackend>,
        text: Arc<dyn TextBackend>,
        source: Arc<dyn ImageSource>,
    ) -> Self {
        Self {
            image,
            text,
            source,
        }
    }

    /// Replicate for images, Gemini for text, plain HTTP for downloads.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let image = ReplicateClient::new(&config.replicate, config.timeouts.generation)?;
        let text = GeminiClient::new(&config.gemini, config.timeouts.text)?;
        let source = HttpImageSource::new(config.timeouts.download)?;
        Ok(Self::new(Arc::new(image), Arc::new(text), Arc::new(source)))
    }

    pub fn image(&self) -> &Arc<dyn ImageBackend> {
        &self.image
    }

    pub fn text(&self) -> &Arc<dyn TextBackend> {
        &self.text
    }

    pub fn source(&self) -> &Arc<dyn ImageSource> {
        &self.source
    }
}

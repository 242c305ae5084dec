use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::{
    backends::traits::ImageSource,
    error::{Result, ScrollError},
    outpaint::raster,
};

/// Same ceiling as the inline JSON body limit.
pub const MAX_DOWNLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Loads predecessor and generated tiles. Data URLs never touch the network.
#[derive(Clone)]
pub struct HttpImageSource {
    client: Client,
    max_bytes: usize,
}

impl HttpImageSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScrollError::ConfigError(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            max_bytes: MAX_DOWNLOAD_BYTES,
        })
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn too_large(&self, size: u64) -> ScrollError {
        ScrollError::ImageProcessingError(format!(
            "image download of {} bytes exceeds the {} byte limit",
            size, self.max_bytes
        ))
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn load(&self, reference: &str) -> Result<Vec<u8>> {
        if raster::is_data_url(reference) {
            return raster::parse_data_url(reference);
        }
        if !(reference.starts_with("http://") || reference.starts_with("https://")) {
            return Err(ScrollError::ImageProcessingError(
                "image reference is neither a data URL nor an http(s) URL".into(),
            ));
        }

        log::debug!("⬇️  Downloading image: {}", reference);
        let mut response = self.client.get(reference).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrollError::TransientBackendError(format!(
                "image download returned {}",
                status
            )));
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes as u64 {
                return Err(self.too_large(length));
            }
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large((bytes.len() + chunk.len()) as u64));
            }
            bytes.extend_from_slice(&chunk);
        }
        log::debug!("⬇️  Downloaded {} KB", bytes.len() / 1024);
        Ok(bytes)
    }
}

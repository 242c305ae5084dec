use std::sync::Arc;

use image::DynamicImage;

use super::raster;
use super::slice::SliceSpec;
use crate::backends::ImageSource;
use crate::error::{Result, ScrollError};

/// Rows removed from the top of a generated tile: exactly the reused band.
pub fn crop_amount(spec: &SliceSpec) -> u32 {
    spec.slice_height
}

/// Drops the top `amount` rows. Returns the image untouched when nothing would remain.
pub fn crop_top(image: &DynamicImage, amount: u32) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    if amount == 0 || amount >= height {
        if amount >= height {
            log::warn!(
                "⚠️  Crop of {}px would consume the whole {}px tile, leaving it uncropped",
                amount,
                height
            );
        }
        return image.clone();
    }
    image.crop_imm(0, amount, width, height - amount)
}

/// Post-generation cropper working on image references.
#[derive(Clone)]
pub struct Cropper {
    source: Arc<dyn ImageSource>,
}

impl Cropper {
    pub fn new(source: Arc<dyn ImageSource>) -> Self {
        Self { source }
    }

    /// Crops the generated tile and returns it as a PNG data URL.
    ///
    /// Never fails: on any load or processing error the original reference is
    /// handed back.
    pub async fn crop_reference(&self, reference: &str, spec: &SliceSpec) -> String {
        match self.try_crop(reference, spec).await {
            Ok(cropped) => cropped,
            Err(e) => {
                log::warn!("⚠️  Cropping failed, keeping the uncropped tile: {}", e);
                reference.to_string()
            }
        }
    }

    async fn try_crop(&self, reference: &str, spec: &SliceSpec) -> Result<String> {
        let bytes = self.source.load(reference).await?;
        let amount = crop_amount(spec);
        tokio::task::spawn_blocking(move || crop_encoded(&bytes, amount))
            .await
            .map_err(|e| ScrollError::ImageProcessingError(format!("crop task failed: {}", e)))?
    }
}

/// Decodes, crops and re-encodes a generated tile as a PNG data URL.
fn crop_encoded(bytes: &[u8], amount: u32) -> Result<String> {
    let generated = raster::decode(bytes)?;
    let cropped = crop_top(&generated, amount);

    log::info!(
        "✂️  Cropped tile {}x{} → {}x{}",
        generated.width(),
        generated.height(),
        cropped.width(),
        cropped.height()
    );

    raster::png_data_url(&cropped)
}

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat};

use crate::error::{Result, ScrollError};

const DATA_URL_PREFIX: &str = "data:";

pub fn is_data_url(reference: &str) -> bool {
    reference.starts_with(DATA_URL_PREFIX)
}

/// Decodes a `data:<mime>;base64,<payload>` URL into raw bytes.
pub fn parse_data_url(reference: &str) -> Result<Vec<u8>> {
    let rest = reference.strip_prefix(DATA_URL_PREFIX).ok_or_else(|| {
        ScrollError::ImageProcessingError("not a data URL".into())
    })?;
    let (meta, payload) = rest.split_once(',').ok_or_else(|| {
        ScrollError::ImageProcessingError("data URL has no payload separator".into())
    })?;
    if !meta.ends_with(";base64") {
        return Err(ScrollError::ImageProcessingError(format!(
            "unsupported data URL encoding '{}'",
            meta
        )));
    }
    STANDARD
        .decode(payload.trim())
        .map_err(|e| ScrollError::ImageProcessingError(format!("invalid base64 payload: {}", e)))
}

pub fn to_data_url(bytes: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Decodes an encoded raster and rejects empty images.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    let image = image::load_from_memory(bytes)?;
    if image.width() == 0 || image.height() == 0 {
        return Err(ScrollError::DegenerateGeometry(format!(
            "decoded image is {}x{}",
            image.width(),
            image.height()
        )));
    }
    Ok(image)
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

pub fn png_data_url(image: &DynamicImage) -> Result<String> {
    Ok(to_data_url(&encode_png(image)?, "image/png"))
}

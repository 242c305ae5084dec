use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

use super::raster;
use super::slice::SliceSpec;
use crate::config::{GradientCurve, SliceSettings};
use crate::error::{Result, ScrollError};

pub const PRESERVE: u8 = 0;
pub const GENERATE: u8 = 255;

/// Canvas and mask handed to an inpainting backend, plus the geometry that produced them.
#[derive(Debug, Clone)]
pub struct OutpaintInputs {
    pub canvas: RgbImage,
    pub mask: GrayImage,
    pub spec: SliceSpec,
}

impl OutpaintInputs {
    /// `(canvas, mask)` as PNG data URLs.
    pub fn to_data_urls(&self) -> Result<(String, String)> {
        let canvas = raster::png_data_url(&DynamicImage::ImageRgb8(self.canvas.clone()))?;
        let mask = raster::png_data_url(&DynamicImage::ImageLuma8(self.mask.clone()))?;
        Ok((canvas, mask))
    }
}

#[derive(Debug, Clone)]
pub struct OutpaintBuilder {
    width: u32,
    height: u32,
    settings: SliceSettings,
}

impl OutpaintBuilder {
    pub fn new(width: u32, height: u32, settings: SliceSettings) -> Self {
        Self {
            width,
            height,
            settings,
        }
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn build_from_bytes(&self, bytes: &[u8]) -> Result<OutpaintInputs> {
        let predecessor = raster::decode(bytes)?;
        self.build(&predecessor)
    }

    pub fn build(&self, predecessor: &DynamicImage) -> Result<OutpaintInputs> {
        let (pred_width, pred_height) = (predecessor.width(), predecessor.height());
        if pred_width == 0 {
            return Err(ScrollError::DegenerateGeometry(
                "predecessor has zero width".into(),
            ));
        }
        let spec = SliceSpec::compute(pred_height, self.height, &self.settings)?;

        log::debug!(
            "📏 Slicing {}px from the bottom of a {}x{} predecessor",
            spec.slice_height,
            pred_width,
            pred_height
        );

        let band = bottom_band(predecessor, spec.slice_height, self.width);
        let canvas = compose_canvas(&band, self.width, self.height, self.settings.canvas_fill);
        let mask = build_mask(self.width, self.height, &spec, self.settings.gradient_curve);

        log::debug!(
            "📏 Mask: preserve {}px, gradient {}px, generate {}px",
            spec.preserve_height,
            spec.gradient_zone,
            spec.generate_height(self.height)
        );

        Ok(OutpaintInputs { canvas, mask, spec })
    }
}

/// Bottom `rows` of `source` at full width, stretched horizontally to `target_width`.
fn bottom_band(source: &DynamicImage, rows: u32, target_width: u32) -> RgbImage {
    let rgb = source.to_rgb8();
    let (width, height) = rgb.dimensions();
    let band = imageops::crop_imm(&rgb, 0, height - rows, width, rows).to_image();
    if width == target_width {
        band
    } else {
        imageops::resize(&band, target_width, rows, FilterType::Lanczos3)
    }
}

fn compose_canvas(band: &RgbImage, width: u32, height: u32, fill: [u8; 3]) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(width, height, Rgb(fill));
    imageops::replace(&mut canvas, band, 0, 0);
    canvas
}

/// Black over the preserved rows, a ramp across the gradient zone, white below.
pub fn build_mask(width: u32, height: u32, spec: &SliceSpec, curve: GradientCurve) -> GrayImage {
    let mut mask = GrayImage::from_pixel(width, height, Luma([GENERATE]));
    for (_, y, pixel) in mask.enumerate_pixels_mut() {
        if y < spec.preserve_height {
            *pixel = Luma([PRESERVE]);
        } else if y < spec.slice_height {
            let i = y - spec.preserve_height;
            *pixel = Luma([gradient_intensity(i, spec.gradient_zone, curve)]);
        }
    }
    mask
}

/// Unquantized ramp value in `[0, 255)` for row `i` of a `zone`-row band.
pub fn ramp_value(i: u32, zone: u32, curve: GradientCurve) -> f32 {
    if zone == 0 {
        return GENERATE as f32;
    }
    let t = i as f32 / zone as f32;
    match curve {
        GradientCurve::Linear => 255.0 * t,
        GradientCurve::Exponential => 255.0 * t * t,
    }
}

pub fn gradient_intensity(i: u32, zone: u32, curve: GradientCurve) -> u8 {
    ramp_value(i, zone, curve).floor().clamp(0.0, 255.0) as u8
}

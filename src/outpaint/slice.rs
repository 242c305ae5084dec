use serde::Serialize;

use crate::config::SliceSettings;
use crate::error::{Result, ScrollError};

/// How much of a predecessor's bottom band is carried into the next canvas.
///
/// Rows `[0, preserve_height)` of the next canvas are kept verbatim, rows
/// `[preserve_height, slice_height)` blend into new content, and everything
/// below `slice_height` is generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SliceSpec {
    pub slice_height: u32,
    pub gradient_zone: u32,
    pub preserve_height: u32,
}

impl SliceSpec {
    pub fn compute(
        predecessor_height: u32,
        canvas_height: u32,
        settings: &SliceSettings,
    ) -> Result<Self> {
        if predecessor_height == 0 {
            return Err(ScrollError::DegenerateGeometry(
                "predecessor has zero height".into(),
            ));
        }

        let slice_height = fraction_of(predecessor_height, settings.ratio)
            .min(settings.max_slice_height)
            .min(fraction_of(predecessor_height, settings.max_ratio));

        if slice_height == 0 {
            return Err(ScrollError::DegenerateGeometry(format!(
                "slice of a {}px predecessor rounds down to zero rows",
                predecessor_height
            )));
        }
        if slice_height >= predecessor_height {
            return Err(ScrollError::DegenerateGeometry(format!(
                "slice height {} reaches past predecessor height {}",
                slice_height, predecessor_height
            )));
        }
        if slice_height >= canvas_height {
            return Err(ScrollError::DegenerateGeometry(format!(
                "slice height {} leaves no rows to generate on a {}px canvas",
                slice_height, canvas_height
            )));
        }

        let gradient_zone = fraction_of(slice_height, settings.gradient_ratio)
            .min(settings.max_gradient_zone)
            .min(slice_height);

        Ok(SliceSpec {
            slice_height,
            gradient_zone,
            preserve_height: slice_height - gradient_zone,
        })
    }

    /// Rows the backend is asked to create from scratch.
    pub fn generate_height(&self, canvas_height: u32) -> u32 {
        canvas_height.saturating_sub(self.slice_height)
    }
}

/// `floor(value * ratio)`
pub fn fraction_of(value: u32, ratio: f64) -> u32 {
    if ratio <= 0.0 {
        return 0;
    }
    (value as f64 * ratio).floor() as u32
}

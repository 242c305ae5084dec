//! Image geometry that stitches consecutive tiles together: the bottom band of
//! a predecessor seeds the next canvas, a mask tells the backend what to keep,
//! and the reused band is cropped off the result.

pub mod crop;
pub mod mask;
pub mod raster;
pub mod slice;

pub use crop::{crop_amount, crop_top, Cropper};
pub use mask::{build_mask, gradient_intensity, OutpaintBuilder, OutpaintInputs};
pub use slice::SliceSpec;

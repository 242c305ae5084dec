//! Endless scroll of aerial tiles, each one outpainted from the bottom band of
//! the tile above it.
//!
//! The pieces:
//! - [`outpaint`] slices a predecessor, builds the canvas and mask, and crops
//!   the generated result.
//! - [`pipeline`] evolves the scene prompt and runs the fallback strategies.
//! - [`backends`] holds the Replicate and Gemini clients behind async traits.
//! - `server` (feature `server`) exposes the pipeline over HTTP.

pub mod backends;
pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod outpaint;
pub mod pipeline;

#[cfg(feature = "server")]
pub mod server;

pub use backends::{Backends, GeminiClient, HttpImageSource, ReplicateClient};
pub use config::{AppConfig, GeminiConfig, GradientCurve, ReplicateConfig, SliceSettings, TimeoutSettings};
pub use error::{Result, ScrollError};
pub use models::{ModelProfile, ModelRegistry};
pub use outpaint::{Cropper, OutpaintBuilder, OutpaintInputs, SliceSpec};
pub use pipeline::{TileGenerator, TileOutcome, TileRequest};

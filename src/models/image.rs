use serde::{Deserialize, Serialize};

/// Input handed to an image backend. `image` and `mask` are PNG data URLs and
/// are only set for inpainting-capable profiles.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImageGenerationRequest {
    #[serde(skip)]
    pub model: String,
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub num_inference_steps: u32,
    pub guidance_scale: f32,
    pub num_outputs: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u32>,
}

impl ImageGenerationRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, width: u32, height: u32) -> Self {
        ImageGenerationRequest {
            model: model.into(),
            prompt: prompt.into(),
            width,
            height,
            num_inference_steps: 4,
            guidance_scale: 0.0,
            num_outputs: 1,
            image: None,
            mask: None,
            seed: None,
        }
    }

    pub fn with_sampling(mut self, steps: u32, guidance_scale: f32) -> Self {
        self.num_inference_steps = steps;
        self.guidance_scale = guidance_scale;
        self
    }

    pub fn with_inpainting(mut self, image: String, mask: String) -> Self {
        self.image = Some(image);
        self.mask = Some(mask);
        self
    }

    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn is_inpainting(&self) -> bool {
        self.image.is_some() && self.mask.is_some()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImageGenerationResponse {
    /// URLs or data URLs, first one is the tile.
    pub images: Vec<String>,
    pub model: String,
}

impl ImageGenerationResponse {
    pub fn first(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl PredictionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PredictionStatus::Succeeded | PredictionStatus::Failed | PredictionStatus::Canceled
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictionUrls {
    pub get: Option<String>,
}

/// Replicate prediction object, as returned by create and get.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplicatePrediction {
    pub id: String,
    pub status: PredictionStatus,
    #[serde(default)]
    pub output: Option<PredictionOutput>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    #[serde(default)]
    pub urls: Option<PredictionUrls>,
}

/// Models return either a single URL or a list of them.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PredictionOutput {
    Single(String),
    Many(Vec<String>),
}

impl PredictionOutput {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            PredictionOutput::Single(url) => vec![url],
            PredictionOutput::Many(urls) => urls,
        }
    }
}

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::ScrollError,
    models::ModelProfile,
    outpaint::SliceSpec,
    pipeline::{AttemptRecord, TileOutcome, TileRequest, MAX_INFERENCE_STEPS, MIN_INFERENCE_STEPS},
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateNextImageRequest {
    pub previous_image: Option<String>,
    pub current_prompt: Option<String>,
    pub original_user_prompt: Option<String>,
    pub model_name: Option<String>,
    #[serde(default)]
    pub debug_mode: bool,
    pub inference_steps: Option<i64>,
    pub session_id: Option<String>,
}

impl GenerateNextImageRequest {
    pub fn into_tile_request(self) -> TileRequest {
        TileRequest {
            previous_image: self.previous_image,
            current_prompt: self.current_prompt,
            original_user_prompt: self.original_user_prompt,
            model_name: self.model_name,
            inference_steps: self
                .inference_steps
                .map(|s| s.clamp(MIN_INFERENCE_STEPS as i64, MAX_INFERENCE_STEPS as i64) as u32),
            session_id: self.session_id,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub original_prompt: Option<String>,
    pub final_prompt: String,
    pub model_config: ModelProfile,
    pub strategy: &'static str,
    pub slice: Option<SliceSpec>,
    pub attempts: Vec<AttemptRecord>,
    pub evolution_fell_back: bool,
    pub total_time_ms: u64,
    pub is_initial: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateNextImageResponse {
    pub image_url: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_user_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evolved_prompt: Option<String>,
    pub model_used: String,
    pub requested_model: String,
    /// Milliseconds spent in the image backend call.
    pub generation_time: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub width: u32,
    pub height: u32,
    pub is_initial: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<DebugInfo>,
}

impl GenerateNextImageResponse {
    pub fn from_outcome(outcome: TileOutcome, debug: bool, original_prompt: Option<String>) -> Self {
        let debug_info = debug.then(|| DebugInfo {
            original_prompt,
            final_prompt: outcome.final_prompt.clone(),
            model_config: outcome.model_profile.clone(),
            strategy: outcome.strategy,
            slice: outcome.slice,
            attempts: outcome.attempts.clone(),
            evolution_fell_back: outcome.evolution_fell_back,
            total_time_ms: outcome.total_time_ms,
            is_initial: outcome.is_initial,
        });

        GenerateNextImageResponse {
            image_url: outcome.image_url,
            prompt: outcome.prompt,
            original_user_prompt: outcome.original_user_prompt,
            evolved_prompt: outcome.evolved_prompt,
            model_used: outcome.model_used,
            requested_model: outcome.requested_model,
            generation_time: outcome.generation_time_ms,
            session_id: outcome.session_id,
            width: outcome.width,
            height: outcome.height,
            is_initial: outcome.is_initial,
            timestamp: outcome.timestamp,
            debug_info,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelsResponse {
    pub available_models: Vec<String>,
    pub default_model: String,
    pub model_configs: BTreeMap<String, ModelProfile>,
}

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub replicate: bool,
    pub gemini: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub environment: String,
    pub services: ServiceStatus,
    pub available_models: Vec<String>,
    pub default_model: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResetResponse {
    pub session_id: String,
    pub reset: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: &'static str,
    pub error_class: &'static str,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorBody {
    pub fn from_error(error: &ScrollError) -> Self {
        let headline = match error {
            ScrollError::InvalidInput(_) => "Invalid request",
            ScrollError::GenerationFailed(_) => "Failed to generate image",
            _ => "Internal server error",
        };
        ErrorBody {
            error: headline,
            error_class: error.error_class(),
            details: error.to_string(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_accepts_partial_camel_case_body() {
        let body: GenerateNextImageRequest = serde_json::from_str(
            r#"{"previousImage":"https://x/1.png","modelName":"flux-fill-pro","inferenceSteps":-3}"#,
        )
        .unwrap();
        assert!(!body.debug_mode);
        let request = body.into_tile_request();
        assert_eq!(request.previous_image.as_deref(), Some("https://x/1.png"));
        assert_eq!(request.inference_steps, Some(MIN_INFERENCE_STEPS));
        assert!(request.current_prompt.is_none());
    }

    #[test]
    fn test_error_body_shape() {
        let body = ErrorBody::from_error(&ScrollError::GenerationFailed("backend down".into()));
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["error"], "Failed to generate image");
        assert_eq!(value["errorClass"], "GenerationFailed");
        assert_eq!(value["details"], "Generation failed: backend down");
        assert!(value["timestamp"].is_string());
    }
}

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::json;

use crate::{
    backends::traits::ImageBackend,
    config::ReplicateConfig,
    error::{Result, ScrollError},
    models::{
        ImageGenerationRequest, ImageGenerationResponse, PredictionStatus, ReplicatePrediction,
    },
};

/// Replicate caps the synchronous `Prefer: wait` window at 60 seconds.
const MAX_SYNC_WAIT_SECS: u64 = 60;

#[derive(Clone)]
pub struct ReplicateClient {
    client: Client,
    api_token: Option<String>,
    base_url: String,
    poll_interval: Duration,
    timeout: Duration,
}

impl ReplicateClient {
    pub fn new(config: &ReplicateConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScrollError::ConfigError(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_token: config.api_token.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            poll_interval: config.poll_interval,
            timeout,
        })
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<ReplicatePrediction> {
        let response = self.authorize(builder).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }
        let prediction = response.json::<ReplicatePrediction>().await?;
        Ok(prediction)
    }

    async fn run_prediction(&self, request: &ImageGenerationRequest) -> Result<ReplicatePrediction> {
        let url = format!("{}/models/{}/predictions", self.base_url, request.model);
        let wait = self.timeout.as_secs().clamp(1, MAX_SYNC_WAIT_SECS);

        let mut prediction = self
            .send(
                self.client
                    .post(&url)
                    .header("Prefer", format!("wait={}", wait))
                    .json(&json!({ "input": request })),
            )
            .await?;

        let deadline = Instant::now() + self.timeout;
        while !prediction.status.is_terminal() {
            if Instant::now() >= deadline {
                return Err(ScrollError::TimeoutError(format!(
                    "prediction {} still {:?} after {}ms",
                    prediction.id,
                    prediction.status,
                    self.timeout.as_millis()
                )));
            }
            tokio::time::sleep(self.poll_interval).await;

            let poll_url = prediction
                .urls
                .as_ref()
                .and_then(|u| u.get.clone())
                .unwrap_or_else(|| format!("{}/predictions/{}", self.base_url, prediction.id));
            log::debug!("🔄 Polling prediction {} ({:?})", prediction.id, prediction.status);
            prediction = self.send(self.client.get(&poll_url)).await?;
        }

        Ok(prediction)
    }
}

fn classify_status(status: StatusCode, body: &str) -> ScrollError {
    let message = format!("Replicate returned {}: {}", status, body);
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        ScrollError::TransientBackendError(message)
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        ScrollError::ConfigError(message)
    } else {
        ScrollError::RequestError(message)
    }
}

fn into_response(prediction: ReplicatePrediction, model: &str) -> Result<ImageGenerationResponse> {
    match prediction.status {
        PredictionStatus::Succeeded => {
            let images = prediction.output.map(|o| o.into_vec()).unwrap_or_default();
            if images.is_empty() {
                return Err(ScrollError::ResponseError("No images generated".into()));
            }
            Ok(ImageGenerationResponse {
                images,
                model: model.to_string(),
            })
        }
        status => Err(ScrollError::TransientBackendError(format!(
            "prediction {} ended {:?}: {}",
            prediction.id,
            status,
            prediction
                .error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no error message".into())
        ))),
    }
}

#[async_trait]
impl ImageBackend for ReplicateClient {
    async fn generate(&self, request: ImageGenerationRequest) -> Result<ImageGenerationResponse> {
        log::info!(
            "🎨 Generating image with model: {} ({} steps, guidance {}, inpainting: {})",
            request.model,
            request.num_inference_steps,
            request.guidance_scale,
            request.is_inpainting()
        );

        let prediction = tokio::time::timeout(self.timeout, self.run_prediction(&request))
            .await
            .map_err(|_| {
                ScrollError::TimeoutError(format!(
                    "image generation exceeded {}ms",
                    self.timeout.as_millis()
                ))
            })??;

        into_response(prediction, &request.model)
    }

    fn is_configured(&self) -> bool {
        self.api_token.is_some()
    }
}

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::{
    backends::traits::TextBackend,
    config::GeminiConfig,
    error::{Result, ScrollError},
    models::{GeminiResponse, TextGenerationRequest, TextGenerationResponse},
};

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScrollError::ConfigError(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn build_payload(request: &TextGenerationRequest) -> serde_json::Value {
        json!({
            "contents": [
                {
                    "role": "user",
                    "parts": [{ "text": request.prompt }]
                }
            ],
            "generationConfig": {
                "maxOutputTokens": request.max_tokens.unwrap_or(256),
                "temperature": request.temperature.unwrap_or(0.9)
            }
        })
    }

    async fn call(&self, request: &TextGenerationRequest) -> Result<TextGenerationResponse> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let mut builder = self.client.post(&url).json(&Self::build_payload(request));
        if let Some(key) = &self.api_key {
            builder = builder.header(API_KEY_HEADER, key);
        }

        log::info!("🧠 Invoking text model: {}", self.model);
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScrollError::TransientBackendError(format!(
                "Gemini returned {}: {}",
                status, body
            )));
        }

        let parsed: GeminiResponse = response.json().await?;
        let finish_reason = parsed
            .candidates
            .first()
            .and_then(|c| c.finish_reason.clone());
        let text = parsed.text().ok_or_else(|| {
            ScrollError::ResponseError(format!(
                "Gemini returned no text (finish reason: {})",
                finish_reason.as_deref().unwrap_or("unknown")
            ))
        })?;

        Ok(TextGenerationResponse {
            text,
            model: self.model.clone(),
            finish_reason,
        })
    }
}

#[async_trait]
impl TextBackend for GeminiClient {
    async fn generate(&self, request: TextGenerationRequest) -> Result<TextGenerationResponse> {
        tokio::time::timeout(self.timeout, self.call(&request))
            .await
            .map_err(|_| {
                ScrollError::TimeoutError(format!(
                    "text generation exceeded {}ms",
                    self.timeout.as_millis()
                ))
            })?
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let mut request = TextGenerationRequest::new("Current scene: a coral reef");
        request.max_tokens = Some(120);
        let payload = GeminiClient::build_payload(&request);
        assert_eq!(payload["contents"][0]["parts"][0]["text"], "Current scene: a coral reef");
        assert_eq!(payload["generationConfig"]["maxOutputTokens"], 120);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_recoverable_error() {
        let config = GeminiConfig::new().with_api_key("test");
        let mut client = GeminiClient::new(&config, Duration::from_millis(500)).unwrap();
        client.base_url = "http://127.0.0.1:9".to_string();
        let err = client
            .generate(TextGenerationRequest::new("hello"))
            .await
            .unwrap_err();
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_api_key_never_reaches_error_text() {
        let config = GeminiConfig::new().with_api_key("SECRET123");
        let mut client = GeminiClient::new(&config, Duration::from_millis(500)).unwrap();
        client.base_url = "http://127.0.0.1:9".to_string();
        let err = client
            .generate(TextGenerationRequest::new("hello"))
            .await
            .unwrap_err();
        assert!(!err.to_string().contains("SECRET123"));
        assert!(!format!("{:?}", err).contains("SECRET123"));
    }
}

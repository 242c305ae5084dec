use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct TextGenerationRequest {
    pub prompt: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl TextGenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        TextGenerationRequest {
            prompt: prompt.into(),
            max_tokens: None,
            temperature: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TextGenerationResponse {
    pub text: String,
    pub model: String,
    pub finish_reason: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct GeminiPart {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    pub content: Option<GeminiContent>,
    pub finish_reason: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
}

impl GeminiResponse {
    /// Concatenated text of the first candidate.
    pub fn text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        let text: String = candidate
            .content
            .as_ref()?
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_text_extraction() {
        let response: GeminiResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"  A delta fans out "},{"text":"into the sea.\n"}]},"finishReason":"STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(response.text().as_deref(), Some("A delta fans out into the sea."));
        assert_eq!(response.candidates[0].finish_reason.as_deref(), Some("STOP"));
    }

    #[test]
    fn test_gemini_empty_candidates() {
        let response: GeminiResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(response.text().is_none());
        let blocked: GeminiResponse =
            serde_json::from_str(r#"{"candidates":[{"content":{"parts":[]}}]}"#).unwrap();
        assert!(blocked.text().is_none());
    }
}

//! Google Gemini backend for the advice service.
//!
//! Uses the Generative Language API's `generateContent` endpoint; no
//! streaming, a single request per question.

use async_trait::async_trait;
use tracing::debug;

use crate::{AdviceClient, AdviceError, ClassroomSummary};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini client configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: "gemini-2.5-flash".to_string(),
            max_tokens: 1024,
            temperature: 0.7,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Gemini API client.
pub struct GeminiClient {
    config: GeminiConfig,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn api_url(&self) -> String {
        format!(
            "{}/{}:generateContent?key={}",
            GEMINI_API_BASE, self.config.model, self.config.api_key
        )
    }

    fn build_request_body(&self, prompt: &str, summary: &ClassroomSummary) -> serde_json::Value {
        serde_json::json!({
            "systemInstruction": {
                "parts": [{ "text": summary.system_instruction() }]
            },
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "maxOutputTokens": self.config.max_tokens,
                "temperature": self.config.temperature,
            }
        })
    }

    /// Pull the reply text out of a `generateContent` response.
    fn extract_text(body: &serde_json::Value) -> Result<String, AdviceError> {
        let parts = body
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.as_array())
            .ok_or_else(|| AdviceError::Malformed("no candidates in response".into()))?;

        let text: String = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
            .collect();
        Ok(text)
    }
}

#[async_trait]
impl AdviceClient for GeminiClient {
    async fn advise(
        &self,
        prompt: &str,
        summary: &ClassroomSummary,
    ) -> Result<String, AdviceError> {
        if self.config.api_key.is_empty() {
            return Err(AdviceError::Disabled);
        }

        let body = self.build_request_body(prompt, summary);
        debug!(model = %self.config.model, "requesting teacher advice");

        let response = self
            .http
            .post(self.api_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| AdviceError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AdviceError::Request(format!("{status}: {detail}")));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AdviceError::Malformed(e.to_string()))?;
        Self::extract_text(&json)
    }
}

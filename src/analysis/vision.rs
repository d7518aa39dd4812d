use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use tracing::{debug, warn};

use crate::config::VisionSettings;
use crate::error::AnalysisError;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

/// Boundary to the hosted vision-language model: one blocking call taking
/// image bytes, MIME type and prompt, returning generated text.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    async fn generate(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, AnalysisError>;
}

/// HTTP client for a messages-style vision endpoint.
pub struct VisionClient {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl VisionClient {
    pub fn new(settings: &VisionSettings) -> Result<Self, AnalysisError> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| AnalysisError::Request(e.to_string()))?;
        Ok(Self {
            http_client,
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
        })
    }

    fn extract_text(body: &str) -> Result<String, AnalysisError> {
        let response: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| AnalysisError::Request(format!("malformed response: {}", e)))?;

        let mut lines = Vec::new();
        if let Some(content) = response.get("content").and_then(|c| c.as_array()) {
            for block in content {
                if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                    if !text.trim().is_empty() {
                        lines.push(text.trim().to_string());
                    }
                }
            }
        }

        if lines.is_empty() {
            Err(AnalysisError::EmptyResponse)
        } else {
            Ok(lines.join("\n"))
        }
    }
}

#[async_trait]
impl VisionBackend for VisionClient {
    async fn generate(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, AnalysisError> {
        if self.api_key.is_empty() {
            return Err(AnalysisError::MissingApiKey);
        }

        let encoded = B64.encode(image);
        let request_body = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{
                "role": "user",
                "content": [
                    {
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": mime_type,
                            "data": encoded
                        }
                    },
                    {
                        "type": "text",
                        "text": prompt
                    }
                ]
            }]
        });

        debug!(
            endpoint = %self.endpoint,
            model = %self.model,
            image_size = image.len(),
            "Submitting still frame to vision model"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| AnalysisError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AnalysisError::Request(e.to_string()))?;

        if !status.is_success() {
            warn!(status = %status, "Vision model returned an error response");
            return Err(AnalysisError::Request(format!(
                "{}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        Self::extract_text(&body)
    }
}

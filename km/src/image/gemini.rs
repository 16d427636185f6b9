//! Gemini/Imagen image client
//!
//! Generation calls the Imagen `:predict` endpoint. Imagen has no general
//! edit endpoint, so editing asks the multimodal model to describe the base
//! image and then generates a fresh image from that description plus the
//! requested changes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eyre::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{ImageClient, ImagePayload, ImageResponse};
use crate::config::ImageConfig;
use crate::llm::retry::send_with_retry;
use crate::llm::{GeminiResponse, LlmError, generate_content_url};
use crate::prompts::PromptLoader;

/// Photographic framing wrapped around every design description
fn framed_prompt(description: &str) -> String {
    format!(
        "Professional architectural interior photography of: {description}\n\n\
         Style: Ultra-realistic, 8K resolution, professional interior design magazine quality\n\
         Lighting: Natural daylight with subtle artificial accent lighting\n\
         Camera: Wide-angle lens, eye-level perspective\n\
         Details: Sharp focus on materials and textures, realistic reflections on surfaces"
    )
}

/// Prompt that regenerates a described kitchen with modifications
fn edit_prompt(description: &str, instructions: &str) -> String {
    format!(
        "Based on this kitchen design: {description}\n\n\
         Apply these modifications: {instructions}\n\n\
         Create an updated version maintaining the same overall layout and dimensions."
    )
}

/// Imagen client
pub struct GeminiImageClient {
    model: String,
    describe_model: String,
    api_key: String,
    base_url: String,
    aspect_ratio: String,
    http: Client,
    prompts: Arc<PromptLoader>,
}

impl GeminiImageClient {
    /// Create a new client from configuration
    pub fn from_config(config: &ImageConfig, prompts: Arc<PromptLoader>) -> Result<Self, LlmError> {
        debug!(model = %config.model, "GeminiImageClient::from_config: called");
        let api_key = config.api_key()?;

        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            describe_model: config.describe_model.clone(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            aspect_ratio: config.aspect_ratio.clone(),
            http,
            prompts,
        })
    }

    fn predict_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "instances": [{ "prompt": prompt }],
            "parameters": {
                "sampleCount": 1,
                "aspectRatio": self.aspect_ratio,
                "personGeneration": "dont_allow",
                "safetySetting": "block_only_high",
                "outputOptions": { "mimeType": "image/png" },
            },
        })
    }

    /// Ask the multimodal model to describe an image
    async fn describe(&self, image: &ImagePayload) -> Result<String> {
        debug!(mime_type = %image.mime_type, bytes = image.data.len(), "describe: called");
        let question = self.prompts.render("describe-image", &serde_json::json!({}))?;
        let body = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": question },
                    { "inlineData": { "mimeType": image.mime_type, "data": image.to_base64() } },
                ],
            }],
        });

        let url = generate_content_url(&self.base_url, &self.describe_model);
        let response = send_with_retry("gemini-describe", || {
            self.http
                .post(url.clone())
                .header("x-goog-api-key", self.api_key.clone())
                .json(&body)
        })
        .await?;

        let parsed: GeminiResponse = response.json().await.context("Failed to decode describe response")?;
        parsed
            .text()
            .ok_or_else(|| eyre::eyre!("Image description came back empty"))
    }

    async fn predict(&self, prompt: String) -> Result<ImageResponse> {
        let url = format!("{}/models/{}:predict", self.base_url, self.model);
        let body = self.predict_body(&prompt);

        let response = send_with_retry("imagen", || {
            self.http
                .post(url.clone())
                .header("x-goog-api-key", self.api_key.clone())
                .json(&body)
        })
        .await?;

        let parsed: PredictResponse = response.json().await.context("Failed to decode predict response")?;
        let images = parsed.into_images()?;
        info!(count = images.len(), "Imagen returned images");
        Ok(ImageResponse::ok(images, prompt))
    }
}

#[async_trait]
impl ImageClient for GeminiImageClient {
    async fn generate(&self, prompt: &str) -> Result<ImageResponse> {
        debug!(%self.model, prompt_len = prompt.len(), "generate: called");
        self.predict(framed_prompt(prompt)).await
    }

    async fn edit(&self, base: &ImagePayload, instructions: &str) -> Result<ImageResponse> {
        debug!(%self.model, "edit: called");
        let description = match self.describe(base).await {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "edit: could not describe base image");
                return Ok(ImageResponse::failed(e.to_string()));
            }
        };
        self.predict(framed_prompt(&edit_prompt(&description, instructions))).await
    }
}

// === Imagen API response types ===

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    #[serde(default)]
    bytes_base64_encoded: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
}

impl PredictResponse {
    fn into_images(self) -> Result<Vec<ImagePayload>> {
        self.predictions
            .into_iter()
            .filter_map(|p| {
                let encoded = p.bytes_base64_encoded?;
                let mime = p.mime_type.unwrap_or_else(|| "image/png".to_string());
                Some(ImagePayload::from_base64(mime, &encoded).context("Invalid base64 image data"))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framed_prompt_wraps_description() {
        let prompt = framed_prompt("L-shaped corner kitchen design");
        assert!(prompt.starts_with("Professional architectural interior photography of: L-shaped"));
        assert!(prompt.contains("Wide-angle lens"));
    }

    #[test]
    fn test_edit_prompt_keeps_layout() {
        let prompt = edit_prompt("a white kitchen", "make the cabinets blue");
        assert!(prompt.contains("a white kitchen"));
        assert!(prompt.contains("make the cabinets blue"));
        assert!(prompt.contains("same overall layout"));
    }

    #[test]
    fn test_parse_predictions() {
        let raw = r#"{"predictions": [
            {"bytesBase64Encoded": "AQID", "mimeType": "image/png"},
            {"raiFilteredReason": "filtered"}
        ]}"#;
        let parsed: PredictResponse = serde_json::from_str(raw).unwrap();
        let images = parsed.into_images().unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].data, vec![1, 2, 3]);
    }

    #[test]
    fn test_filtered_response_has_no_images() {
        let parsed: PredictResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.into_images().unwrap().is_empty());
    }
}

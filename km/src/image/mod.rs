//! Image service clients
//!
//! Generation and editing of design images.

use std::sync::Arc;

use tracing::debug;

pub mod client;
mod gemini;
mod payload;

pub use client::{ImageClient, ImageResponse};
pub use gemini::GeminiImageClient;
pub use payload::ImagePayload;

use crate::config::ImageConfig;
use crate::llm::LlmError;
use crate::prompts::PromptLoader;

/// Create an image client based on the provider specified in config
pub fn create_image_client(config: &ImageConfig, prompts: Arc<PromptLoader>) -> Result<Arc<dyn ImageClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_image_client: called");
    match config.provider.as_str() {
        "gemini" | "google" => Ok(Arc::new(GeminiImageClient::from_config(config, prompts)?)),
        other => Err(LlmError::InvalidResponse(format!(
            "Unknown image provider: '{}'. Supported: gemini",
            other
        ))),
    }
}

//! ImageClient trait definition

use async_trait::async_trait;
use eyre::Result;
use serde::{Deserialize, Serialize};

use super::ImagePayload;

/// Outcome of an image request
///
/// `success == true` with no images is a valid answer from the service and
/// means nothing usable came back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageResponse {
    pub success: bool,
    pub images: Vec<ImagePayload>,
    pub error: Option<String>,
    /// Final prompt text sent to the image model
    pub prompt_used: Option<String>,
}

impl ImageResponse {
    pub fn ok(images: Vec<ImagePayload>, prompt_used: impl Into<String>) -> Self {
        Self {
            success: true,
            images,
            error: None,
            prompt_used: Some(prompt_used.into()),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            images: Vec::new(),
            error: Some(error.into()),
            prompt_used: None,
        }
    }

    /// First usable image, or the reason there is none
    pub fn into_first_image(self) -> Result<ImagePayload, String> {
        if !self.success {
            return Err(self.error.unwrap_or_else(|| "Error desconocido".to_string()));
        }
        self.images
            .into_iter()
            .find(|img| !img.is_empty())
            .ok_or_else(|| "No images generated".to_string())
    }
}

/// Image synthesis and editing service
#[async_trait]
pub trait ImageClient: Send + Sync {
    /// Generate images from a text description
    async fn generate(&self, prompt: &str) -> Result<ImageResponse>;

    /// Produce a modified version of `base` following `instructions`
    async fn edit(&self, base: &ImagePayload, instructions: &str) -> Result<ImageResponse>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_image_of_success() {
        let resp = ImageResponse::ok(vec![ImagePayload::png(vec![1, 2])], "p");
        assert_eq!(resp.into_first_image().unwrap().data, vec![1, 2]);
    }

    #[test]
    fn test_success_without_images_is_a_failure() {
        let resp = ImageResponse::ok(vec![], "p");
        assert_eq!(resp.into_first_image().unwrap_err(), "No images generated");
    }

    #[test]
    fn test_failed_response_carries_error() {
        let resp = ImageResponse::failed("quota exceeded");
        assert_eq!(resp.into_first_image().unwrap_err(), "quota exceeded");

        let resp = ImageResponse {
            success: false,
            ..Default::default()
        };
        assert_eq!(resp.into_first_image().unwrap_err(), "Error desconocido");
    }
}

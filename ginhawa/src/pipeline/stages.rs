//! Remote model seams
//!
//! The pipeline only knows these two traits; the Gemini client implements
//! both, and tests substitute scripted fakes.

use async_trait::async_trait;

use crate::credentials::ApiKey;
use crate::error::StageError;
use crate::images::ImageData;

/// Number of images requested per run
pub const NUMBER_OF_IMAGES: u32 = 1;

/// Output format requested from the image model
pub const OUTPUT_MIME_TYPE: &str = "image/jpeg";

/// Aspect ratio requested from the image model
pub const ASPECT_RATIO: &str = "16:9";

/// Vision-description model
#[async_trait]
pub trait SceneAnalyzer: Send + Sync {
    /// Describe `image` following `instruction`; empty text is a valid answer
    async fn describe(
        &self,
        key: &ApiKey,
        image: &ImageData,
        instruction: &str,
    ) -> Result<String, StageError>;
}

/// Image-synthesis model
#[async_trait]
pub trait ImageSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        key: &ApiKey,
        request: &SynthesisRequest,
    ) -> Result<SynthesisResponse, StageError>;
}

/// Parameters for one synthesis call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub prompt: String,
    pub number_of_images: u32,
    pub output_mime_type: String,
    pub aspect_ratio: String,
}

impl SynthesisRequest {
    /// Request with the fixed generation parameters
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            number_of_images: NUMBER_OF_IMAGES,
            output_mime_type: OUTPUT_MIME_TYPE.to_string(),
            aspect_ratio: ASPECT_RATIO.to_string(),
        }
    }
}

/// What the image model returned
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthesisResponse {
    pub generated_images: Vec<GeneratedImagePayload>,
}

/// One generated image, base64 encoded; the service may omit the bytes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedImagePayload {
    pub image_bytes: Option<String>,
}

impl SynthesisResponse {
    /// Response carrying a single base64 payload
    pub fn single(image_bytes: impl Into<String>) -> Self {
        Self {
            generated_images: vec![GeneratedImagePayload {
                image_bytes: Some(image_bytes.into()),
            }],
        }
    }

    /// Base64 payload of the first image, if it has one
    pub fn first_payload(&self) -> Option<&str> {
        self.generated_images
            .first()
            .and_then(|image| image.image_bytes.as_deref())
            .filter(|bytes| !bytes.trim().is_empty())
    }
}

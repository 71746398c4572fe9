//! Google generative-language integration
//!
//! Provides:
//! - Scene description via `models/{model}:generateContent` (Gemini)
//! - Image synthesis via `models/{model}:predict` (Imagen)
//!
//! The client holds no key of its own; each call receives the key the
//! pipeline resolved for the current run.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::credentials::ApiKey;
use crate::error::StageError;
use crate::images::ImageData;
use crate::pipeline::{
    GeneratedImagePayload, ImageSynthesizer, SceneAnalyzer, SynthesisRequest, SynthesisResponse,
};

/// Header carrying the API key
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Content part: inline image data or text
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<Blob>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

/// generateContent request
#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

/// generateContent response
#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, all text parts joined
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// predict request
#[derive(Debug, Serialize)]
struct PredictRequest {
    instances: Vec<PredictInstance>,
    parameters: PredictParameters,
}

#[derive(Debug, Serialize)]
struct PredictInstance {
    prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictParameters {
    sample_count: u32,
    aspect_ratio: String,
    output_options: OutputOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutputOptions {
    mime_type: String,
}

impl From<&SynthesisRequest> for PredictRequest {
    fn from(request: &SynthesisRequest) -> Self {
        Self {
            instances: vec![PredictInstance {
                prompt: request.prompt.clone(),
            }],
            parameters: PredictParameters {
                sample_count: request.number_of_images,
                aspect_ratio: request.aspect_ratio.clone(),
                output_options: OutputOptions {
                    mime_type: request.output_mime_type.clone(),
                },
            },
        }
    }
}

/// predict response
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
}

impl From<PredictResponse> for SynthesisResponse {
    fn from(response: PredictResponse) -> Self {
        Self {
            generated_images: response
                .predictions
                .into_iter()
                .map(|p| GeneratedImagePayload {
                    image_bytes: p.bytes_base64_encoded,
                })
                .collect(),
        }
    }
}

/// Error body returned with non-success statuses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Gemini / Imagen REST client
#[derive(Debug, Clone)]
pub struct GeminiClient {
    /// HTTP client
    client: Client,
    /// API base URL, without trailing slash
    base_url: String,
    /// Vision-description model
    analysis_model: String,
    /// Image-synthesis model
    synthesis_model: String,
}

impl GeminiClient {
    /// Create a client for explicit endpoints
    pub fn new(
        base_url: &str,
        analysis_model: &str,
        synthesis_model: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, StageError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            analysis_model: analysis_model.to_string(),
            synthesis_model: synthesis_model.to_string(),
        })
    }

    /// Create a client from the service configuration
    pub fn from_config(config: &Config) -> Result<Self, StageError> {
        Self::new(
            &config.api_base_url,
            &config.analysis_model,
            &config.synthesis_model,
            config.request_timeout(),
        )
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    /// Turn a non-success response into a rejection carrying the API message
    async fn check_status(response: Response) -> Result<Response, StageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!("Gemini API error: {} - {}", status, body);

        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error.message)
            .unwrap_or_else(|_| {
                if body.trim().is_empty() {
                    status.to_string()
                } else {
                    body
                }
            });

        Err(StageError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl SceneAnalyzer for GeminiClient {
    async fn describe(
        &self,
        key: &ApiKey,
        image: &ImageData,
        instruction: &str,
    ) -> Result<String, StageError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part {
                        inline_data: Some(Blob {
                            mime_type: image.mime_type.clone(),
                            data: image.to_base64(),
                        }),
                        text: None,
                    },
                    Part {
                        inline_data: None,
                        text: Some(instruction.to_string()),
                    },
                ],
            }],
        };

        debug!("Sending analysis request to model {}", self.analysis_model);

        let response = self
            .client
            .post(self.model_url(&self.analysis_model, "generateContent"))
            .header(API_KEY_HEADER, key.as_str())
            .json(&request)
            .send()
            .await?;

        let response: GenerateContentResponse = Self::check_status(response).await?.json().await?;
        Ok(response.text())
    }
}

#[async_trait]
impl ImageSynthesizer for GeminiClient {
    async fn synthesize(
        &self,
        key: &ApiKey,
        request: &SynthesisRequest,
    ) -> Result<SynthesisResponse, StageError> {
        let body = PredictRequest::from(request);

        debug!("Sending synthesis request to model {}", self.synthesis_model);

        let response = self
            .client
            .post(self.model_url(&self.synthesis_model, "predict"))
            .header(API_KEY_HEADER, key.as_str())
            .json(&body)
            .send()
            .await?;

        let response: PredictResponse = Self::check_status(response).await?.json().await?;
        Ok(response.into())
    }
}

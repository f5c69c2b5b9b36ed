//! Google Gemini API client for virtual try-on generation
//!
//! Thin wrapper around the Gemini generateContent endpoint: one request
//! carrying the compositing instruction and two inline images, one image back.

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::GeminiConfig;
use crate::intake::{DataUrl, EncodedImage};

/// Media type assumed when the service omits one for an inline image
pub const DEFAULT_RESULT_MIME_TYPE: &str = "image/png";

/// Longest slice of a service error body kept in the error message
const MAX_ERROR_BODY: usize = 200;

pub const TRY_ON_PROMPT: &str = "You are an expert fashion photo editor. I will provide two images. \
The first image is a piece of clothing. The second image is a person. \
Your task is to generate a new, photorealistic image where the person from the second image is wearing the clothing from the first image. \
Ensure the fit, lighting, shadows, and posture are completely natural. \
Maintain the person's identity, facial features, and the background of the original photo. \
Output ONLY the generated image.";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No image was generated. The model might have returned text instead.")]
    NoImageReturned,

    #[error("Gemini API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Gemini API error {status}: {body}")]
    Service { status: StatusCode, body: String },

    #[error("Failed to parse Gemini response: {0}")]
    InvalidResponse(String),
}

/// Raw base64 image payload as sent in an `inlineData` part
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

impl From<&EncodedImage> for InlineImage {
    fn from(image: &EncodedImage) -> Self {
        Self {
            mime_type: image.mime_type.clone(),
            data: image.base64.clone(),
        }
    }
}

/// Something that can composite a clothing image onto a person image
#[async_trait]
pub trait TryOnGenerator: Send + Sync {
    /// Returns the generated image as a data URL
    async fn generate_try_on(
        &self,
        cloth: &InlineImage,
        person: &InlineImage,
    ) -> Result<String, GenerationError>;
}

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: HeaderValue,
    url: String,
}

// -- Response types --

#[derive(Debug, Default, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiResponseContent,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponsePart {
    inline_data: Option<GeminiInlineData>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: Option<String>,
    #[serde(default)]
    data: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self, GenerationError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| GenerationError::Configuration("Gemini API key is required".to_string()))?;

        let api_key = HeaderValue::from_str(api_key)
            .map_err(|e| GenerationError::Configuration(format!("Invalid API key header: {}", e)))?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            GenerationError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            api_key,
            url: format!(
                "{}/{}:generateContent",
                config.endpoint.trim_end_matches('/'),
                config.model
            ),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Instruction first, then clothing, then person
    pub fn build_request_body(cloth: &InlineImage, person: &InlineImage) -> serde_json::Value {
        serde_json::json!({
            "contents": [{
                "parts": [
                    {"text": TRY_ON_PROMPT},
                    {"inlineData": cloth},
                    {"inlineData": person}
                ]
            }]
        })
    }

    /// First inline image of the first candidate, as a data URL
    pub fn extract_image(response: &GeminiResponse) -> Option<String> {
        let candidate = response.candidates.first()?;

        for part in &candidate.content.parts {
            match &part.inline_data {
                Some(inline) if !inline.data.is_empty() => {
                    let mime_type = inline
                        .mime_type
                        .as_deref()
                        .filter(|m| !m.is_empty())
                        .unwrap_or(DEFAULT_RESULT_MIME_TYPE);
                    return Some(DataUrl::new(mime_type, &inline.data).to_string());
                }
                _ => {
                    if let Some(text) = &part.text {
                        debug!("Skipping text part: {} chars", text.len());
                    }
                }
            }
        }

        None
    }

    pub fn parse_response(body: &str) -> Result<String, GenerationError> {
        let response: GeminiResponse = serde_json::from_str(body)
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        Self::extract_image(&response).ok_or(GenerationError::NoImageReturned)
    }
}

fn truncate_body(body: &str) -> &str {
    if body.len() <= MAX_ERROR_BODY {
        return body;
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[async_trait]
impl TryOnGenerator for GeminiClient {
    async fn generate_try_on(
        &self,
        cloth: &InlineImage,
        person: &InlineImage,
    ) -> Result<String, GenerationError> {
        let body = Self::build_request_body(cloth, person);

        info!(
            "Gemini try-on request: cloth={} ({} chars), person={} ({} chars)",
            cloth.mime_type,
            cloth.data.len(),
            person.mime_type,
            person.data.len()
        );

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header("x-goog-api-key", self.api_key.clone())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!("Gemini API returned {}", status);
            return Err(GenerationError::Service {
                status,
                body: truncate_body(&error_body).to_string(),
            });
        }

        let text = response.text().await?;
        Self::parse_response(&text)
    }
}

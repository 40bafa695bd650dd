//! Blocking client for the Gemini generateContent endpoint.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ERROR_MARKER, EXTRACTION_PROMPT, VisionBackend};
use crate::error::ModelError;
use crate::models::config::ModelConfig;
use crate::pdf::ExtractedImage;

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize, Default)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Deserialize)]
struct TextPart {
    #[serde(default)]
    text: String,
}

/// Gemini vision client.
///
/// One blocking round-trip per image with no pipeline-level timeout; the
/// transport default applies.
pub struct GeminiClient {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl GeminiClient {
    /// Create a client with an explicit API key.
    pub fn new(api_key: String, config: &ModelConfig) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            api_key,
            model: config.model.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        }
    }

    /// Create a client from the `GEMINI_API_KEY` environment variable,
    /// honoring a `.env` file if present.
    ///
    /// Fails closed: there is no built-in fallback key.
    pub fn from_env(config: &ModelConfig) -> Result<Self, ModelError> {
        let _ = dotenvy::dotenv();
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| ModelError::MissingApiKey)?;
        Ok(Self::new(api_key, config))
    }

    fn request(&self, image: &ExtractedImage) -> Result<String, ModelError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.endpoint, self.model, self.api_key
        );

        let payload = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: EXTRACTION_PROMPT.to_string(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: image.encoding.mime_type().to_string(),
                            data: BASE64.encode(&image.data),
                        },
                    },
                ],
            }],
        };

        debug!(
            "querying {} with image {} of {} ({} bytes)",
            self.model,
            image.index + 1,
            image.source_file,
            image.data.len()
        );

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .map_err(|e| ModelError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse =
            response.json().map_err(|e| ModelError::Http(e.to_string()))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ModelError::EmptyResponse);
        }
        Ok(text)
    }
}

impl VisionBackend for GeminiClient {
    fn extract(&self, image: &ExtractedImage) -> String {
        match self.request(image) {
            Ok(text) => text,
            Err(e) => format!("{}{}", ERROR_MARKER, e),
        }
    }
}

//! Gemini image model client.

use crate::config::{self, Config};
use crate::data_uri::DataUri;
use crate::error::{GenerationError, Result};
use crate::prompt::GenerateContentRequest;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Longest slice of an error body surfaced to the user.
const MAX_ERROR_BODY: usize = 300;

/// Something that can turn a product photo into a three-view drawing.
#[async_trait]
pub trait DrawingGenerator: Send + Sync {
    /// Returns the drawing as a data URI, or `None` when the model answered
    /// without an image.
    async fn generate(
        &self,
        image_base64: &str,
        mime_type: &str,
        context: &str,
    ) -> Result<Option<String>>;

    /// Model name shown in the status panel.
    fn model(&self) -> &str;
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    endpoint: String,
    model: String,
    fallback_key: Option<String>,
    key_vars: &'static [&'static str],
}

impl GeminiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            fallback_key: config.api_key.clone(),
            key_vars: &config::API_KEY_ENV_VARS,
        }
    }

    fn url(&self) -> String {
        format!("{}/{}:generateContent", self.endpoint, self.model)
    }
}

#[async_trait]
impl DrawingGenerator for GeminiClient {
    async fn generate(
        &self,
        image_base64: &str,
        mime_type: &str,
        context: &str,
    ) -> Result<Option<String>> {
        let api_key = config::resolve_api_key_from(self.key_vars, self.fallback_key.as_deref())
            .ok_or_else(|| {
                GenerationError::Auth(
                    "no API key: set GEMINI_API_KEY or run `architect config set api-key <key>`"
                        .into(),
                )
            })?;

        let body = GenerateContentRequest::drawing(image_base64, mime_type, context)?;
        let start = Instant::now();

        info!(model = %self.model, mime_type, context_chars = context.len(), "requesting drawing");

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text, &headers));
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let image = extract_image(parsed);

        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            found_image = image.is_some(),
            "drawing response received"
        );

        Ok(image.map(|uri| uri.to_string()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// First inline image of the first candidate, if any.
pub fn extract_image(response: GenerateContentResponse) -> Option<DataUri> {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|content| content.parts.into_iter().find_map(|p| p.inline_data))
        .map(|inline| DataUri::new(inline.mime_type, inline.data))
}

fn parse_error(status: u16, text: &str, headers: &reqwest::header::HeaderMap) -> GenerationError {
    let message = error_message(text);
    match status {
        401 | 403 => GenerationError::Auth(message),
        429 => {
            let retry_after = headers
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            GenerationError::RateLimited { retry_after }
        }
        _ => GenerationError::Api { status, message },
    }
}

/// Pulls `error.message` out of a Google error body, else a truncated body.
fn error_message(text: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }

    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    if let Ok(body) = serde_json::from_str::<ErrorBody>(text) {
        return body.error.message;
    }

    let text = text.trim();
    match text.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

// Response types
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    inline_data: Option<ResponseInlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseInlineData {
    mime_type: String,
    data: String,
}

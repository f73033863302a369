//! Google Gemini scoring gateway.
//!
//! Posts images inline (base64) to the `generateContent` endpoint with a
//! JSON response schema, so the model answers with the evaluation fields
//! directly. Calls are blocking; the review session runs them on worker
//! threads.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{ImagePayload, ScoringGateway, prompt, response};
use crate::error::{Error, Result};
use crate::evaluation::EvaluationResult;

/// Public Generative Language API endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

const GATEWAY_NAME: &str = "gemini";
const USER_AGENT: &str = concat!("photo-critic/", env!("CARGO_PKG_VERSION"));

/// Configuration for [`GeminiGateway`].
#[derive(Clone)]
pub struct GeminiConfig {
    /// API key. Required.
    pub api_key: Option<String>,
    /// Model name, e.g. `gemini-2.5-flash`.
    pub model: String,
    /// API base URL.
    pub endpoint: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Sampling temperature.
    pub temperature: f32,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl GeminiConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> GeminiConfigBuilder {
        GeminiConfigBuilder::default()
    }
}

/// Builder for [`GeminiConfig`].
#[derive(Debug, Default)]
pub struct GeminiConfigBuilder {
    api_key: Option<String>,
    model: Option<String>,
    endpoint: Option<String>,
    timeout: Option<Duration>,
    temperature: Option<f32>,
}

impl GeminiConfigBuilder {
    /// Set the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the model name.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the API base URL.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the per-request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> GeminiConfig {
        GeminiConfig {
            api_key: self.api_key.filter(|key| !key.trim().is_empty()),
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            endpoint: self.endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            timeout: self.timeout.unwrap_or(Duration::from_secs(120)),
            temperature: self.temperature.unwrap_or(0.2),
        }
    }
}

/// Gateway backed by the Gemini API.
pub struct GeminiGateway {
    http_client: reqwest::blocking::Client,
    api_key: String,
    config: GeminiConfig,
}

impl GeminiGateway {
    /// Create a gateway. Fails with [`Error::MissingCredential`] when no API
    /// key is configured.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| Error::MissingCredential(GATEWAY_NAME.to_string()))?;

        let http_client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http_client,
            api_key,
            config,
        })
    }

    /// The configured model.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Send a request and return the concatenated text of the first candidate.
    fn generate(&self, request: &GenerateContentRequest) -> Result<String> {
        let start = Instant::now();
        tracing::debug!(gateway = GATEWAY_NAME, model = %self.config.model, "sending generateContent request");

        let response = self
            .http_client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::Gateway {
                gateway: GATEWAY_NAME.to_string(),
                message: format!("HTTP {}: {}", status.as_u16(), api_error_message(&body)),
            });
        }

        let parsed: GenerateContentResponse = response.json()?;
        let text = parsed.into_text()?;

        tracing::debug!(
            gateway = GATEWAY_NAME,
            elapsed_ms = start.elapsed().as_millis() as u64,
            chars = text.len(),
            "generateContent response received"
        );
        Ok(text)
    }

    fn build_single_request(&self, image: &ImagePayload) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part::inline(image), Part::text(prompt::SINGLE_IMAGE)],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: evaluation_schema(),
                temperature: self.config.temperature,
            },
        }
    }

    fn build_group_request(&self, images: &[ImagePayload]) -> GenerateContentRequest {
        let mut parts = Vec::with_capacity(images.len() * 2 + 1);
        for image in images {
            parts.push(Part::text(&prompt::burst_caption(&image.name)));
            parts.push(Part::inline(image));
        }
        parts.push(Part::text(prompt::BURST));

        GenerateContentRequest {
            contents: vec![Content { role: "user", parts }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: json!({
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "fileName": { "type": "STRING" },
                            "evaluation": evaluation_schema(),
                        },
                        "required": ["fileName", "evaluation"],
                    },
                }),
                temperature: self.config.temperature,
            },
        }
    }
}

impl ScoringGateway for GeminiGateway {
    fn name(&self) -> &str {
        GATEWAY_NAME
    }

    fn evaluate(&self, image: &ImagePayload) -> Result<EvaluationResult> {
        let text = self.generate(&self.build_single_request(image))?;
        let result = response::parse_single(&text)?;
        tracing::info!(
            image = %image.name,
            total = result.total_score,
            keep = result.is_worth_keeping,
            "photo scored"
        );
        Ok(result)
    }

    fn evaluate_group(&self, images: &[ImagePayload]) -> Result<HashMap<String, EvaluationResult>> {
        if images.is_empty() {
            return Ok(HashMap::new());
        }
        let text = self.generate(&self.build_group_request(images))?;
        let names: Vec<&str> = images.iter().map(|image| image.name.as_str()).collect();
        let results = response::parse_group(&text, &names)?;
        tracing::info!(
            images = images.len(),
            kept = results.values().filter(|r| r.is_worth_keeping).count(),
            "burst scored"
        );
        Ok(results)
    }
}

fn evaluation_schema() -> Value {
    let score = json!({ "type": "INTEGER" });
    json!({
        "type": "OBJECT",
        "properties": {
            "compositionScore": score,
            "lightingScore": score,
            "technicalScore": score,
            "artisticScore": score,
            "totalScore": score,
            "isWorthKeeping": { "type": "BOOLEAN" },
            "feedback": { "type": "STRING" },
        },
        "required": [
            "compositionScore",
            "lightingScore",
            "technicalScore",
            "artisticScore",
            "totalScore",
            "isWorthKeeping",
            "feedback",
        ],
    })
}

/// Pull `error.message` out of an API error body, falling back to the body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.chars().take(500).collect())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl Part {
    fn text(text: &str) -> Self {
        Self::Text {
            text: text.to_string(),
        }
    }

    fn inline(image: &ImagePayload) -> Self {
        Self::Inline {
            inline_data: InlineData {
                mime_type: image.media_type.clone(),
                data: STANDARD.encode(&image.bytes),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    fn into_text(self) -> Result<String> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(Error::GatewayResponse(format!("prompt blocked: {reason}")));
        }

        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(Error::GatewayResponse("no candidates returned".to_string()));
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
            return Err(Error::GatewayResponse(format!(
                "empty candidate (finish reason: {reason})"
            )));
        }
        Ok(text)
    }
}

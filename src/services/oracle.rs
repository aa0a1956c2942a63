//! Free-food confirmation oracle.
//!
//! [`Oracle`] is the raw capability: one classification call that may fail.
//! [`ConfirmationClient`] wraps it with bounded retries and turns every
//! failure into a negative [`Confirmation`], so the crawl never sees an error
//! from this boundary. [`GeminiOracle`] is the production implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{AppError, Result};
use crate::models::OracleConfig;

/// Longest proof kept from an oracle response.
pub const MAX_PROOF_CHARS: usize = 140;

/// System instructions sent with every classification request.
pub const INSTRUCTIONS: &str = r#"You are verifying whether an event page explicitly promises FREE food.

Return ONLY valid JSON:
{
  "has_free_food": boolean,
  "confidence": number (0-1),
  "proof": string   // exact short phrase from the page proving free food (<=140 chars), empty if false
}

Rules:
- TRUE only if explicitly free (e.g. "free food", "pizza will be provided", "free refreshments", "snacks provided for free").
- If it says "refreshments provided" OR mentions specific food without cost, lean toward TRUE with lower confidence (0.6-0.7).
- If it says "no food"/"food not provided", return FALSE.
- Be reasonably lenient but require actual food mentions.
- Extract the EXACT phrase as proof.
"#;

/// First `max` grapheme clusters of `s`.
fn truncate_graphemes(s: &str, max: usize) -> String {
    s.graphemes(true).take(max).collect()
}

/// Event facts submitted for classification.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleRequest {
    pub page_url: String,
    pub title: String,
    pub location: String,
    pub start_iso: String,
    /// Already truncated to the configured bound
    pub description: String,
}

impl OracleRequest {
    pub fn new(
        page_url: &str,
        title: &str,
        location: &str,
        start_iso: &str,
        description: &str,
        max_description_chars: usize,
    ) -> Self {
        Self {
            page_url: page_url.to_string(),
            title: title.to_string(),
            location: location.to_string(),
            start_iso: start_iso.to_string(),
            description: truncate_graphemes(description, max_description_chars),
        }
    }

    /// Compact user prompt describing the event.
    pub fn snippet(&self) -> String {
        format!(
            "URL: {}\nTITLE: {}\nWHEN (UTC): {}\nWHERE: {}\nDESCRIPTION: {}\n",
            self.page_url, self.title, self.start_iso, self.location, self.description
        )
    }
}

/// JSON verdict returned by the oracle.
///
/// Missing or `null` fields read as `false`, `0.0` and `""`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub has_free_food: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub confidence: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub proof: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl OracleResponse {
    pub fn new(has_free_food: bool, confidence: f64, proof: impl Into<String>) -> Self {
        Self {
            has_free_food,
            confidence,
            proof: proof.into(),
        }
    }

    /// Parse a model reply, tolerating a surrounding markdown code fence.
    pub fn parse(text: &str) -> Result<Self> {
        let body = strip_code_fence(text);
        serde_json::from_str(body)
            .map_err(|e| AppError::oracle(format!("Malformed oracle JSON: {e}")))
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line, then the closing fence
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Raw classification capability.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn classify(&self, request: &OracleRequest) -> Result<OracleResponse>;
}

/// Oracle backed by the Gemini `generateContent` REST endpoint.
#[derive(Clone)]
pub struct GeminiOracle {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiOracle {
    pub fn new(api_key: impl Into<String>, config: &OracleConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
        })
    }

    /// Build from the API key named by `config.api_key_env`.
    ///
    /// Fails when the variable is unset or blank; a run cannot proceed
    /// without an oracle.
    pub fn from_config(config: &OracleConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AppError::config(format!("{} not set", config.api_key_env)))?;
        Self::new(api_key, config)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl Oracle for GeminiOracle {
    async fn classify(&self, request: &OracleRequest) -> Result<OracleResponse> {
        let snippet = request.snippet();
        let body = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: INSTRUCTIONS }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: &snippet }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                response_mime_type: "application/json",
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::oracle(format!(
                "Gemini returned HTTP {}: {}",
                status.as_u16(),
                error_text
            )));
        }

        let reply: GenerateResponse = response.json().await?;
        let text = reply
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .collect::<String>();
        if text.trim().is_empty() {
            return Err(AppError::oracle("Gemini returned no candidates"));
        }

        OracleResponse::parse(&text)
    }
}

/// Outcome of a confirmation, after retries.
#[derive(Debug, Clone, PartialEq)]
pub struct Confirmation {
    pub has_food: bool,
    /// Clamped to [0, 1]
    pub confidence: f64,
    /// Trimmed, at most [`MAX_PROOF_CHARS`] characters
    pub proof: String,
    pub attempts: usize,
    /// Every attempt failed; the verdict is the negative default
    pub failed: bool,
}

impl Confirmation {
    fn negative(attempts: usize) -> Self {
        Self {
            has_food: false,
            confidence: 0.0,
            proof: String::new(),
            attempts,
            failed: true,
        }
    }
}

/// Retrying, never-failing front for an [`Oracle`].
#[derive(Clone)]
pub struct ConfirmationClient {
    oracle: Arc<dyn Oracle>,
    max_attempts: usize,
    max_description_chars: usize,
}

impl ConfirmationClient {
    pub fn new(oracle: Arc<dyn Oracle>, config: &OracleConfig) -> Self {
        Self {
            oracle,
            max_attempts: config.max_retries.max(1),
            max_description_chars: config.max_description_chars,
        }
    }

    /// Ask the oracle whether the event promises free food.
    pub async fn confirm(
        &self,
        page_url: &str,
        title: &str,
        location: &str,
        start_iso: &str,
        description: &str,
    ) -> Confirmation {
        let request = OracleRequest::new(
            page_url,
            title,
            location,
            start_iso,
            description,
            self.max_description_chars,
        );

        for attempt in 1..=self.max_attempts {
            match self.oracle.classify(&request).await {
                Ok(response) => {
                    let confidence = if response.confidence.is_finite() {
                        response.confidence.clamp(0.0, 1.0)
                    } else {
                        0.0
                    };
                    return Confirmation {
                        has_food: response.has_free_food,
                        confidence,
                        proof: truncate_graphemes(response.proof.trim(), MAX_PROOF_CHARS),
                        attempts: attempt,
                        failed: false,
                    };
                }
                Err(e) => {
                    log::warn!(
                        "Oracle attempt {}/{} failed for {}: {}",
                        attempt,
                        self.max_attempts,
                        page_url,
                        e
                    );
                }
            }
        }

        Confirmation::negative(self.max_attempts)
    }
}

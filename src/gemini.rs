//! Minimal Gemini client for our use-case.
//!
//! We only call `models/{model}:generateContent` with a single user turn and read back
//! the text of the first candidate. One request per call: no retry, no streaming.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument};

use crate::config::ModelSettings;
use crate::domain::Notice;

#[derive(Debug, Error)]
pub enum ModelError {
  #[error("HTTP error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("Gemini HTTP {status}: {message}")]
  Api { status: u16, message: String },

  #[error("could not decode Gemini response: {0}")]
  Decode(#[from] serde_json::Error),

  #[error("model returned no text ({reason})")]
  EmptyResponse { reason: String },
}

#[derive(Clone)]
pub struct Gemini {
  client: reqwest::Client,
  api_key: String,
  pub settings: ModelSettings,
}

impl std::fmt::Debug for Gemini {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Gemini").field("settings", &self.settings).finish_non_exhaustive()
  }
}

impl Gemini {
  pub fn new(api_key: impl Into<String>, settings: ModelSettings) -> Result<Self, ModelError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(settings.timeout_secs))
      .build()?;
    Ok(Self { client, api_key: api_key.into(), settings })
  }

  /// Construct the client if we find GEMINI_API_KEY; otherwise return None.
  pub fn from_env(settings: &ModelSettings) -> Option<Self> {
    let api_key = std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    match Self::new(api_key, settings.clone()) {
      Ok(g) => Some(g),
      Err(e) => {
        error!(target: "rusgram_backend", error = %e, "Failed to build Gemini HTTP client");
        None
      }
    }
  }

  /// Same settings and connection pool, different credential.
  pub fn with_api_key(&self, api_key: impl Into<String>) -> Self {
    Self { client: self.client.clone(), api_key: api_key.into(), settings: self.settings.clone() }
  }

  pub fn endpoint(&self) -> String {
    format!("{}/models/{}:generateContent", self.settings.base_url, self.settings.model)
  }

  /// Send the prompt and return the model's text. Failures are logged, pushed to
  /// `notices` as a user-facing error, and yield an empty string.
  pub async fn send(&self, prompt: &str, notices: &mut Vec<Notice>) -> String {
    match self.generate(prompt).await {
      Ok(text) => text,
      Err(e) => {
        error!(target: "rusgram_backend", model = %self.settings.model, error = %e, "Gemini call failed");
        notices.push(Notice::error(format!("Ошибка при обращении к API: {e}")));
        String::new()
      }
    }
  }

  #[instrument(level = "info", skip(self, prompt), fields(model = %self.settings.model, prompt_len = prompt.len()))]
  async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
    let req = GenerateContentRequest {
      contents: vec![Content { role: "user", parts: vec![Part { text: prompt }] }],
      generation_config: GenerationConfig {
        temperature: self.settings.temperature,
        top_p: self.settings.top_p,
        seed: self.settings.seed,
      },
    };

    let start = Instant::now();
    let res = self
      .client
      .post(self.endpoint())
      .header("x-goog-api-key", &self.api_key)
      .json(&req)
      .send()
      .await?;

    let status = res.status();
    let body = res.text().await?;
    let elapsed = start.elapsed();

    if !status.is_success() {
      let message = extract_api_error(&body).unwrap_or(body);
      return Err(ModelError::Api { status: status.as_u16(), message });
    }

    let parsed: GenerateContentResponse = serde_json::from_str(&body)?;
    if let Some(usage) = &parsed.usage_metadata {
      info!(prompt_tokens = ?usage.prompt_token_count, completion_tokens = ?usage.candidates_token_count, total_tokens = ?usage.total_token_count, "Gemini usage");
    }

    let text = parsed.text();
    if text.is_empty() {
      return Err(ModelError::EmptyResponse { reason: parsed.empty_reason() });
    }
    info!(?elapsed, response_len = text.len(), "Model response received successfully");
    Ok(text)
  }
}

// --- Wire DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
  contents: Vec<Content<'a>>,
  generation_config: GenerationConfig,
}
#[derive(Serialize)]
struct Content<'a> { role: &'a str, parts: Vec<Part<'a>> }
#[derive(Serialize)]
struct Part<'a> { text: &'a str }
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  temperature: f32,
  top_p: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  seed: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
  #[serde(default)] candidates: Vec<Candidate>,
  #[serde(default)] prompt_feedback: Option<PromptFeedback>,
  #[serde(default)] usage_metadata: Option<UsageMetadata>,
}
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
  #[serde(default)] content: Option<CandidateContent>,
  #[serde(default)] finish_reason: Option<String>,
}
#[derive(Deserialize)]
struct CandidateContent { #[serde(default)] parts: Vec<PartResp> }
#[derive(Deserialize)]
struct PartResp { #[serde(default)] text: Option<String> }
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback { #[serde(default)] block_reason: Option<String> }
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)] prompt_token_count: Option<u32>,
  #[serde(default)] candidates_token_count: Option<u32>,
  #[serde(default)] total_token_count: Option<u32>,
}

impl GenerateContentResponse {
  /// Concatenated text parts of the first candidate.
  fn text(&self) -> String {
    self.candidates
      .first()
      .and_then(|c| c.content.as_ref())
      .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).collect::<String>())
      .unwrap_or_default()
  }

  fn empty_reason(&self) -> String {
    if let Some(reason) = self.prompt_feedback.as_ref().and_then(|f| f.block_reason.as_ref()) {
      return format!("prompt blocked: {reason}");
    }
    match self.candidates.first() {
      None => "no candidates".into(),
      Some(c) => format!("finish reason: {}", c.finish_reason.as_deref().unwrap_or("unknown")),
    }
  }
}

/// Try to extract a clean error message from a Gemini error body.
fn extract_api_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

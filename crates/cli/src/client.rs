//! HTTP client for the Gemini chat model

use async_trait::async_trait;
use coffee_lib::{ChatBackend, ChatMessage, PredictError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/";

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("missing GEMINI_API_KEY")]
    MissingKey,

    #[error("invalid endpoint: {0}")]
    Url(#[from] url::ParseError),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("the model returned no text")]
    EmptyAnswer,
}

impl From<GeminiError> for PredictError {
    fn from(e: GeminiError) -> Self {
        PredictError::UpstreamUnavailable(e.to_string())
    }
}

/// Gemini `generateContent` client
pub struct GeminiClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    model: String,
}

impl GeminiClient {
    /// Create a client; a missing key only fails when a request is made
    pub fn new(base_url: &str, api_key: Option<String>, model: impl Into<String>) -> anyhow::Result<Self> {
        use anyhow::Context;

        let client = Client::builder().build().context("Failed to create HTTP client")?;
        let base_url = Url::parse(base_url).context("Invalid chat model URL")?;
        Ok(Self {
            client,
            base_url,
            api_key: api_key.filter(|k| !k.is_empty()),
            model: model.into(),
        })
    }

    fn endpoint(&self, key: &str) -> Result<Url, GeminiError> {
        let mut url = self
            .base_url
            .join(&format!("v1beta/models/{}:generateContent", self.model))?;
        url.query_pairs_mut().append_pair("key", key);
        Ok(url)
    }

    async fn generate(&self, history: &[ChatMessage], message: &str) -> Result<String, GeminiError> {
        let key = self.api_key.as_deref().ok_or(GeminiError::MissingKey)?;
        let response = self
            .client
            .post(self.endpoint(key)?)
            .json(&request_body(history, message))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GeminiError::Status { status, body });
        }

        let body: GenerateResponse = response.json().await?;
        body.text().ok_or(GeminiError::EmptyAnswer)
    }
}

#[async_trait]
impl ChatBackend for GeminiClient {
    async fn complete(&self, history: &[ChatMessage], message: &str) -> coffee_lib::Result<String> {
        Ok(self.generate(history, message).await?)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// API request/response types

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

impl GenerateResponse {
    /// Text parts of the first candidate, concatenated
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content.parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!text.is_empty()).then_some(text)
    }
}

fn content(role: &str, text: &str) -> Content {
    Content {
        role: Some(role.to_string()),
        parts: vec![Part {
            text: Some(text.to_string()),
        }],
    }
}

fn request_body(history: &[ChatMessage], message: &str) -> GenerateRequest {
    let mut contents: Vec<Content> = history
        .iter()
        .map(|m| content(m.role.remote_name(), &m.content))
        .collect();
    contents.push(content("user", message));
    GenerateRequest { contents }
}

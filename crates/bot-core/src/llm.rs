use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agent::harness::LlmClient;
use crate::agent::memory::HistoryEntry;

pub const DEFAULT_ENDPOINT: &str = "https://models.inference.ai.azure.com";
pub const DEFAULT_MODEL: &str = "Meta-Llama-3.1-8B-Instruct";

/// Config for an OpenAI-compatible `POST <endpoint>/chat/completions` API.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ChatConfig {
    /// Base URL; `/chat/completions` is appended.
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            temperature: 1.3,
            top_p: 1.0,
            max_tokens: 700,
            timeout_secs: 60,
        }
    }
}

impl ChatConfig {
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("inference request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("inference endpoint returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("inference response decode failed: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("inference response had no choices")]
    NoChoices,
    #[error("inference response text was empty")]
    EmptyText,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [HistoryEntry],
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Reusable client; holds one connection pool for the life of the process.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
    cfg: ChatConfig,
}

impl ChatClient {
    pub fn new(cfg: ChatConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self { http, cfg })
    }

    pub fn config(&self) -> &ChatConfig {
        &self.cfg
    }

    pub async fn chat(&self, messages: &[HistoryEntry]) -> Result<String, InferenceError> {
        let request = ChatRequest {
            model: &self.cfg.model,
            messages,
            temperature: self.cfg.temperature,
            top_p: self.cfg.top_p,
            max_tokens: self.cfg.max_tokens,
        };

        let mut builder = self.http.post(self.cfg.completions_url()).json(&request);
        if let Some(key) = self.cfg.api_key.as_deref() {
            builder = builder.bearer_auth(key);
        }

        let res = builder.send().await.map_err(InferenceError::Transport)?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(InferenceError::Status { status, body });
        }

        let parsed = res
            .json::<ChatResponse>()
            .await
            .map_err(InferenceError::Decode)?;
        debug!(choices = parsed.choices.len(), "llm.chat.response");
        extract_text(parsed)
    }
}

fn extract_text(res: ChatResponse) -> Result<String, InferenceError> {
    let choice = res
        .choices
        .into_iter()
        .next()
        .ok_or(InferenceError::NoChoices)?;
    let text = choice.message.and_then(|m| m.content).unwrap_or_default();
    if text.trim().is_empty() {
        return Err(InferenceError::EmptyText);
    }
    Ok(text)
}

impl LlmClient for ChatClient {
    fn complete<'a>(
        &'a self,
        messages: Vec<HistoryEntry>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move { Ok(self.chat(&messages).await?) })
    }
}

//! Chat-completion client for an OpenAI-compatible endpoint.

use crate::config::LlmConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("LLM API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("unreadable LLM response: {0}")]
    Malformed(String),

    #[error("LLM returned no content")]
    Empty,
}

/// One system + user message pair in, one text completion out.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> std::result::Result<String, LlmError>;
}

#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Llm(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, system: &str, user: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "temperature": 0.1,
        })
    }
}

#[async_trait]
impl CompletionClient for LlmClient {
    async fn complete(&self, system: &str, user: &str) -> std::result::Result<String, LlmError> {
        let body = self.request_body(system, user);

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!("LLM API returned {}", status);
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: error_text,
            });
        }

        let response_json: serde_json::Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout
            } else {
                LlmError::Malformed(e.to_string())
            }
        })?;

        let content = extract_content(&response_json)?;
        debug!(model = %self.model, "LLM completion: {}", content);
        Ok(content)
    }
}

/// Pull `choices[0].message.content` out of a chat-completion body.
pub fn extract_content(response_json: &serde_json::Value) -> std::result::Result<String, LlmError> {
    if let Some(error) = response_json.get("error") {
        return Err(LlmError::Malformed(format!("LLM API error: {}", error)));
    }

    let choices = response_json
        .get("choices")
        .and_then(|c| c.as_array())
        .ok_or_else(|| LlmError::Malformed("no choices array in response".to_string()))?;

    let first = match choices.first() {
        Some(choice) => choice,
        None => return Err(LlmError::Empty),
    };

    if first.get("finish_reason").and_then(|r| r.as_str()) == Some("length") {
        warn!("LLM response was truncated due to length limit");
    }

    let content = first["message"]["content"].as_str().unwrap_or("");
    if content.trim().is_empty() {
        return Err(LlmError::Empty);
    }

    Ok(content.to_string())
}

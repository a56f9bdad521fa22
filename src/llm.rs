//! Text generation capability and the OpenAI-compatible provider.
//!
//! [`Generator`] is the seam the chat orchestrator speaks to;
//! [`HttpGenerator`] calls an OpenAI-compatible `POST /chat/completions`
//! endpoint (OpenRouter by default). Unlike embeddings, generation is
//! not retried by the core: a timeout or failure surfaces directly and
//! retry policy belongs to the caller.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::models::Role;

/// A chat-shaped generation request: system framing plus ordered turns.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system: String,
    pub messages: Vec<(Role, String)>,
}

/// Capability that turns a grounded prompt into a natural-language reply.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, api_key: &str, request: &GenerationRequest) -> Result<String>;
}

/// Generator backed by an OpenAI-compatible chat-completions endpoint.
pub struct HttpGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl HttpGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.chat_model.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, api_key: &str, request: &GenerationRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": request.system,
        })];
        for (role, text) in &request.messages {
            let role = match role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(serde_json::json!({"role": role, "content": text}));
        }

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": 0.7,
            "messages": messages,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::UpstreamTimeout("generation")
                } else {
                    Error::Upstream(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "chat API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Upstream(e.to_string()))?;
        parse_completion_response(&json)
    }
}

/// Parse an OpenAI-shaped completion: `choices[0].message.content`.
fn parse_completion_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| Error::Upstream("invalid chat response: missing content".to_string()))
}

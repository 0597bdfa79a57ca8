use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::GatewayError;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";

#[derive(Serialize)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<ClaudeMessage>,
}

#[derive(Deserialize)]
struct ClaudeContent {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContent>,
}

#[derive(Clone)]
pub struct ClaudeClient {
    client: Client,
    api_key: String,
    model: String,
}

impl ClaudeClient {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Result<Self, GatewayError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ask for a single JSON object answering `prompt`
    pub async fn complete_json(&self, prompt: &str) -> Result<String, GatewayError> {
        let request = ClaudeRequest {
            model: self.model.clone(),
            max_tokens: 4096,
            system: "Reply with a single JSON object and nothing else.".to_string(),
            messages: vec![ClaudeMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self.client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status { provider: "Claude", status, body });
        }

        let claude_response: ClaudeResponse = response.json().await?;
        claude_response.content
            .into_iter()
            .map(|c| c.text)
            .find(|t| !t.trim().is_empty())
            .ok_or(GatewayError::EmptyResponse)
    }

    pub fn list_models() -> Vec<String> {
        vec![
            "claude-sonnet-4-20250514".to_string(),
            "claude-3-5-sonnet-20241022".to_string(),
            "claude-3-5-haiku-20241022".to_string(),
        ]
    }
}

//! The AI flow gateway: an opaque async request -> response function per flow.

use async_trait::async_trait;
use tracing::{debug, error};

use super::flows::{FlowRequest, FlowResponse};
use super::{ClaudeClient, OllamaClient, OpenAIClient};
use crate::config::Config;
use crate::error::GatewayError;
use crate::provider::Provider;

#[async_trait]
pub trait FlowGateway: Send + Sync {
    async fn run(&self, request: &FlowRequest) -> Result<FlowResponse, GatewayError>;
}

/// One of the supported model backends
#[derive(Clone)]
pub enum LlmClient {
    Ollama(OllamaClient),
    Claude(ClaudeClient),
    OpenAI(OpenAIClient),
}

impl LlmClient {
    pub fn from_config(config: &Config) -> Result<Self, GatewayError> {
        let model = config.model();
        let timeout = config.request_timeout();

        let client = match config.provider {
            Provider::Ollama => LlmClient::Ollama(OllamaClient::new(&config.ollama_url, &model, timeout)?),
            Provider::Claude => {
                let key = config
                    .api_key(Provider::Claude)
                    .ok_or(GatewayError::MissingApiKey(Provider::Claude.display_name()))?;
                LlmClient::Claude(ClaudeClient::new(&key, &model, timeout)?)
            }
            Provider::OpenAI => {
                let key = config
                    .api_key(Provider::OpenAI)
                    .ok_or(GatewayError::MissingApiKey(Provider::OpenAI.display_name()))?;
                LlmClient::OpenAI(OpenAIClient::new(&key, &model, timeout)?)
            }
        };
        Ok(client)
    }

    pub fn provider(&self) -> Provider {
        match self {
            LlmClient::Ollama(_) => Provider::Ollama,
            LlmClient::Claude(_) => Provider::Claude,
            LlmClient::OpenAI(_) => Provider::OpenAI,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            LlmClient::Ollama(c) => c.model(),
            LlmClient::Claude(c) => c.model(),
            LlmClient::OpenAI(c) => c.model(),
        }
    }

    pub async fn complete_json(&self, prompt: &str) -> Result<String, GatewayError> {
        match self {
            LlmClient::Ollama(c) => c.complete_json(prompt).await,
            LlmClient::Claude(c) => c.complete_json(prompt).await,
            LlmClient::OpenAI(c) => c.complete_json(prompt).await,
        }
    }
}

/// Renders each flow's prompt, sends it to the configured model and decodes
/// the JSON reply.
pub struct LlmGateway {
    client: LlmClient,
}

impl LlmGateway {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FlowGateway for LlmGateway {
    async fn run(&self, request: &FlowRequest) -> Result<FlowResponse, GatewayError> {
        debug!(
            flow = request.name(),
            provider = self.client.provider().as_str(),
            model = self.client.model(),
            "running flow"
        );

        let result = match self.client.complete_json(&request.prompt()).await {
            Ok(raw) => request.parse_response(&raw),
            Err(err) => Err(err),
        };

        if let Err(err) = &result {
            error!(flow = request.name(), error = %err, "flow failed");
        }
        result
    }
}

/// Stands in when no backend could be configured; every call fails with
/// the configuration problem so the panels can show it.
pub struct UnconfiguredGateway {
    provider: Provider,
}

impl UnconfiguredGateway {
    pub fn new(provider: Provider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl FlowGateway for UnconfiguredGateway {
    async fn run(&self, _request: &FlowRequest) -> Result<FlowResponse, GatewayError> {
        Err(GatewayError::MissingApiKey(self.provider.display_name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::flows::PassageSummaryInput;

    #[test]
    fn test_ollama_client_from_default_config() {
        let client = LlmClient::from_config(&Config::default()).unwrap();
        assert_eq!(client.provider(), Provider::Ollama);
        assert_eq!(client.model(), "gemma3:latest");
    }

    #[test]
    fn test_claude_client_uses_configured_key_and_model() {
        let config = Config {
            provider: Provider::Claude,
            claude_api_key: Some("sk-test".to_string()),
            default_model: Some("claude-3-5-haiku-20241022".to_string()),
            ..Config::default()
        };
        let client = LlmClient::from_config(&config).unwrap();
        assert_eq!(client.provider(), Provider::Claude);
        assert_eq!(client.model(), "claude-3-5-haiku-20241022");
    }

    #[tokio::test]
    async fn test_unconfigured_gateway_always_fails() {
        let gateway = UnconfiguredGateway::new(Provider::OpenAI);
        let request = FlowRequest::PassageSummary(PassageSummaryInput {
            passage_text: "In the beginning".to_string(),
        });
        let err = gateway.run(&request).await.unwrap_err();
        assert!(matches!(err, GatewayError::MissingApiKey("ChatGPT (OpenAI)")));
    }
}

pub mod claude;
pub mod flows;
pub mod gateway;
pub mod ollama;
pub mod openai;

pub use claude::ClaudeClient;
pub use flows::{FlowRequest, FlowResponse};
pub use gateway::{FlowGateway, LlmClient, LlmGateway, UnconfiguredGateway};
pub use ollama::OllamaClient;
pub use openai::OpenAIClient;

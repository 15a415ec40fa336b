//! Unified LLM client that routes to the appropriate provider based on
//! model name — the sole indirection this workspace allows over a
//! direct provider SDK call. It picks a provider and then calls straight
//! through to `async-openai` or a raw `reqwest` request; it never
//! buffers or replays a call in a way that would hide it from a
//! cost-tracing interceptor sitting at either client's call site.

use orchestra_core::EngineError;
use serde::de::DeserializeOwned;

use crate::anthropic::AnthropicClient;
use crate::client::{LlmClient, LlmMetrics, LlmResponse};

#[derive(Debug, Clone, Copy)]
enum ProviderType {
    OpenAI,
    Anthropic,
}

/// Unified client that routes requests to OpenAI or Anthropic based on model name.
pub struct UnifiedLlmClient {
    model: String,
    provider: ProviderType,
    api_base: Option<String>,
}

impl UnifiedLlmClient {
    pub fn new(model: &str, api_base: Option<&str>) -> Self {
        let provider = if model.starts_with("claude-") { ProviderType::Anthropic } else { ProviderType::OpenAI };
        Self { model: model.to_string(), provider, api_base: api_base.map(String::from) }
    }

    pub fn is_anthropic(&self) -> bool {
        matches!(self.provider, ProviderType::Anthropic)
    }

    pub async fn chat(&self, system_prompt: &str, user_input: &str) -> Result<LlmResponse, EngineError> {
        match self.provider {
            ProviderType::OpenAI => LlmClient::new(&self.model, self.api_base.as_deref()).chat(system_prompt, user_input).await,
            ProviderType::Anthropic => AnthropicClient::new(&self.model).chat(system_prompt, user_input).await,
        }
    }

    pub async fn structured<T: DeserializeOwned>(
        &self,
        system_prompt: &str,
        user_input: &str,
    ) -> Result<(T, LlmMetrics), EngineError> {
        match self.provider {
            ProviderType::OpenAI => {
                LlmClient::new(&self.model, self.api_base.as_deref()).structured(system_prompt, user_input).await
            }
            ProviderType::Anthropic => AnthropicClient::new(&self.model).structured(system_prompt, user_input).await,
        }
    }
}

//! OpenAI-compatible chat client. Non-streaming only — block execution
//! and Thinker stages each make a single request/response call and
//! parse the whole body, never a token stream (streaming LLM responses
//! is explicitly out of scope for this engine).

use std::time::Instant;

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse, ResponseFormat,
    },
    Client,
};
use orchestra_core::EngineError;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

/// Token usage and timing metrics from an LLM call.
#[derive(Debug, Clone, Default)]
pub struct LlmMetrics {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub elapsed_ms: u64,
}

/// Complete response from an LLM call.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub metrics: LlmMetrics,
}

fn llm_err(e: impl ToString) -> EngineError {
    EngineError::BlockRuntimeError { block_id: "<llm>".into(), message: e.to_string() }
}

fn build_messages(system_prompt: &str, user_input: &str) -> Result<Vec<ChatCompletionRequestMessage>, EngineError> {
    Ok(vec![
        ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default().content(system_prompt).build().map_err(llm_err)?,
        ),
        ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default().content(user_input).build().map_err(llm_err)?,
        ),
    ])
}

fn extract_response(response: CreateChatCompletionResponse, elapsed_ms: u64) -> Result<LlmResponse, EngineError> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| llm_err("no response content"))?;

    let (input_tokens, output_tokens) =
        response.usage.map(|u| (u.prompt_tokens, u.completion_tokens)).unwrap_or((0, 0));

    info!(elapsed_ms, input_tokens, output_tokens, "llm call complete");

    Ok(LlmResponse { content, metrics: LlmMetrics { input_tokens, output_tokens, elapsed_ms } })
}

/// Client for OpenAI-compatible chat completion APIs.
pub struct LlmClient {
    client: Client<OpenAIConfig>,
    default_model: String,
}

impl LlmClient {
    pub fn new(model: &str, api_base: Option<&str>) -> Self {
        let config = match api_base {
            Some(base) => OpenAIConfig::new().with_api_base(base),
            None => OpenAIConfig::default(),
        };
        Self { client: Client::with_config(config), default_model: model.to_string() }
    }

    pub async fn chat(&self, system_prompt: &str, user_input: &str) -> Result<LlmResponse, EngineError> {
        let start = Instant::now();
        let messages = build_messages(system_prompt, user_input)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.default_model)
            .temperature(0.0)
            .messages(messages)
            .build()
            .map_err(llm_err)?;

        let response = self.client.chat().create(request).await.map_err(llm_err)?;
        extract_response(response, start.elapsed().as_millis() as u64)
    }

    /// Sends a request constrained to return a single JSON object, then
    /// parses it into `T`. Relies on the provider honoring
    /// `response_format`; the block executor's balanced-brace scan is
    /// the defense-in-depth layer for providers/models that don't.
    pub async fn structured<T: DeserializeOwned>(
        &self,
        system_prompt: &str,
        user_input: &str,
    ) -> Result<(T, LlmMetrics), EngineError> {
        let start = Instant::now();
        let messages = build_messages(system_prompt, user_input)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.default_model)
            .temperature(0.0)
            .response_format(ResponseFormat::JsonObject)
            .messages(messages)
            .build()
            .map_err(llm_err)?;

        let response = self.client.chat().create(request).await.map_err(llm_err)?;
        let llm_response = extract_response(response, start.elapsed().as_millis() as u64)?;

        debug!(content = %llm_response.content, "structured response");

        let parsed = serde_json::from_str(&llm_response.content)
            .map_err(|e| EngineError::BlockOutputError {
                block_id: "<llm>".into(),
                raw: llm_response.content.clone(),
                message: e.to_string(),
            })?;

        Ok((parsed, llm_response.metrics))
    }
}

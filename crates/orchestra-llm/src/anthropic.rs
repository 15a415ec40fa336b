//! Raw `reqwest` client for Anthropic's Messages API. No SDK wrapper
//! library sits between this crate and the HTTP call — block execution
//! and Thinker stages must be able to see exactly what goes over the
//! wire for cost tracing.

use orchestra_core::EngineError;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::client::{LlmMetrics, LlmResponse};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<AnthropicMessage>,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

#[derive(Deserialize)]
struct NonStreamResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

fn llm_err(e: impl ToString) -> EngineError {
    EngineError::BlockRuntimeError { block_id: "<llm>".into(), message: e.to_string() }
}

/// Client for Anthropic's Claude API.
pub struct AnthropicClient {
    client: Client,
    model: String,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(model: &str) -> Self {
        let api_key = std::env::var("ANTHROPIC_API_KEY").unwrap_or_default();
        Self { client: Client::new(), model: model.to_string(), api_key }
    }

    pub async fn chat(&self, system_prompt: &str, user_input: &str) -> Result<LlmResponse, EngineError> {
        let start = std::time::Instant::now();

        let request = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: 8192,
            system: system_prompt.to_string(),
            messages: vec![AnthropicMessage { role: "user", content: user_input.to_string() }],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(llm_err)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(llm_err(format!("anthropic api error {status}: {body}")));
        }

        let resp: NonStreamResponse = response.json().await.map_err(llm_err)?;
        let content = resp.content.into_iter().map(|c| c.text).collect::<Vec<_>>().join("");

        Ok(LlmResponse {
            content,
            metrics: LlmMetrics {
                input_tokens: resp.usage.input_tokens.unwrap_or(0),
                output_tokens: resp.usage.output_tokens.unwrap_or(0),
                elapsed_ms: start.elapsed().as_millis() as u64,
            },
        })
    }

    /// Anthropic has no `response_format` knob, so the JSON contract is
    /// enforced entirely by instruction plus the caller's balanced-brace
    /// extraction (see `orchestra-executor`'s prompt rendering step).
    pub async fn structured<T: DeserializeOwned>(
        &self,
        system_prompt: &str,
        user_input: &str,
    ) -> Result<(T, LlmMetrics), EngineError> {
        let system_prompt = format!("{system_prompt}\n\nRespond with ONLY a single valid JSON object. No prose, no markdown fences.");
        let response = self.chat(&system_prompt, user_input).await?;

        let parsed = serde_json::from_str(&response.content).map_err(|e| EngineError::BlockOutputError {
            block_id: "<llm>".into(),
            raw: response.content.clone(),
            message: e.to_string(),
        })?;

        Ok((parsed, response.metrics))
    }
}

//! Direct LLM provider clients for OpenAI and Anthropic.
//!
//! - [`UnifiedLlmClient`] — picks a provider from the model name and calls
//!   it directly. This is what block execution (§4.3) and every Thinker
//!   stage (§4.5) use; there is no generic wrapper layer beneath it.
//! - [`LlmClient`] — OpenAI-compatible client (`async-openai`).
//! - [`AnthropicClient`] — Claude models via raw `reqwest`.
//!
//! Streaming token-by-token responses are intentionally not implemented:
//! every call here is request/response.

mod anthropic;
mod client;
mod unified;

pub use anthropic::AnthropicClient;
pub use client::{LlmClient, LlmMetrics, LlmResponse};
pub use unified::UnifiedLlmClient;

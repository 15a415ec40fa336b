//! HTTP route handlers for the orchestration server.

pub mod agent;
pub mod clarify;
pub mod memory;
pub mod pipeline;
pub mod ws;

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}

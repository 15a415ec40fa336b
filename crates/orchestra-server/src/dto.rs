//! Data transfer objects for HTTP and WebSocket message serialization.

use orchestra_core::{BlockDefinition, Event, PipelineDAG, RunState};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// === Clarifier ===

/// Request to advance a clarifying conversation by one turn. `session_id`
/// is optional on the first turn; the server mints one and echoes it back
/// in [`ClarifyResponse`] so the client can carry it on subsequent turns.
#[derive(Debug, Deserialize)]
pub struct ClarifyRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    pub message: String,
}

/// Response for one Clarifier turn: either a follow-up question or a
/// `refined_intent` ready to hand to `/create-agent`.
#[derive(Debug, Serialize)]
pub struct ClarifyResponse {
    pub session_id: String,
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refined_intent: Option<String>,
}

// === Construction (create-agent) ===

/// Request to build a pipeline from an already-refined intent.
#[derive(Debug, Deserialize)]
pub struct CreateAgentRequest {
    pub intent: String,
    pub user_id: String,
}

/// Response from a completed (non-streaming) construction run. `pipeline`
/// is `None` and `unresolved` is populated when Search/Synthesize could
/// not cover every required capability — a partial outcome, not an HTTP
/// error.
#[derive(Debug, Serialize)]
pub struct CreateAgentResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<PipelineDAG>,
    pub status: String,
    pub log: Vec<Event>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unresolved: Option<Vec<String>>,
}

/// Request to go straight from a raw user message to a completed run,
/// skipping both an interactive clarifying round-trip and a separate
/// construction call: clarify, build, and execute in one request.
#[derive(Debug, Deserialize)]
pub struct AutomateRequest {
    pub user_id: String,
    pub message: String,
    /// Upserts the caller's profile before the run starts, so the Doer's
    /// own `{{user...}}` lookup sees it. Omit to run against whatever
    /// profile (if any) is already on file for `user_id`.
    #[serde(default)]
    pub user: Option<Value>,
}

/// Response from `/automate`: the pipeline that was built plus the run
/// it produced.
#[derive(Debug, Serialize)]
pub struct AutomateResponse {
    pub pipeline: PipelineDAG,
    pub run: RunState,
}

// === Pipeline execution ===

/// Request to run an already-built pipeline. The full [`PipelineDAG`]
/// travels inline rather than by id — the caller may be running a
/// pipeline it just built and never saved.
#[derive(Debug, Deserialize)]
pub struct RunPipelineRequest {
    pub pipeline: PipelineDAG,
    pub user_id: String,
    #[serde(default)]
    pub user: Option<Value>,
    /// Lets a caller pre-pick the id it will open `WS /execution/{run_id}`
    /// with; the server mints one if omitted.
    #[serde(default)]
    pub run_id: Option<String>,
}

/// Response from a completed run.
#[derive(Debug, Serialize)]
pub struct RunPipelineResponse {
    pub run_id: String,
    pub run: RunState,
}

// === Blocks CRUD ===

/// Response listing the registry's current blocks.
#[derive(Debug, Serialize)]
pub struct ListBlocksResponse {
    pub blocks: Vec<BlockDefinition>,
}

/// Request to register or replace a block. `expected_signature` makes
/// the write a compare-and-swap against the currently stored block (see
/// [`orchestra_registry::BlockRegistry::save`]); omit it for a new id.
#[derive(Debug, Deserialize)]
pub struct SaveBlockRequest {
    pub block: BlockDefinition,
    #[serde(default)]
    pub expected_signature: Option<u64>,
}

// === Pipelines CRUD ===

/// Response listing saved pipelines.
#[derive(Debug, Serialize)]
pub struct ListPipelinesResponse {
    pub pipelines: Vec<PipelineDAG>,
}

// === Executions ===

/// Response listing past runs, optionally filtered by pipeline.
#[derive(Debug, Serialize)]
pub struct ListExecutionsResponse {
    pub executions: Vec<RunState>,
}

// === Memory ===

/// Response exposing a user's current memory snapshot.
#[derive(Debug, Serialize)]
pub struct MemoryResponse {
    pub user_id: String,
    pub memory: serde_json::Map<String, Value>,
}

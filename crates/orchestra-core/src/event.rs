use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pipeline::PipelineDAG;

/// A single item Decompose wants a block for. Forwarded to Search, and
/// to Synthesize if Search can't match it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiredBlockSpec {
    pub suggested_id: String,
    pub description: String,
    #[serde(default)]
    pub execution_kind_hint: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub input_schema: Value,
    pub output_schema: Value,
}

/// Typed progress events emitted by the Thinker and the Doer to an
/// optional sink. Append-only and ordered within a run/build; consumers
/// must tolerate unknown future variants, which is why this is
/// `#[serde(tag = "type")]` rather than relying on positional shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Stage { stage: String },
    LlmPrompt { stage: String, system: String, user: String },
    LlmResponse { stage: String, elapsed_ms: u64, response: String },
    DecomposeBlocks { required: Vec<RequiredBlockSpec> },
    SearchFound { suggested_id: String, block_id: String, score: f32 },
    SearchMissing { suggested_id: String },
    CreatingBlock { suggested_id: String, attempt: u32 },
    BlockCreated { block_id: String },
    BlockTestPassed { block_id: String, attempt: u32 },
    BlockTestFailed { suggested_id: String, attempt: u32, message: String },
    BlockCreateFailed { suggested_id: String, attempts: u32, message: String },
    Complete { pipeline: PipelineDAG, status: String },

    RunStart { run_id: String, pipeline_id: String },
    NodeStart { run_id: String, node_id: String, block_id: String },
    NodeComplete { run_id: String, node_id: String, status: String, preview: Value },
    RunComplete { run_id: String, status: String },
    RunError { run_id: String, node_id: Option<String>, message: String },
}

/// A sink events are pushed to. Both the Thinker and the Doer accept
/// `Option<&dyn EventSink>` so they remain fully usable — and testable —
/// without a transport attached.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

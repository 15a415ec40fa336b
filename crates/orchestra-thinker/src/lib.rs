//! The construction pipeline: turns a refined intent into a validated
//! [`PipelineDAG`] via Decompose → Search → Synthesize → Wire, plus the
//! pre-flight [`clarifier`].

mod clarifier;
mod decompose;
mod search;
mod synthesize;
mod wire;

pub use clarifier::{step as clarify_step, ClarifierStepResult};
pub use decompose::decompose;
pub use search::{search_stage, SearchOutcome};
pub use synthesize::synthesize_missing;
pub use wire::wire_stage;

use orchestra_core::{BlockDefinition, EngineError, Event, EventSink, PipelineDAG};
use orchestra_llm::UnifiedLlmClient;
use orchestra_registry::BlockRegistry;
use orchestra_sandbox::Sandbox;

fn emit(sink: Option<&dyn EventSink>, event: Event) {
    if let Some(sink) = sink {
        sink.emit(event);
    }
}

/// Runs the full construction pipeline for a single refined intent:
/// Decompose, Search the registry, Synthesize whatever Search couldn't
/// match, then Wire everything into a DAG. Emits `complete` with the
/// final pipeline and status on success; any stage's terminal error
/// short-circuits the rest.
pub async fn think(
    refined_intent: &str,
    registry: &BlockRegistry,
    llm: &UnifiedLlmClient,
    sandbox: &Sandbox,
    sink: Option<&dyn EventSink>,
) -> Result<PipelineDAG, EngineError> {
    let required = decompose(refined_intent, llm, sink).await?;
    let outcome = search_stage(&required, registry, llm, sink).await;

    let mut blocks: Vec<BlockDefinition> = outcome.matched.iter().map(|(_, b)| b.clone()).collect();

    if !outcome.missing.is_empty() {
        let synthesized = synthesize_missing(&outcome.missing, registry, llm, sandbox, sink).await?;
        blocks.extend(synthesized.into_iter().map(|(_, b)| b));
    }

    let pipeline = wire_stage(&blocks, refined_intent, llm, sink).await?;
    emit(sink, Event::Complete { pipeline: pipeline.clone(), status: "done".to_string() });
    Ok(pipeline)
}

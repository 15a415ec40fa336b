//! # Orchestra — natural language to validated DAG to execution
//!
//! Orchestra turns a natural-language automation request into a
//! validated DAG of reusable blocks, then executes that DAG
//! deterministically.
//!
//! Two halves:
//!
//! - The **Thinker** ([`orchestra_thinker`]) builds a [`PipelineDAG`]
//!   from a refined intent: Decompose the intent into required
//!   capabilities, Search the block registry for matches, Synthesize
//!   (generate, sandbox-test, register) whatever's missing, then Wire
//!   everything into a validated graph. A [`ClarifierSession`]-driven
//!   pre-flight dialog ([`clarify_step`]) turns an underspecified
//!   request into a refined intent before Decompose ever runs.
//! - The **Doer** ([`orchestra_doer::run`]) executes a built
//!   [`PipelineDAG`] to completion: topological level-batching,
//!   in-place memory threading between levels, and a structured
//!   [`Event`] log throughout.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use orchestra::prelude::*;
//!
//! let registry = BlockRegistry::new(Arc::new(NoOpEmbedder::new(384)));
//! let llm = UnifiedLlmClient::new("claude-haiku-4-5-20251001", None);
//! let sandbox = Sandbox::new()?;
//!
//! let pipeline = think("summarize today's top Hacker News stories", &registry, &llm, &sandbox, None).await?;
//!
//! let store = InMemoryStore::default();
//! let run = orchestra_doer::run(&pipeline, &registry, &store, &llm, &sandbox, "user-1", "run-1", None, &CancellationToken::new()).await?;
//! ```
//!
//! ## Crate structure
//!
//! | Crate | Description |
//! |-------|-------------|
//! | [`orchestra_core`] | Error taxonomy, block/pipeline data model, run state, typed events |
//! | [`orchestra_config`] | Pipeline JSON (de)serialization and a fluent [`PipelineBuilder`] |
//! | [`orchestra_registry`] | Block storage, CAS updates, hybrid vector/lexical search |
//! | [`orchestra_executor`] | Single-block template resolution and execution |
//! | [`orchestra_doer`] | DAG-level execution: level-batching, memory threading, event log |
//! | [`orchestra_thinker`] | Decompose → Search → Synthesize → Wire, plus the Clarifier |
//! | [`orchestra_sandbox`] | Module-whitelisted WebAssembly sandbox for `code` blocks |
//! | [`orchestra_llm`] | Direct OpenAI/Anthropic clients, routed by model name |

// Re-export core domain types
pub use orchestra_core::{
    BlockCategory, BlockDefinition, ClarifierSession, EngineError, Event, EventSink, ExecutionKind, FieldSchema, FieldType, LogEntry,
    Message, MessageRole, ModelConfig, NodeStatus, ObjectSchema, PipelineDAG, PipelineNode, RunState, RunStatus,
};

// Re-export config/builder types
pub use orchestra_config::{load_block_json, load_pipeline_file, load_pipeline_json, to_json, ConfigError, PipelineBuilder};

// Re-export the registry
pub use orchestra_registry::{BlockRegistry, NoOpEmbedder, RegistryError, SearchQuery, SearchResult, DEFAULT_MATCH_THRESHOLD};

// Re-export single-block execution
pub use orchestra_executor::{execute, ExecutionContext};

// Re-export DAG execution
pub use orchestra_doer::{run as execute_pipeline, CancellationToken, DoerStore, InMemoryStore};

// Re-export the construction pipeline
pub use orchestra_thinker::{clarify_step, decompose, search_stage, synthesize_missing, think, wire_stage, ClarifierStepResult};

// Re-export the sandbox
pub use orchestra_sandbox::Sandbox;

// Re-export LLM clients
pub use orchestra_llm::{AnthropicClient, LlmClient, LlmMetrics, LlmResponse, UnifiedLlmClient};

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use orchestra::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        think, BlockCategory, BlockDefinition, BlockRegistry, CancellationToken, ClarifierSession, EngineError, ExecutionKind,
        InMemoryStore, NoOpEmbedder, PipelineDAG, Sandbox, UnifiedLlmClient,
    };
}

//! Core domain types shared across the orchestration engine: the error
//! taxonomy, conversation/model types, block and pipeline data model,
//! run state, the Clarifier session, and the typed event protocol.
//!
//! Every other crate in this workspace depends on this one; it depends
//! on nothing but `serde` and `thiserror`.

mod block;
mod clarifier;
mod error;
mod event;
mod kind;
mod message;
mod pipeline;
mod run_state;
mod schema;

pub use block::BlockDefinition;
pub use clarifier::ClarifierSession;
pub use error::EngineError;
pub use event::{Event, EventSink, RequiredBlockSpec};
pub use kind::{BlockCategory, ExecutionKind};
pub use message::{Message, MessageRole, ModelConfig};
pub use pipeline::{DagValidationError, Edge, PipelineDAG, PipelineNode};
pub use run_state::{LogEntry, NodeStatus, RunState, RunStatus};
pub use schema::{FieldSchema, FieldType, ObjectSchema};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Overall status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Per-node status recorded in the run log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Completed,
    Failed,
    Skipped,
}

/// One entry in a [`RunState`]'s append-only log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub node_id: String,
    pub block_id: String,
    pub status: NodeStatus,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Per-run execution state, owned by the Doer for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: String,
    pub pipeline_id: String,
    pub user_id: String,
    /// `node_id -> output`. Write-once: once a key is set it is never
    /// overwritten for the lifetime of the run.
    pub results: HashMap<String, Value>,
    /// Static user profile, loaded once at run start.
    pub user: Value,
    /// User memory: loaded at start, mutated in place during the run,
    /// flushed atomically to the store at end-of-run.
    pub memory: serde_json::Map<String, Value>,
    pub log: Vec<LogEntry>,
    pub status: RunStatus,
}

impl RunState {
    pub fn new(run_id: impl Into<String>, pipeline_id: impl Into<String>, user_id: impl Into<String>, user: Value, memory: serde_json::Map<String, Value>) -> Self {
        Self {
            run_id: run_id.into(),
            pipeline_id: pipeline_id.into(),
            user_id: user_id.into(),
            results: HashMap::new(),
            user,
            memory,
            log: Vec::new(),
            status: RunStatus::Pending,
        }
    }

    /// Records a node's output. Panics if called twice for the same
    /// `node_id` — that would violate the write-once invariant, and a
    /// caller bug here is a programming error, not a recoverable one.
    pub fn record_result(&mut self, node_id: &str, output: Value) {
        assert!(
            !self.results.contains_key(node_id),
            "node '{node_id}' result written more than once in run {}",
            self.run_id
        );
        self.results.insert(node_id.to_string(), output);
    }
}

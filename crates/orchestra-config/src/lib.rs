//! Loading, building, and validating [`PipelineDAG`]s and
//! [`BlockDefinition`]s from JSON, plus a fluent builder for constructing
//! DAGs by hand (used by tests and by the hand-crafted scenarios in the
//! Doer's own test suite — Wire is the only caller that builds DAGs at
//! runtime).

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use orchestra_core::{BlockDefinition, DagValidationError, Edge, PipelineDAG, PipelineNode};
use serde_json::Value;

/// Errors that can occur when loading or validating a pipeline or block
/// definition from disk or from the wire.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid pipeline '{pipeline_id}': {source}")]
    Invalid {
        pipeline_id: String,
        #[source]
        source: DagValidationError,
    },
}

impl ConfigError {
    fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

/// Loads and validates a [`PipelineDAG`] from a JSON file.
pub fn load_pipeline_file(path: impl AsRef<Path>) -> Result<PipelineDAG, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path.display().to_string(), e))?;
    load_pipeline_json(&content)
}

/// Parses and validates a [`PipelineDAG`] from a JSON string.
pub fn load_pipeline_json(json: &str) -> Result<PipelineDAG, ConfigError> {
    let dag: PipelineDAG = serde_json::from_str(json)?;
    dag.validate().map_err(|source| ConfigError::Invalid { pipeline_id: dag.id.clone(), source })?;
    Ok(dag)
}

/// Serializes a [`PipelineDAG`] to pretty JSON.
pub fn to_json(dag: &PipelineDAG) -> Result<String, ConfigError> {
    Ok(serde_json::to_string_pretty(dag)?)
}

/// Parses and structurally checks a [`BlockDefinition`] from JSON — used
/// both by the registry's `save` path and by Synthesize's structural
/// validation step (§4.5 Stage C).
pub fn load_block_json(json: &str) -> Result<BlockDefinition, ConfigError> {
    Ok(serde_json::from_str(json)?)
}

// ---------------------------------------------------------------------------
// Builder API
// ---------------------------------------------------------------------------

/// Fluent builder for constructing a [`PipelineDAG`] programmatically.
/// Node ids are assigned sequentially (`n1`, `n2`, ...) in declaration
/// order, matching the stable-naming invariant in §3.
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    id: String,
    name: String,
    user_prompt: String,
    nodes: Vec<PipelineNode>,
    edges: HashSet<Edge>,
    memory_keys: Vec<String>,
}

impl PipelineBuilder {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            user_prompt: String::new(),
            nodes: Vec::new(),
            edges: HashSet::new(),
            memory_keys: Vec::new(),
        }
    }

    pub fn user_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.user_prompt = prompt.into();
        self
    }

    pub fn memory_key(mut self, key: impl Into<String>) -> Self {
        self.memory_keys.push(key.into());
        self
    }

    /// Appends a node bound to `block_id` with the given inputs. The
    /// node's id is assigned as `n{len+1}`.
    pub fn node(mut self, block_id: impl Into<String>, inputs: HashMap<String, Value>) -> Self {
        let id = format!("n{}", self.nodes.len() + 1);
        self.nodes.push(PipelineNode { id, block_id: block_id.into(), inputs });
        self
    }

    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.insert(Edge { from: from.into(), to: to.into() });
        self
    }

    pub fn build(self) -> PipelineDAG {
        PipelineDAG {
            id: self.id,
            name: self.name,
            user_prompt: self.user_prompt,
            nodes: self.nodes,
            edges: self.edges,
            memory_keys: self.memory_keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_assigns_sequential_ids() {
        let dag = PipelineBuilder::new("p1", "test")
            .node("search", HashMap::from([("query".to_string(), json!("hn"))]))
            .node("summarize", HashMap::from([("items".to_string(), json!("{{n1.results}}"))]))
            .edge("n1", "n2")
            .build();

        assert_eq!(dag.nodes[0].id, "n1");
        assert_eq!(dag.nodes[1].id, "n2");
        assert!(dag.validate().is_ok());
    }

    #[test]
    fn round_trips_through_json() {
        let dag = PipelineBuilder::new("p1", "test").node("search", HashMap::new()).build();
        let json = to_json(&dag).unwrap();
        let parsed = load_pipeline_json(&json).unwrap();
        assert_eq!(parsed.id, dag.id);
        assert_eq!(parsed.nodes.len(), 1);
    }
}

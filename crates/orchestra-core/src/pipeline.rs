use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single node in a [`PipelineDAG`]: one block instance, bound to
/// concrete (possibly templated) inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineNode {
    /// Sequential, stable id: `n1`, `n2`, ... Assigned by Wire.
    pub id: String,
    pub block_id: String,
    /// Literal values or `{{namespace.dotted.path}}` template strings.
    /// Non-string values always pass through literally.
    pub inputs: HashMap<String, Value>,
}

/// A directed edge between two node ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

/// A wired automation: the output of Thinker's Wire stage, and the sole
/// input the Doer needs to execute a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDAG {
    pub id: String,
    pub name: String,
    /// The refined intent this DAG was built from.
    pub user_prompt: String,
    pub nodes: Vec<PipelineNode>,
    pub edges: HashSet<Edge>,
    /// Memory keys this pipeline reads or writes.
    #[serde(default)]
    pub memory_keys: Vec<String>,
}

/// A structural problem found while validating a [`PipelineDAG`] before
/// it is handed to the Doer or returned from Wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DagValidationError {
    Cycle,
    DanglingEdge { from: String, to: String },
    UnknownNodeId(String),
    NonSequentialIds,
}

impl std::fmt::Display for DagValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cycle => write!(f, "pipeline graph contains a cycle"),
            Self::DanglingEdge { from, to } => {
                write!(f, "edge {from} -> {to} references a node that does not exist")
            }
            Self::UnknownNodeId(id) => write!(f, "node id '{id}' is not declared in `nodes`"),
            Self::NonSequentialIds => write!(f, "node ids must be n1, n2, ... in order"),
        }
    }
}

impl PipelineDAG {
    /// Builds an adjacency map (`node_id -> successors`) and an in-degree
    /// table, rejecting the DAG if it is cyclic or any edge dangles.
    /// This is the same check the Doer runs at load time (§4.4 step 1)
    /// and that Wire's validator runs before returning (§4.5 Stage D).
    pub fn validate(&self) -> Result<(), DagValidationError> {
        let node_ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();

        for (i, node) in self.nodes.iter().enumerate() {
            if node.id != format!("n{}", i + 1) {
                return Err(DagValidationError::NonSequentialIds);
            }
        }

        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut in_degree: HashMap<&str, usize> = node_ids.iter().map(|id| (*id, 0)).collect();

        for edge in &self.edges {
            if !node_ids.contains(edge.from.as_str()) {
                return Err(DagValidationError::UnknownNodeId(edge.from.clone()));
            }
            if !node_ids.contains(edge.to.as_str()) {
                return Err(DagValidationError::UnknownNodeId(edge.to.clone()));
            }
            adjacency.entry(edge.from.as_str()).or_default().push(edge.to.as_str());
            *in_degree.entry(edge.to.as_str()).or_default() += 1;
        }

        // Kahn's algorithm: if we can't peel every node, there's a cycle.
        let mut frontier: Vec<&str> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut visited = 0usize;

        while let Some(id) = frontier.pop() {
            visited += 1;
            if let Some(successors) = adjacency.get(id) {
                for successor in successors {
                    let deg = in_degree.get_mut(successor).expect("successor in in_degree");
                    *deg -= 1;
                    if *deg == 0 {
                        frontier.push(successor);
                    }
                }
            }
        }

        if visited != node_ids.len() {
            return Err(DagValidationError::Cycle);
        }

        Ok(())
    }

    /// Nodes with no incoming edge — the first level batch the Doer runs.
    pub fn root_ids(&self) -> Vec<&str> {
        let has_incoming: HashSet<&str> = self.edges.iter().map(|e| e.to.as_str()).collect();
        self.nodes
            .iter()
            .map(|n| n.id.as_str())
            .filter(|id| !has_incoming.contains(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, block_id: &str) -> PipelineNode {
        PipelineNode { id: id.to_string(), block_id: block_id.to_string(), inputs: HashMap::new() }
    }

    fn edge(from: &str, to: &str) -> Edge {
        Edge { from: from.to_string(), to: to.to_string() }
    }

    #[test]
    fn accepts_linear_chain() {
        let dag = PipelineDAG {
            id: "p1".into(),
            name: "chain".into(),
            user_prompt: "test".into(),
            nodes: vec![node("n1", "a"), node("n2", "b"), node("n3", "c")],
            edges: [edge("n1", "n2"), edge("n2", "n3")].into_iter().collect(),
            memory_keys: vec![],
        };
        assert!(dag.validate().is_ok());
        assert_eq!(dag.root_ids(), vec!["n1"]);
    }

    #[test]
    fn rejects_cycle() {
        let dag = PipelineDAG {
            id: "p1".into(),
            name: "cycle".into(),
            user_prompt: "test".into(),
            nodes: vec![node("n1", "a"), node("n2", "b")],
            edges: [edge("n1", "n2"), edge("n2", "n1")].into_iter().collect(),
            memory_keys: vec![],
        };
        assert_eq!(dag.validate(), Err(DagValidationError::Cycle));
    }

    #[test]
    fn rejects_dangling_edge() {
        let dag = PipelineDAG {
            id: "p1".into(),
            name: "dangling".into(),
            user_prompt: "test".into(),
            nodes: vec![node("n1", "a")],
            edges: [edge("n1", "n2")].into_iter().collect(),
            memory_keys: vec![],
        };
        assert!(matches!(dag.validate(), Err(DagValidationError::UnknownNodeId(_))));
    }

    #[test]
    fn merge_roots_are_both_independent() {
        let dag = PipelineDAG {
            id: "p1".into(),
            name: "merge".into(),
            user_prompt: "test".into(),
            nodes: vec![node("n1", "a"), node("n2", "b"), node("n3", "c")],
            edges: [edge("n1", "n3"), edge("n2", "n3")].into_iter().collect(),
            memory_keys: vec![],
        };
        assert!(dag.validate().is_ok());
        let mut roots = dag.root_ids();
        roots.sort_unstable();
        assert_eq!(roots, vec!["n1", "n2"]);
    }
}

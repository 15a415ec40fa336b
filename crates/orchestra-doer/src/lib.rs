//! Deterministic DAG execution: topological level-batching, memory
//! threading, structured event logging.
//!
//! Grounded in `fissio-engine`'s `execute_stream`/`execute_parallel`: the
//! teacher walks a fixed `"input" -> ... -> "output"` edge list with
//! `futures::future::join_all` for nodes with no inter-dependency. This
//! generalizes that into genuine topological level-batching over an
//! arbitrary DAG via Kahn's algorithm — repeatedly peel the
//! zero-in-degree frontier, `join_all` it, decrement in-degrees of
//! satisfied successors, repeat.

mod cancellation;
mod store;

pub use cancellation::CancellationToken;
pub use store::{DoerStore, InMemoryStore};

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use futures::future::join_all;
use orchestra_core::{BlockCategory, Event, EventSink, LogEntry, NodeStatus, PipelineDAG, PipelineNode, RunState, RunStatus};
use orchestra_executor::{ExecutionContext, RunStateView};
use orchestra_llm::UnifiedLlmClient;
use orchestra_registry::BlockRegistry;
use orchestra_sandbox::Sandbox;
use serde_json::Value;
use tracing::{info, warn};

fn emit(sink: Option<&dyn EventSink>, event: Event) {
    if let Some(sink) = sink {
        sink.emit(event);
    }
}

/// Runs `pipeline` to completion (or cancellation/failure), returning the
/// final [`RunState`]. Never panics on a block failure — failures are
/// recorded in the log and propagate as `skipped` status to transitive
/// descendants; the run itself only returns `Err` for a structural
/// problem with the DAG or the store.
pub async fn run(
    pipeline: &PipelineDAG,
    registry: &BlockRegistry,
    store: &dyn DoerStore,
    llm: &UnifiedLlmClient,
    sandbox: &Sandbox,
    user_id: &str,
    run_id: &str,
    sink: Option<&dyn EventSink>,
    cancel: &CancellationToken,
) -> Result<RunState, orchestra_core::EngineError> {
    pipeline.validate().map_err(|_| orchestra_core::EngineError::CycleError)?;

    let user = store.load_user(user_id).await?;
    let memory = store.load_memory(user_id).await?;
    let run_id = run_id.to_string();
    let mut state = RunState::new(&run_id, &pipeline.id, user_id, user, memory);
    state.status = RunStatus::Running;
    emit(sink, Event::RunStart { run_id: run_id.clone(), pipeline_id: pipeline.id.clone() });

    let nodes_by_id: HashMap<&str, &PipelineNode> = pipeline.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let mut in_degree: HashMap<String, usize> = nodes_by_id.keys().map(|id| (id.to_string(), 0)).collect();
    let mut successors: HashMap<String, Vec<String>> = nodes_by_id.keys().map(|id| (id.to_string(), Vec::new())).collect();
    for edge in &pipeline.edges {
        *in_degree.entry(edge.to.clone()).or_insert(0) += 1;
        successors.entry(edge.from.clone()).or_default().push(edge.to.clone());
    }

    let mut skipped: HashSet<String> = HashSet::new();
    let mut frontier: Vec<String> = pipeline.root_ids().into_iter().map(str::to_string).collect();
    let mut cancelled = false;

    while !frontier.is_empty() {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }

        let batch: Vec<&PipelineNode> = frontier.iter().filter_map(|id| nodes_by_id.get(id.as_str()).copied()).collect();
        for node in &batch {
            emit(sink, Event::NodeStart { run_id: run_id.clone(), node_id: node.id.clone(), block_id: node.block_id.clone() });
        }

        let outcomes = join_all(batch.iter().map(|node| execute_one(node, registry, &state, llm, sandbox, cancel))).await;

        // Memory writes within this level batch are collected and applied
        // once the whole batch has run, last-writer-wins with a warning on
        // same-key collision (§5) — this is what makes a write visible to
        // the next level's nodes while keeping within-batch execution order
        // genuinely unspecified, as the DAG itself implies.
        let mut batch_memory_writes: HashMap<String, (String, Value)> = HashMap::new();
        let mut next_failed = Vec::new();
        for (node, outcome) in batch.iter().zip(outcomes) {
            let status = match outcome {
                Ok((output, category)) => {
                    state.record_result(&node.id, output.clone());
                    if category == BlockCategory::Memory {
                        if let Value::Object(map) = &output {
                            for (key, value) in map {
                                if let Some((prev_node, _)) = batch_memory_writes.get(key) {
                                    warn!(node_id = %node.id, %key, previous_writer = %prev_node, "memory key written more than once in the same batch; last writer wins");
                                }
                                batch_memory_writes.insert(key.clone(), (node.id.clone(), value.clone()));
                            }
                        }
                    }
                    emit(
                        sink,
                        Event::NodeComplete { run_id: run_id.clone(), node_id: node.id.clone(), status: "completed".to_string(), preview: output },
                    );
                    NodeStatus::Completed
                }
                Err(NodeError::Cancelled) => {
                    cancelled = true;
                    emit(sink, Event::NodeComplete { run_id: run_id.clone(), node_id: node.id.clone(), status: "cancelled".to_string(), preview: Value::Null });
                    continue;
                }
                Err(NodeError::Failed { message, duration_ms }) => {
                    warn!(node_id = %node.id, %message, "node failed");
                    next_failed.push(node.id.clone());
                    emit(
                        sink,
                        Event::NodeComplete { run_id: run_id.clone(), node_id: node.id.clone(), status: "failed".to_string(), preview: Value::Null },
                    );
                    state.log.push(LogEntry { node_id: node.id.clone(), block_id: node.block_id.clone(), status: NodeStatus::Failed, output: None, error: Some(message), duration_ms });
                    NodeStatus::Failed
                }
            };
            if status == NodeStatus::Completed {
                state.log.push(LogEntry { node_id: node.id.clone(), block_id: node.block_id.clone(), status, output: state.results.get(&node.id).cloned(), error: None, duration_ms: 0 });
            }
        }

        for (key, (_, value)) in batch_memory_writes {
            state.memory.insert(key, value);
        }

        if cancelled {
            break;
        }

        for failed_id in &next_failed {
            mark_descendants_skipped(failed_id, &successors, &mut skipped);
        }

        let mut next_frontier = Vec::new();
        for node in &batch {
            for succ in successors.get(&node.id).into_iter().flatten() {
                if skipped.contains(succ) {
                    continue;
                }
                if let Some(degree) = in_degree.get_mut(succ) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        next_frontier.push(succ.clone());
                    }
                }
            }
        }
        frontier = next_frontier;
    }

    for skipped_id in &skipped {
        if let Some(node) = nodes_by_id.get(skipped_id.as_str()) {
            state.log.push(LogEntry { node_id: node.id.clone(), block_id: node.block_id.clone(), status: NodeStatus::Skipped, output: None, error: None, duration_ms: 0 });
        }
    }

    state.status = if cancelled {
        RunStatus::Cancelled
    } else if state.log.iter().any(|e| e.status == NodeStatus::Failed) {
        RunStatus::Failed
    } else {
        RunStatus::Completed
    };

    store.save_memory(user_id, &state.memory).await?;
    store.persist_run(&state).await?;

    match state.status {
        RunStatus::Failed => emit(sink, Event::RunError { run_id: run_id.clone(), node_id: None, message: "one or more nodes failed".to_string() }),
        _ => emit(sink, Event::RunComplete { run_id: run_id.clone(), status: format!("{:?}", state.status).to_lowercase() }),
    }

    info!(run_id = %run_id, status = ?state.status, "run finished");
    Ok(state)
}

fn mark_descendants_skipped(failed_id: &str, successors: &HashMap<String, Vec<String>>, skipped: &mut HashSet<String>) {
    let mut stack = vec![failed_id.to_string()];
    while let Some(id) = stack.pop() {
        for succ in successors.get(&id).into_iter().flatten() {
            if skipped.insert(succ.clone()) {
                stack.push(succ.clone());
            }
        }
    }
}

/// A node's failure mode: a genuine block error (with how long it ran
/// before failing) or the run being cancelled out from under it.
enum NodeError {
    Failed { message: String, duration_ms: u64 },
    Cancelled,
}

/// Executes one node, racing it against `cancel` so an in-flight block
/// call is abandoned as soon as cancellation is requested rather than
/// only being noticed at the next batch boundary.
async fn execute_one(
    node: &PipelineNode,
    registry: &BlockRegistry,
    state: &RunState,
    llm: &UnifiedLlmClient,
    sandbox: &Sandbox,
    cancel: &CancellationToken,
) -> Result<(Value, BlockCategory), NodeError> {
    let start = Instant::now();
    let block = registry
        .get(&node.block_id)
        .await
        .ok_or_else(|| NodeError::Failed { message: format!("block '{}' not found in registry", node.block_id), duration_ms: 0 })?;

    let view = RunStateView { results: &state.results, user: &state.user, memory: &state.memory };
    let resolved = orchestra_executor::resolve(&node.inputs, &view);
    let resolved_map = resolved.into_iter().collect::<serde_json::Map<_, _>>();

    let ctx = ExecutionContext { user: &state.user, memory: &state.memory, user_id: &state.user_id, llm, sandbox };
    let category = block.category;

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(NodeError::Cancelled),
        result = orchestra_executor::execute(&block, resolved_map, &ctx) => result
            .map(|output| (output, category))
            .map_err(|e| NodeError::Failed { message: e.to_string(), duration_ms: start.elapsed().as_millis() as u64 }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestra_core::Edge;

    #[test]
    fn skip_propagates_transitively() {
        let mut successors = HashMap::new();
        successors.insert("n1".to_string(), vec!["n2".to_string()]);
        successors.insert("n2".to_string(), vec!["n3".to_string()]);
        successors.insert("n3".to_string(), vec![]);

        let mut skipped = HashSet::new();
        mark_descendants_skipped("n1", &successors, &mut skipped);

        assert!(skipped.contains("n2"));
        assert!(skipped.contains("n3"));
    }

    #[test]
    fn edge_type_smoke() {
        let e = Edge { from: "n1".to_string(), to: "n2".to_string() };
        assert_eq!(e.from, "n1");
    }
}

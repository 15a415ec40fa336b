//! `/pipeline/run`, `/blocks[...]`, `/pipelines[...]`, `/executions[...]`
//! — thin handlers delegating to the store and the Doer.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use orchestra_core::EngineError;
use orchestra_doer::CancellationToken;
use serde::Deserialize;

use crate::dto::{
    ListBlocksResponse, ListExecutionsResponse, ListPipelinesResponse, RunPipelineRequest, RunPipelineResponse, SaveBlockRequest,
};
use crate::error::ApiError;
use crate::run_events::BroadcastSink;
use crate::EngineState;

/// Bounded so a run that emits faster than any subscriber drains falls
/// behind rather than growing without limit; a mirroring socket just
/// sees a `Lagged` gap.
const RUN_EVENT_CHANNEL_CAPACITY: usize = 256;

pub async fn run(State(state): State<Arc<EngineState>>, Json(req): Json<RunPipelineRequest>) -> Result<Json<RunPipelineResponse>, ApiError> {
    if let Some(user) = &req.user {
        state.store.save_user(&req.user_id, user).await?;
    }

    let run_id = req.run_id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let (tx, _rx) = tokio::sync::broadcast::channel(RUN_EVENT_CHANNEL_CAPACITY);
    state.run_events.write().await.insert(run_id.clone(), tx.clone());
    let sink = BroadcastSink(tx);

    let result = orchestra_doer::run(
        &req.pipeline,
        &state.registry,
        state.store.as_ref(),
        &state.llm,
        &state.sandbox,
        &req.user_id,
        &run_id,
        Some(&sink),
        &CancellationToken::new(),
    )
    .await;

    state.run_events.write().await.remove(&run_id);

    let run = result?;
    Ok(Json(RunPipelineResponse { run_id, run }))
}

pub async fn list_blocks(State(state): State<Arc<EngineState>>) -> Result<Json<ListBlocksResponse>, ApiError> {
    Ok(Json(ListBlocksResponse { blocks: state.registry.list().await }))
}

pub async fn save_block(
    State(state): State<Arc<EngineState>>,
    Json(req): Json<SaveBlockRequest>,
) -> Result<Json<orchestra_core::BlockDefinition>, ApiError> {
    let saved = state.registry.save(req.block, req.expected_signature).await.map_err(|e| EngineError::StoreError(e.to_string()))?;
    state.store.save_block(&saved).await?;
    Ok(Json(saved))
}

pub async fn delete_block(State(state): State<Arc<EngineState>>, Path(id): Path<String>) -> Result<(), ApiError> {
    state.registry.remove(&id).await;
    state.store.delete_block(&id).await?;
    Ok(())
}

pub async fn list_pipelines(State(state): State<Arc<EngineState>>) -> Result<Json<ListPipelinesResponse>, ApiError> {
    Ok(Json(ListPipelinesResponse { pipelines: state.store.list_pipelines().await? }))
}

pub async fn save_pipeline(State(state): State<Arc<EngineState>>, Json(pipeline): Json<orchestra_core::PipelineDAG>) -> Result<(), ApiError> {
    pipeline.validate().map_err(|e| EngineError::StoreError(e.to_string()))?;
    state.store.save_pipeline(&pipeline).await?;
    Ok(())
}

pub async fn delete_pipeline(State(state): State<Arc<EngineState>>, Path(id): Path<String>) -> Result<(), ApiError> {
    state.store.delete_pipeline(&id).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct ListExecutionsQuery {
    pub pipeline_id: Option<String>,
}

pub async fn list_executions(
    State(state): State<Arc<EngineState>>,
    Query(q): Query<ListExecutionsQuery>,
) -> Result<Json<ListExecutionsResponse>, ApiError> {
    let executions = state.store.list_executions(q.pipeline_id.as_deref()).await?;
    Ok(Json(ListExecutionsResponse { executions }))
}

pub async fn get_execution(State(state): State<Arc<EngineState>>, Path(run_id): Path<String>) -> Result<Json<orchestra_core::RunState>, ApiError> {
    let run = state.store.get_execution(&run_id).await?.ok_or_else(|| EngineError::StoreError(format!("run '{run_id}' not found")))?;
    Ok(Json(run))
}

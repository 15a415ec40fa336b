//! `/memory/{user_id}` — exposes a user's current memory snapshot.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use orchestra_doer::DoerStore;

use crate::dto::MemoryResponse;
use crate::error::ApiError;
use crate::EngineState;

pub async fn get_memory(State(state): State<Arc<EngineState>>, Path(user_id): Path<String>) -> Result<Json<MemoryResponse>, ApiError> {
    let memory = state.store.load_memory(&user_id).await?;
    Ok(Json(MemoryResponse { user_id, memory }))
}

//! `/clarify` — advances a pre-flight clarifying conversation by one turn.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use orchestra_core::ClarifierSession;

use crate::dto::{ClarifyRequest, ClarifyResponse};
use crate::error::ApiError;
use crate::EngineState;

pub async fn clarify(State(state): State<Arc<EngineState>>, Json(req): Json<ClarifyRequest>) -> Result<Json<ClarifyResponse>, ApiError> {
    let session_id = req.session_id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let mut sessions = state.clarifier_sessions.write().await;
    let session = sessions.entry(session_id.clone()).or_insert_with(|| ClarifierSession::new(&session_id));

    let result = orchestra_thinker::clarify_step(session, &req.message, &state.llm).await?;

    Ok(Json(ClarifyResponse { session_id, ready: result.ready, question: result.question, refined_intent: result.refined_intent }))
}

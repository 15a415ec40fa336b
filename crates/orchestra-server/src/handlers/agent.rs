//! `/create-agent`, `/create-agent/stream`, `/automate` — the
//! construction pipeline's HTTP surface.
//!
//! `/create-agent/stream` reuses the SSE machinery the teacher used for
//! streaming chat tokens (`mpsc::channel` + `tokio::spawn` +
//! `ReceiverStream`), but pushes Thinker progress events instead of LLM
//! token chunks.

use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::Json;
use futures::stream::Stream;
use orchestra_core::{EngineError, Event, EventSink};
use orchestra_doer::CancellationToken;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tracing::{error, info};

use crate::dto::{AutomateRequest, AutomateResponse, CreateAgentRequest, CreateAgentResponse};
use crate::error::ApiError;
use crate::EngineState;

struct ChannelSink(mpsc::UnboundedSender<Event>);

impl EventSink for ChannelSink {
    fn emit(&self, event: Event) {
        let _ = self.0.send(event);
    }
}

/// Buffers every emitted event in order, for handlers that return the
/// construction log as part of a JSON response rather than streaming it.
#[derive(Default)]
struct CollectingSink(Mutex<Vec<Event>>);

impl EventSink for CollectingSink {
    fn emit(&self, event: Event) {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).push(event);
    }
}

impl CollectingSink {
    fn into_events(self) -> Vec<Event> {
        self.0.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

pub async fn create_agent(
    State(state): State<Arc<EngineState>>,
    Json(req): Json<CreateAgentRequest>,
) -> Result<Json<CreateAgentResponse>, ApiError> {
    info!(user_id = %req.user_id, "create_agent request");

    let sink = CollectingSink::default();
    let result = orchestra_thinker::think(&req.intent, &state.registry, &state.llm, &state.sandbox, Some(&sink)).await;
    let log = sink.into_events();

    match result {
        Ok(pipeline) => {
            state.store.save_pipeline(&pipeline).await?;
            Ok(Json(CreateAgentResponse { pipeline: Some(pipeline), status: "done".to_string(), log, unresolved: None }))
        }
        Err(EngineError::NoMatchAndNoSynthesis { unresolved }) => {
            Ok(Json(CreateAgentResponse { pipeline: None, status: "unresolved".to_string(), log, unresolved: Some(unresolved) }))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn create_agent_stream(
    State(state): State<Arc<EngineState>>,
    Json(req): Json<CreateAgentRequest>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let (tx, rx) = mpsc::unbounded_channel::<Event>();

    tokio::spawn(async move {
        let sink = ChannelSink(tx);
        match orchestra_thinker::think(&req.intent, &state.registry, &state.llm, &state.sandbox, Some(&sink)).await {
            Ok(pipeline) => {
                if let Err(e) = state.store.save_pipeline(&pipeline).await {
                    error!("failed to persist synthesized pipeline: {e}");
                }
            }
            Err(e) => error!("construction pipeline failed: {e}"),
        }
    });

    let stream = UnboundedReceiverStream::new(rx).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok(SseEvent::default().data(data))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub async fn automate(State(state): State<Arc<EngineState>>, Json(req): Json<AutomateRequest>) -> Result<Json<AutomateResponse>, ApiError> {
    if let Some(user) = &req.user {
        state.store.save_user(&req.user_id, user).await?;
    }

    let pipeline = orchestra_thinker::think(&req.message, &state.registry, &state.llm, &state.sandbox, None).await?;
    state.store.save_pipeline(&pipeline).await?;

    let run_id = uuid::Uuid::new_v4().to_string();
    let run = orchestra_doer::run(
        &pipeline,
        &state.registry,
        state.store.as_ref(),
        &state.llm,
        &state.sandbox,
        &req.user_id,
        &run_id,
        None,
        &CancellationToken::new(),
    )
    .await?;

    Ok(Json(AutomateResponse { pipeline, run }))
}

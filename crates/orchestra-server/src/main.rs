//! HTTP server entry point and Axum router setup.
//!
//! Initializes the engine state (LLM client, block registry, sandbox,
//! database), configures routes, and starts the Axum server on port 8000.

mod db;
mod dto;
mod error;
mod handlers;
mod run_events;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::routing::{get, post};
use axum::Router;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use orchestra_core::ClarifierSession;
use orchestra_llm::UnifiedLlmClient;
use orchestra_registry::{BlockRegistry, NoOpEmbedder};
use orchestra_sandbox::Sandbox;

use crate::db::Store;
use crate::run_events::RunEvents;

/// Shared engine state accessible from every handler: the model client,
/// the block registry, the sandboxed code runner, the database the Doer
/// reads and writes memory and run logs through, the in-flight
/// clarifying conversations keyed by session id, and the in-flight runs
/// a `WS /execution/{run_id}` connection can mirror.
pub struct EngineState {
    pub llm: UnifiedLlmClient,
    pub registry: Arc<BlockRegistry>,
    pub sandbox: Sandbox,
    pub store: Arc<Store>,
    pub clarifier_sessions: RwLock<HashMap<String, ClarifierSession>>,
    pub run_events: RunEvents,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".parse().unwrap()))
        .compact()
        .init();

    let state = Arc::new(init_engine_state().await?);

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            tracing::info_span!("request", method = %req.method(), uri = %req.uri(), version = ?req.version())
        })
        .on_response(|res: &Response<Body>, latency: Duration, _span: &tracing::Span| {
            info!(latency = %format!("{} ms", latency.as_millis()), status = %res.status().as_u16(), "finished processing request");
        });

    let logged_routes = Router::new()
        .route("/clarify", post(handlers::clarify::clarify))
        .route("/create-agent", post(handlers::agent::create_agent))
        .route("/create-agent/stream", post(handlers::agent::create_agent_stream))
        .route("/automate", post(handlers::agent::automate))
        .route("/pipeline/run", post(handlers::pipeline::run))
        .route("/blocks", get(handlers::pipeline::list_blocks).post(handlers::pipeline::save_block))
        .route("/blocks/{id}", axum::routing::delete(handlers::pipeline::delete_block))
        .route("/pipelines", get(handlers::pipeline::list_pipelines).post(handlers::pipeline::save_pipeline))
        .route("/pipelines/{id}", axum::routing::delete(handlers::pipeline::delete_pipeline))
        .route("/executions", get(handlers::pipeline::list_executions))
        .route("/executions/{run_id}", get(handlers::pipeline::get_execution))
        .route("/memory/{user_id}", get(handlers::memory::get_memory))
        .route("/execution/{run_id}", get(handlers::ws::ws_handler))
        .layer(trace_layer);

    let app = Router::new().merge(logged_routes).route("/health", get(handlers::health)).layer(cors).with_state(state);

    let addr = "0.0.0.0:8000";
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("failed to listen for ctrl-c");
    info!("shutdown signal received");
}

/// Initializes the engine state: picks the default model, builds the
/// block registry (hydrated from the database), the sandbox engine, and
/// opens the database the Doer persists memory and runs through.
async fn init_engine_state() -> Result<EngineState> {
    let model = std::env::var("ORCHESTRA_MODEL").unwrap_or_else(|_| "claude-haiku-4-5-20251001".to_string());
    let api_base = std::env::var("ORCHESTRA_API_BASE").ok();
    let llm = UnifiedLlmClient::new(&model, api_base.as_deref());

    let db_path = std::env::var("DATABASE_URL").unwrap_or_else(|_| "data/orchestra.db".into());
    let conn = db::init_db(&db_path)?;
    let store = Arc::new(Store::new(conn));

    let embedder = Arc::new(NoOpEmbedder::new(384));
    let registry = Arc::new(BlockRegistry::new(embedder));
    for block in store.list_blocks().await? {
        registry.hydrate(block).await;
    }
    info!("Loaded {} blocks into the registry", registry.list().await.len());

    let sandbox = Sandbox::new().map_err(|e| anyhow::anyhow!("failed to initialize sandbox: {e}"))?;

    Ok(EngineState { llm, registry, sandbox, store, clarifier_sessions: RwLock::new(HashMap::new()), run_events: RwLock::new(HashMap::new()) })
}
